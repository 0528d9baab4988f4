use secure_counter::rate::{RateController, MAX_PERIOD_MS, MIN_PERIOD_MS};
use secure_counter::Core::SharedState;
use secure_counter::Runtime::TimerSource;
use secure_counter::{Period, PeriodError, RateError};
use serial_test::serial;
use std::sync::Arc;
use std::thread;

fn controller() -> (RateController, Arc<SharedState>) {
    let state = Arc::new(SharedState::new(100));
    let timer = TimerSource::new("tick_timer", Arc::new(|| {}));
    let rate = RateController::new(Arc::clone(&state), timer);
    rate.start().unwrap();
    (rate, state)
}

#[test]
fn period_parsing() {
    assert_eq!("10".parse::<Period>().unwrap().as_millis(), 10);
    assert_eq!("10000".parse::<Period>().unwrap().as_millis(), 10_000);
    assert_eq!("+250".parse::<Period>().unwrap().as_millis(), 250);

    assert_eq!("9".parse::<Period>(), Err(PeriodError::OutOfRange { value: 9 }));
    assert_eq!(
        "10001".parse::<Period>(),
        Err(PeriodError::OutOfRange { value: 10_001 })
    );
    assert_eq!("-5".parse::<Period>(), Err(PeriodError::OutOfRange { value: -5 }));
    for malformed in ["", "abc", "12x", " 50", "1e3", "99999999999999999999"] {
        assert_eq!(
            malformed.parse::<Period>(),
            Err(PeriodError::Malformed(malformed.to_owned())),
            "{malformed:?}"
        );
    }

    assert_eq!(Period::default().as_millis(), 100);
    assert_eq!(Period::new(250).unwrap().to_string(), "250 ms");
    assert_eq!(
        PeriodError::OutOfRange { value: 5 }.to_string(),
        "invalid <ms> 5 (10..10000)"
    );
}

#[test]
fn rejected_input_changes_nothing() {
    let (rate, state) = controller();

    for bad in ["5", "abc", "", "12x", "-5", "10001", "99999999999999999999"] {
        match rate.set_period_str(bad) {
            Err(RateError::Invalid(_)) => {}
            other => panic!("{bad:?} accepted: {other:?}"),
        }
        assert_eq!(state.period_ms(), 100);
        assert_eq!(rate.period().as_millis(), 100);
    }
    assert!(rate.is_running());
}

#[test]
fn accepts_bounds_inclusive() {
    let (rate, state) = controller();

    assert_eq!(rate.set_period_str("10000").unwrap().as_millis(), 10_000);
    assert_eq!(state.period_ms(), 10_000);
    assert!(rate.is_running());

    assert_eq!(rate.set_period_str("10").unwrap().as_millis(), 10);
    assert_eq!(state.period_ms(), 10);
    assert!(rate.is_running());
}

#[test]
fn random_valid_periods_apply() {
    let (rate, state) = controller();
    let mut rng = fastrand::Rng::with_seed(0x5ec0_c0de);

    for _ in 0..25 {
        let ms = rng.u32(MIN_PERIOD_MS..=MAX_PERIOD_MS);
        rate.set_period(Period::new(ms).unwrap()).unwrap();
        assert_eq!(state.period_ms(), ms);
        assert_eq!(rate.period().as_millis(), ms);
    }
}

#[test]
#[serial]
fn timer_follows_new_period() {
    let (rate, _state) = controller();
    rate.set_period_str("10").unwrap();
    thread::sleep(std::time::Duration::from_millis(120));
    let fast = rate.timer_fires();
    assert!(fast >= 5, "only {fast} expiries at 10 ms");

    rate.set_period_str("10000").unwrap();
    let before = rate.timer_fires();
    thread::sleep(std::time::Duration::from_millis(100));
    assert_eq!(rate.timer_fires(), before);
}

#[test]
fn concurrent_updates_leave_one_consistent_period() {
    let (rate, state) = controller();
    let rate = Arc::new(rate);
    let candidates = [20u32, 40, 80, 160];

    let handles: Vec<_> = candidates
        .iter()
        .map(|&ms| {
            let rate = Arc::clone(&rate);
            thread::spawn(move || {
                for _ in 0..10 {
                    rate.set_period(Period::new(ms).unwrap()).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(candidates.contains(&state.period_ms()));
    assert!(rate.is_running());

    rate.stop();
    rate.stop();
    assert!(!rate.is_running());
}
