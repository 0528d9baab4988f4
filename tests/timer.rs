use secure_counter::Runtime::TimerSource;
use serial_test::serial;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn counting_timer() -> (TimerSource, Arc<AtomicU64>) {
    let hits = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&hits);
    let timer = TimerSource::new(
        "test_timer",
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    (timer, hits)
}

#[test]
#[serial]
fn fires_at_the_configured_period() {
    let (mut timer, hits) = counting_timer();
    assert!(!timer.is_running());
    assert_eq!(timer.period(), None);

    timer.start(Duration::from_millis(20)).unwrap();
    assert!(timer.is_running());
    assert_eq!(timer.period(), Some(Duration::from_millis(20)));

    thread::sleep(Duration::from_millis(210));
    timer.stop();

    let fired = hits.load(Ordering::SeqCst);
    assert!((6..=11).contains(&fired), "fired {fired} times");
    assert_eq!(timer.fires(), fired);
}

#[test]
#[serial]
fn nothing_fires_after_stop() {
    let (mut timer, hits) = counting_timer();
    timer.start(Duration::from_millis(10)).unwrap();
    thread::sleep(Duration::from_millis(50));
    timer.stop();
    assert!(!timer.is_running());

    let at_stop = hits.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(hits.load(Ordering::SeqCst), at_stop);

    // Idempotent.
    timer.stop();
}

#[test]
#[serial]
fn restart_resets_phase() {
    let (mut timer, hits) = counting_timer();
    timer.start(Duration::from_millis(200)).unwrap();
    thread::sleep(Duration::from_millis(150));
    timer.restart(Duration::from_millis(200)).unwrap();

    // The old schedule would have fired 50 ms from now.
    thread::sleep(Duration::from_millis(100));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    thread::sleep(Duration::from_millis(200));
    assert!(hits.load(Ordering::SeqCst) >= 1);
}

#[test]
#[serial]
fn start_replaces_a_running_timer() {
    let (mut timer, hits) = counting_timer();
    timer.start(Duration::from_secs(10)).unwrap();
    timer.start(Duration::from_millis(10)).unwrap();
    assert_eq!(timer.period(), Some(Duration::from_millis(10)));

    thread::sleep(Duration::from_millis(100));
    assert!(hits.load(Ordering::SeqCst) >= 3);
}

#[test]
#[serial]
fn drop_stops_the_thread() {
    let (mut timer, hits) = counting_timer();
    timer.start(Duration::from_millis(10)).unwrap();
    thread::sleep(Duration::from_millis(30));
    drop(timer);

    let at_drop = hits.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(hits.load(Ordering::SeqCst), at_drop);
}

#[test]
#[serial]
fn expiry_panic_is_reported_on_stop() {
    let mut timer = TimerSource::new(
        "test_timer",
        Arc::new(|| panic!("expiry blew up")),
    );
    timer.start(Duration::from_millis(10)).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(timer.failure(), None);

    timer.stop();
    assert_eq!(timer.failure(), Some("expiry blew up"));
    assert_eq!(timer.fires(), 1);
}
