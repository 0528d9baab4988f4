use secure_counter::Runtime::{ContextExit, ContextSpec, WorkQueue, WorkStats};
use secure_counter::Security::{AccessMonitor, ContextId, GrantTable};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn monitor() -> Arc<AccessMonitor> {
    Arc::new(AccessMonitor::new(GrantTable::builder().build()))
}

fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn submissions_coalesce_while_pending() {
    let (started_tx, started_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel::<()>();

    let work = WorkQueue::spawn(
        ContextSpec::new(ContextId(0), "sysworkq"),
        monitor(),
        move |_ctx| {
            started_tx.send(()).unwrap();
            gate_rx.recv().unwrap();
        },
    )
    .unwrap();
    let submitter = work.submitter();

    assert!(submitter.submit());
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // The running item already cleared its flag: one more run gets armed,
    // the rest fold into it.
    assert!(!work.is_pending());
    assert!(submitter.submit());
    assert!(!submitter.submit());
    assert!(!submitter.clone().submit());
    assert!(work.is_pending());

    gate_tx.send(()).unwrap();
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    gate_tx.send(()).unwrap();

    wait_for(|| work.stats().completed == 2);
    assert_eq!(
        work.stats(),
        WorkStats {
            submitted: 2,
            coalesced: 2,
            completed: 2
        }
    );
    assert!(!work.is_pending());
    assert_eq!(work.shutdown(), ContextExit::Returned);
}

#[test]
fn every_spaced_submission_runs() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);
    let work = WorkQueue::spawn(
        ContextSpec::new(ContextId(0), "sysworkq"),
        monitor(),
        move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    )
    .unwrap();
    let submitter = work.submitter();

    for expected in 1..=5 {
        submitter.submit();
        wait_for(|| runs.load(Ordering::SeqCst) == expected);
    }
    assert_eq!(work.stats().coalesced, 0);
    assert_eq!(work.stats().completed, 5);
}

#[test]
fn shutdown_is_idempotent_and_stops_runs() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);
    let work = WorkQueue::spawn(
        ContextSpec::new(ContextId(0), "sysworkq"),
        monitor(),
        move |_ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    )
    .unwrap();

    assert_eq!(work.shutdown(), ContextExit::Returned);
    assert_eq!(work.shutdown(), ContextExit::Returned);
    assert!(!work.context().is_running());

    work.submitter().submit();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}
