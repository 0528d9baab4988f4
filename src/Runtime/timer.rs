//! Periodic timer standing in for a hardware timer interrupt.
//!
//! The expiry callback runs on the timer thread with the control lock held,
//! so it must only hand work off (see [`WorkSubmitter`](super::work::WorkSubmitter)).
//!
//! Phase policy: every start, including a restart after a period change,
//! schedules the first expiry one full period later. Nothing carries over
//! from the previous run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use super::context::panic_message;
use crate::error::SystemError;

pub type Expiry = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct TimerControl {
    stopped: Mutex<bool>,
    wake: Condvar,
}

struct RunningTimer {
    control: Arc<TimerControl>,
    join: JoinHandle<()>,
    period: Duration,
}

pub struct TimerSource {
    name: String,
    expiry: Expiry,
    fires: Arc<AtomicU64>,
    running: Option<RunningTimer>,
    failure: Option<String>,
}

impl TimerSource {
    pub fn new(name: impl Into<String>, expiry: Expiry) -> Self {
        Self {
            name: name.into(),
            expiry,
            fires: Arc::new(AtomicU64::new(0)),
            running: None,
            failure: None,
        }
    }

    /// Start firing every `period`. A running timer is stopped first.
    pub fn start(&mut self, period: Duration) -> Result<(), SystemError> {
        self.stop();

        let control = Arc::new(TimerControl::default());
        let thread_control = Arc::clone(&control);
        let expiry = Arc::clone(&self.expiry);
        let fires = Arc::clone(&self.fires);
        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run(&thread_control, period, &*expiry, &fires))
            .map_err(|source| SystemError::Spawn {
                what: self.name.clone(),
                source,
            })?;

        debug!(timer = %self.name, period_ms = period.as_millis() as u64, "timer started");
        self.running = Some(RunningTimer {
            control,
            join,
            period,
        });
        Ok(())
    }

    /// Stop the timer and wait for its thread. No expiry runs after this
    /// returns. Idempotent.
    ///
    /// A panic in the expiry callback ends the thread early; it is logged
    /// here and kept in [`failure`](Self::failure).
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            *running.control.stopped.lock() = true;
            running.control.wake.notify_all();
            match running.join.join() {
                Ok(()) => debug!(timer = %self.name, "timer stopped"),
                Err(payload) => {
                    let msg = panic_message(&*payload);
                    error!(timer = %self.name, panic = %msg, "timer thread panicked");
                    self.failure = Some(msg);
                }
            }
        }
    }

    /// Panic message of the last run that died in its expiry callback.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn restart(&mut self, period: Duration) -> Result<(), SystemError> {
        self.stop();
        self.start(period)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.running.as_ref().map(|running| running.period)
    }

    /// Total expiries across all runs of this timer.
    pub fn fires(&self) -> u64 {
        self.fires.load(Ordering::Relaxed)
    }
}

impl Drop for TimerSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(control: &TimerControl, period: Duration, expiry: &(dyn Fn() + Send + Sync), fires: &AtomicU64) {
    // Deadlines are anchored to the start so expiries don't drift.
    let mut deadline = Instant::now() + period;
    let mut stopped = control.stopped.lock();
    while !*stopped {
        let now = Instant::now();
        if now < deadline {
            let _ = control.wake.wait_until(&mut stopped, deadline);
            continue;
        }

        fires.fetch_add(1, Ordering::Relaxed);
        trace!("timer expiry");
        expiry();

        deadline += period;
        // Fell more than a period behind: skip the missed expiries.
        while deadline <= now {
            deadline += period;
        }
    }
}
