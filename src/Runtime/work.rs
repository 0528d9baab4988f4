// Deferred work: a single-slot pending flag drained by one privileged
// worker context. Submission never blocks and never queues more than one.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use tracing::{debug, trace};

use super::context::{self, ContextExit, ContextHandle, ContextSpec, ExecContext};
use crate::error::SystemError;
use crate::Core::futex::{futex_wait, futex_wake};
use crate::Security::AccessMonitor;

#[derive(Debug, Default)]
struct WorkSlot {
    pending: CachePadded<AtomicBool>,
    signal: AtomicU32,
    shutdown: AtomicBool,
    submitted: AtomicU64,
    coalesced: AtomicU64,
    completed: AtomicU64,
}

impl WorkSlot {
    fn kick(&self) {
        self.signal.fetch_add(1, Ordering::Release);
        futex_wake(&self.signal, 1);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkStats {
    /// Submissions that armed the slot.
    pub submitted: u64,
    /// Submissions dropped because the slot was already armed.
    pub coalesced: u64,
    /// Handler runs finished.
    pub completed: u64,
}

/// Cheap, cloneable trigger for the work item. Safe to call from a context
/// that must not block.
#[derive(Debug, Clone)]
pub struct WorkSubmitter {
    slot: Arc<WorkSlot>,
}

impl WorkSubmitter {
    /// Arm the work item. Returns `false` when it was already pending and
    /// this submission was coalesced into it.
    pub fn submit(&self) -> bool {
        if self.slot.pending.swap(true, Ordering::AcqRel) {
            self.slot.coalesced.fetch_add(1, Ordering::Relaxed);
            trace!("work already pending; coalesced");
            return false;
        }
        self.slot.submitted.fetch_add(1, Ordering::Relaxed);
        self.slot.kick();
        true
    }
}

/// A worker context running one handler whenever the work item is armed.
///
/// The pending flag is cleared before the handler runs, so a submission
/// that lands mid-run schedules exactly one more run.
pub struct WorkQueue {
    slot: Arc<WorkSlot>,
    context: ContextHandle,
}

impl WorkQueue {
    pub fn spawn<H>(
        spec: ContextSpec,
        monitor: Arc<AccessMonitor>,
        mut handler: H,
    ) -> Result<Self, SystemError>
    where
        H: FnMut(&ExecContext) + Send + 'static,
    {
        let slot = Arc::new(WorkSlot::default());
        let worker_slot = Arc::clone(&slot);
        let context = context::spawn(spec, monitor, move |ctx| {
            run_worker(&ctx, &worker_slot, &mut handler)
        })?;
        Ok(Self { slot, context })
    }

    pub fn submitter(&self) -> WorkSubmitter {
        WorkSubmitter {
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.pending.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> WorkStats {
        WorkStats {
            submitted: self.slot.submitted.load(Ordering::Relaxed),
            coalesced: self.slot.coalesced.load(Ordering::Relaxed),
            completed: self.slot.completed.load(Ordering::Relaxed),
        }
    }

    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    /// Stop the worker after its current run and wait for it. A pending
    /// submission is discarded. Idempotent.
    pub fn shutdown(&self) -> ContextExit {
        self.slot.shutdown.store(true, Ordering::Release);
        self.slot.kick();
        self.context.wait_exit()
    }
}

fn run_worker<H>(ctx: &ExecContext, slot: &WorkSlot, handler: &mut H)
where
    H: FnMut(&ExecContext),
{
    debug!(context = %ctx.name(), "work queue started");
    loop {
        let seen = slot.signal.load(Ordering::Acquire);
        if slot.shutdown.load(Ordering::Acquire) {
            break;
        }
        if slot.pending.swap(false, Ordering::AcqRel) {
            handler(ctx);
            slot.completed.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        futex_wait(&slot.signal, seen);
    }
    debug!(context = %ctx.name(), "work queue stopped");
}
