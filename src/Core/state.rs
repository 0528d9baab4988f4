use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Counters and configuration shared between the timer, the producer and
/// status queries.
///
/// Writers:
/// - `sequence` and `dropped`: the deferred producer only.
/// - `period_ms`: the rate controller only, while it holds its lock.
///
/// Everything else reads. No locks are taken here.
#[derive(Debug)]
pub struct SharedState {
    sequence: CachePadded<AtomicU32>,
    dropped: CachePadded<AtomicU64>,
    period_ms: AtomicU32,
}

impl SharedState {
    pub fn new(period_ms: u32) -> Self {
        Self {
            sequence: CachePadded::new(AtomicU32::new(0)),
            dropped: CachePadded::new(AtomicU64::new(0)),
            period_ms: AtomicU32::new(period_ms),
        }
    }

    /// Claim the next sequence number. Returns the value before the increment,
    /// so the first production attempt is numbered 0.
    pub(crate) fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::AcqRel)
    }

    /// Number of production attempts so far.
    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::Acquire)
    }

    pub(crate) fn record_drop(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Messages dropped because the authorized channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Acquire)
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms.load(Ordering::Acquire)
    }

    pub(crate) fn store_period_ms(&self, period_ms: u32) {
        self.period_ms.store(period_ms, Ordering::Release);
    }
}
