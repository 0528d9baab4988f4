use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU32, AtomicU64};

/// Control block for one channel's ring.
///
/// Holds the cursors and the wake-up word. Slots live separately so the
/// control plane stays apart from the data plane.
#[repr(C, align(128))]
pub struct ChannelEntry {
    /// Logical identifier of the channel this ring backs.
    pub channel_id: u32,

    /// Signal word for futex-based blocking/waking.
    /// Producers bump it (and wake), consumers wait on it.
    pub signal: AtomicU32,

    /// Number of slots. Power of two, fixed at creation.
    pub capacity: u64,

    /// The "tail" cursor for producers. Atomically incremented to claim a slot for writing.
    /// Padded so producer and consumer cursors never share a cache line.
    pub tail: CachePadded<AtomicU64>,

    /// The "head" cursor for consumers. Atomically incremented to claim a slot for reading.
    pub head: CachePadded<AtomicU64>,
}

impl ChannelEntry {
    pub fn new(channel_id: u32, capacity: u64) -> Self {
        Self {
            channel_id,
            signal: AtomicU32::new(0),
            capacity,
            tail: CachePadded::new(AtomicU64::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
        }
    }
}
