// Bounded ring buffer backing every channel.

use super::layout::ChannelEntry;
use crate::IPC::Structs::Message_Structs::Message;

use std::cell::UnsafeCell;
use std::sync::atomic::AtomicU64;

/// A single slot in the ring.
#[repr(C, align(64))]
pub struct Slot {
    /// The sequence stamp of the slot. This is the core of the synchronization.
    /// - A producer claims a `tail` position and waits for the stamp in
    ///   the target slot to equal `tail`.
    /// - After writing, it sets the stamp to `tail + 1`, signaling completion.
    /// - A consumer waits for the stamp in its `head` slot to equal
    ///   `head + 1`, reads, then sets it to `head + capacity` to free the slot.
    pub sequence: AtomicU64,

    /// Copy of the message parked in this slot.
    pub(crate) message: UnsafeCell<Message>,
}

/// Fixed-capacity FIFO of [`Message`] with non-blocking enqueue and
/// blocking or non-blocking dequeue.
///
/// ### Concurrency Design:
/// - **Enqueue**: claim a slot by advancing `tail`; the slot stamp tells
///   whether it is free. A stamp behind `tail` means the ring is full.
/// - **Dequeue**: claim a message by advancing `head`; the slot stamp tells
///   whether the producer finished writing.
/// - **Waiting**: consumers park on `ChannelEntry::signal`, producers bump it
///   after every publish.
///
/// Occupancy can never exceed `capacity`: a producer only claims a slot whose
/// stamp shows the previous lap's message was consumed.
pub struct RingBuffer {
    pub(crate) entry: ChannelEntry,

    pub(crate) slots: Box<[Slot]>,

    /// The capacity of the buffer (number of slots).
    pub(crate) capacity: usize,

    /// `capacity - 1`, used to wrap cursors onto slot indices.
    pub(crate) mask: usize,
}

// Slot contents are only touched by the thread that won the cursor CAS for
// that slot, and publication goes through the stamp's Release/Acquire pair.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}
