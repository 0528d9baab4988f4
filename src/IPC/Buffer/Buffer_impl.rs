use std::cell::UnsafeCell;
use std::mem::size_of;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release, SeqCst};

use super::layout::ChannelEntry;
use super::Buffer::{RingBuffer, Slot};
use crate::error::ChannelError;
use crate::Core::futex::{futex_wait, futex_wake};
use crate::IPC::Structs::Message_Structs::Message;

impl RingBuffer {
    /// Allocate a ring with `capacity` slots.
    ///
    /// Capacity must be a non-zero power of two.
    pub fn new(channel_id: u32, capacity: usize) -> Result<Self, ChannelError> {
        if capacity == 0 || (capacity & (capacity - 1)) != 0 {
            return Err(ChannelError::InvalidCapacity(capacity));
        }

        // Slot k starts stamped with k: free for the producer at tail == k.
        let slots = (0..capacity)
            .map(|k| Slot {
                sequence: (k as u64).into(),
                message: UnsafeCell::new(Message::default()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            entry: ChannelEntry::new(channel_id, capacity as u64),
            slots,
            capacity,
            mask: capacity - 1,
        })
    }

    /// Size in bytes of one slot stride in memory.
    #[inline]
    pub fn slot_stride() -> usize {
        size_of::<Slot>()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel_id(&self) -> u32 {
        self.entry.channel_id
    }

    /// Messages currently parked in the ring. A snapshot; may be stale by
    /// the time the caller looks at it.
    pub fn len(&self) -> usize {
        let tail = self.entry.tail.load(Acquire);
        let head = self.entry.head.load(Acquire);
        (tail.saturating_sub(head) as usize).min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve a slot and publish `message` into it.
    ///
    /// Returns the slot index on success. When the ring is full the message
    /// is handed back untouched; this never waits for space.
    pub fn enqueue(&self, message: Message) -> Result<usize, Message> {
        let tail_atomic = &self.entry.tail;

        loop {
            let tail = tail_atomic.load(Relaxed);
            let idx = (tail as usize) & self.mask;
            let slot = &self.slots[idx];
            let seq = slot.sequence.load(Acquire);
            let dif = seq as i64 - tail as i64;

            if dif == 0 {
                if tail_atomic
                    .compare_exchange_weak(tail, tail + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    // We own this slot until the stamp moves.
                    unsafe {
                        *slot.message.get() = message;
                    }
                    slot.sequence.store(tail + 1, Release);
                    return Ok(idx);
                }
                continue;
            } else if dif < 0 {
                // full
                return Err(message);
            } else {
                // another producer moved tail under us; reload
                std::hint::spin_loop();
            }
        }
    }

    /// Take the oldest message, or `None` if the ring is empty.
    pub fn dequeue(&self) -> Option<Message> {
        let head_atomic = &self.entry.head;

        loop {
            let head = head_atomic.load(Relaxed);
            let idx = (head as usize) & self.mask;
            let slot = &self.slots[idx];
            let seq = slot.sequence.load(Acquire);
            let dif = seq as i64 - (head as i64 + 1);

            if dif == 0 {
                if head_atomic
                    .compare_exchange_weak(head, head + 1, AcqRel, Relaxed)
                    .is_ok()
                {
                    let message = unsafe { *slot.message.get() };
                    // free slot for the producer's next lap
                    slot.sequence.store(head + self.capacity as u64, Release);
                    return Some(message);
                }
                continue;
            } else if dif < 0 {
                // empty
                return None;
            } else {
                // producer not finished; retry
                std::hint::spin_loop();
            }
        }
    }

    /// Block until a message is available and take it. No timeout.
    pub fn dequeue_wait(&self) -> Message {
        loop {
            let seen = self.entry.signal.load(Acquire);
            if let Some(message) = self.dequeue() {
                return message;
            }
            futex_wait(&self.entry.signal, seen);
        }
    }

    /// Like [`dequeue_wait`](Self::dequeue_wait), but gives up with `None`
    /// once `interrupt` is raised and the waiter is woken through
    /// [`signal_consumer`](Self::signal_consumer).
    pub fn dequeue_wait_interruptible(&self, interrupt: &AtomicBool) -> Option<Message> {
        loop {
            let seen = self.entry.signal.load(Acquire);
            if interrupt.load(SeqCst) {
                return None;
            }
            if let Some(message) = self.dequeue() {
                return Some(message);
            }
            futex_wait(&self.entry.signal, seen);
        }
    }

    /// Signal consumers that the ring changed.
    pub fn signal_consumer(&self) {
        self.entry.signal.fetch_add(1, Release);
        futex_wake(&self.entry.signal, 1);
    }
}
