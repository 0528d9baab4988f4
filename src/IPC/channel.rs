use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};

use super::Buffer::RingBuffer;
use super::Structs::Message;
use crate::error::ChannelError;

/// Identifier the grant table uses to name a channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// A named bounded channel.
///
/// The data operations are crate-private: outside code reaches them only
/// through an execution context, and every context access is vetted by the
/// access monitor first. The channel itself checks nothing; it only
/// remembers which monitor governs it.
pub struct Channel {
    id: ChannelId,
    name: String,
    governor: OnceLock<u64>,
    pub(crate) ring: RingBuffer,
}

impl Channel {
    pub(crate) fn new(id: ChannelId, name: String, capacity: usize) -> Result<Self, ChannelError> {
        Ok(Self {
            id,
            name,
            governor: OnceLock::new(),
            ring: RingBuffer::new(id.0, capacity)?,
        })
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Current occupancy. Readable by anyone; it carries no message content.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Token of the monitor governing this channel, if any.
    pub(crate) fn governor(&self) -> Option<u64> {
        self.governor.get().copied()
    }

    /// Put the channel under monitor `token`. The first binding wins;
    /// returns the token actually in force.
    pub(crate) fn bind_governor(&self, token: u64) -> u64 {
        *self.governor.get_or_init(|| token)
    }

    pub(crate) fn try_enqueue(&self, message: Message) -> Result<(), ChannelError> {
        match self.ring.enqueue(message) {
            Ok(_) => {
                self.ring.signal_consumer();
                Ok(())
            }
            Err(message) => Err(ChannelError::Full {
                channel: self.id,
                message,
            }),
        }
    }

    pub(crate) fn try_dequeue(&self) -> Option<Message> {
        self.ring.dequeue()
    }

    pub(crate) fn dequeue_wait(&self) -> Message {
        self.ring.dequeue_wait()
    }

    pub(crate) fn dequeue_wait_interruptible(&self, interrupt: &AtomicBool) -> Option<Message> {
        self.ring.dequeue_wait_interruptible(interrupt)
    }

    /// Kick whoever is parked on this channel so it re-checks its
    /// interrupt flag.
    pub(crate) fn wake_waiters(&self) {
        self.ring.signal_consumer();
    }
}

/// Shared reference to a [`Channel`].
///
/// Any context may hold one. Holding a handle grants nothing; access rights
/// come from the grant table.
#[derive(Clone)]
pub struct ChannelHandle(pub(crate) Arc<Channel>);

impl ChannelHandle {
    pub(crate) fn new(channel: Channel) -> Self {
        Self(Arc::new(channel))
    }

    pub fn id(&self) -> ChannelId {
        self.0.id()
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn channel(&self) -> &Channel {
        &self.0
    }
}
