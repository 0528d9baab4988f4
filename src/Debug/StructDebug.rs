use std::fmt;
use std::sync::atomic::Ordering;

use crate::IPC::channel::Channel;
use crate::IPC::Buffer::RingBuffer;

/// Debug function for RingBuffer
///
/// Shows cursors and occupancy without reading slot contents, which may be
/// mid-write by another thread.
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("channel_id", &buffer.entry.channel_id)
        .field("capacity", &buffer.capacity)
        .field("head", &buffer.entry.head.load(Ordering::Relaxed))
        .field("tail", &buffer.entry.tail.load(Ordering::Relaxed))
        .field("slots", &format_args!("{:p}", buffer.slots.as_ptr()))
        .finish()
}

/// Debug function for Channel
pub fn debug_channel(channel: &Channel, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Channel")
        .field("id", &channel.id())
        .field("name", &channel.name())
        .field("len", &channel.len())
        .field("ring", &channel.ring)
        .finish()
}
