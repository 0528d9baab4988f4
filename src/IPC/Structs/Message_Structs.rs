// The one record type that crosses the privilege boundary.

/// A timestamped production event.
///
/// Built by the deferred producer, copied into a ring slot, copied out by
/// the consumer. Nothing mutates it in transit: slots hold their own copy.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Production attempt number (0-based).
    pub sequence: u32,
    /// Milliseconds since boot at production time.
    pub timestamp_ms: i64,
}

impl Message {
    pub fn new(sequence: u32, timestamp_ms: i64) -> Self {
        Self {
            sequence,
            timestamp_ms,
        }
    }
}
