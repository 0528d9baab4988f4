// In src/IPC/producer.rs
use std::sync::Arc;

use tracing::{trace, warn};

use super::{ChannelHandle, Structs::Message};
use crate::error::ChannelError;
use crate::Core::{clock, SharedState};
use crate::Runtime::ExecContext;

/// Outcome of one production attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    Enqueued(Message),
    Dropped(Message),
}

/// The privileged half of the pipeline: turns each timer hand-off into one
/// message on the authorized channel.
///
/// Backpressure is absorbed here. A full channel costs the newest message
/// and bumps the drop counter; the producer never waits and never retries.
pub struct DeferredProducer {
    state: Arc<SharedState>,
    channel: ChannelHandle,
}

impl DeferredProducer {
    pub fn new(state: Arc<SharedState>, channel: ChannelHandle) -> Self {
        Self { state, channel }
    }

    /// One production attempt. The sequence counter advances whether or not
    /// the message is delivered.
    pub fn produce(&self, ctx: &ExecContext) -> Production {
        let message = Message::new(self.state.next_sequence(), clock::uptime_ms());

        match ctx.try_send(&self.channel, message) {
            Ok(()) => {
                trace!(seq = message.sequence, "enqueued");
                Production::Enqueued(message)
            }
            Err(ChannelError::Full { .. }) => {
                let dropped = self.state.record_drop();
                warn!(
                    seq = message.sequence,
                    dropped,
                    "msgq full; dropped seq={}",
                    message.sequence
                );
                Production::Dropped(message)
            }
            Err(e) => {
                // try_send only reports Full; anything else still costs the message.
                let dropped = self.state.record_drop();
                warn!(seq = message.sequence, dropped, error = %e, "enqueue failed; dropped");
                Production::Dropped(message)
            }
        }
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }
}
