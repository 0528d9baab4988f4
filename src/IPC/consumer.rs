// src/IPC/consumer.rs

use tracing::{error, info, warn};

use super::{ChannelHandle, Structs::Message};
use crate::Runtime::{Directive, ExecContext};

/// Default processing for a delivered message: log it.
pub fn log_message(message: &Message) {
    info!(
        seq = message.sequence,
        ts_ms = message.timestamp_ms,
        "[USER] got seq={} at {} ms",
        message.sequence,
        message.timestamp_ms
    );
}

/// The unprivileged half of the pipeline.
///
/// Meant to run inside a context granted only `RECV` on `inbox`. It also
/// holds a handle to `shadow` so that an operator can make it try the
/// forbidden channel; holding the handle grants nothing.
pub struct RestrictedConsumer {
    inbox: ChannelHandle,
    shadow: ChannelHandle,
}

impl RestrictedConsumer {
    pub fn new(inbox: ChannelHandle, shadow: ChannelHandle) -> Self {
        Self { inbox, shadow }
    }

    /// Service loop. Never returns: the context ends only by fault or
    /// process exit.
    pub fn run<S>(self, ctx: &ExecContext, mut process: S) -> !
    where
        S: FnMut(&Message),
    {
        info!(
            context = %ctx.name(),
            inbox = %self.inbox.name(),
            "[USER] consumer started"
        );
        loop {
            ctx.sample_stack();
            match ctx.recv_wait_or_directive(&self.inbox) {
                Some(message) => process(&message),
                None => {
                    if let Some(directive) = ctx.take_directive() {
                        self.obey(ctx, directive);
                    }
                }
            }
        }
    }

    fn obey(&self, ctx: &ExecContext, directive: Directive) {
        match directive {
            Directive::ProbeUnauthorized => {
                warn!(
                    context = %ctx.name(),
                    channel = %self.shadow.name(),
                    "[USER] attempting unauthorized access to {}...",
                    self.shadow.name()
                );
                // No RECV grant on the shadow channel: this must not come back.
                let rc = ctx.try_recv(&self.shadow);
                error!(?rc, "[USER] unexpectedly returned (should not happen)");
            }
        }
    }
}
