// Permission faults are not errors. They end the offending context.

use std::fmt;

use super::grant::{ContextId, Rights};
use crate::IPC::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    /// The grant table does not give the context the requested rights.
    NotGranted,
    /// The context already faulted once; it may touch nothing.
    Isolated,
    /// The channel is governed by a different monitor.
    ForeignChannel,
}

/// Record of an unauthorized channel access.
///
/// Raised as an unwind payload by the access monitor and caught only at
/// the root of the context's thread, where it becomes the context's exit
/// record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionFault {
    pub context: ContextId,
    pub context_name: String,
    pub channel: ChannelId,
    pub channel_name: String,
    pub requested: Rights,
    pub reason: FaultReason,
}

impl fmt::Display for PermissionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let why = match self.reason {
            FaultReason::NotGranted => "no grant",
            FaultReason::Isolated => "context isolated",
            FaultReason::ForeignChannel => "channel governed by another monitor",
        };
        write!(
            f,
            "permission fault: {} ({}) requested {:?} on {} ({}): {}",
            self.context_name, self.context, self.requested, self.channel_name, self.channel, why
        )
    }
}

/// Terminate the calling context.
///
/// Uses `resume_unwind` so the panic hook stays quiet: the monitor already
/// logged the fault and the process is not panicking.
pub(crate) fn raise(fault: PermissionFault) -> ! {
    std::panic::resume_unwind(Box::new(fault))
}
