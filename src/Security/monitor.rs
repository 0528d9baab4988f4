use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{error, trace, warn};

use super::fault::{self, FaultReason, PermissionFault};
use super::grant::{ContextId, GrantTable, Rights};
use crate::IPC::channel::Channel;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Gatekeeper consulted on every channel access made through an
/// execution context.
///
/// An allowed access returns normally. Anything else never returns: the
/// caller is marked isolated and its thread is unwound with a
/// [`PermissionFault`].
///
/// Creating a monitor binds every channel in its grant table to it. A
/// channel already bound elsewhere stays with its first monitor, and every
/// access to it through this one faults.
#[derive(Debug)]
pub struct AccessMonitor {
    token: u64,
    grants: GrantTable,
    isolated: RwLock<HashSet<ContextId>>,
    faults: Mutex<Vec<PermissionFault>>,
}

impl AccessMonitor {
    pub fn new(grants: GrantTable) -> Self {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        for handle in grants.channels() {
            if handle.channel().bind_governor(token) != token {
                warn!(channel = %handle.name(), "channel already governed by another monitor");
            }
        }
        Self {
            token,
            grants,
            isolated: RwLock::new(HashSet::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    pub fn grants(&self) -> &GrantTable {
        &self.grants
    }

    pub fn is_isolated(&self, context: ContextId) -> bool {
        self.isolated.read().contains(&context)
    }

    /// Every fault raised so far, oldest first.
    pub fn faults(&self) -> Vec<PermissionFault> {
        self.faults.lock().clone()
    }

    pub(crate) fn check(&self, context: ContextId, channel: &Channel, requested: Rights) {
        if self.is_isolated(context) {
            self.trap(context, channel, requested, FaultReason::Isolated);
        }
        if matches!(channel.governor(), Some(token) if token != self.token) {
            self.trap(context, channel, requested, FaultReason::ForeignChannel);
        }
        if !self.grants.allows(context, channel.id(), requested) {
            self.trap(context, channel, requested, FaultReason::NotGranted);
        }
        trace!(context = %context, channel = %channel.id(), ?requested, "access granted");
    }

    fn trap(
        &self,
        context: ContextId,
        channel: &Channel,
        requested: Rights,
        reason: FaultReason,
    ) -> ! {
        let fault = PermissionFault {
            context,
            context_name: self
                .grants
                .context_name(context)
                .map(str::to_owned)
                .unwrap_or_else(|| context.to_string()),
            channel: channel.id(),
            channel_name: channel.name().to_owned(),
            requested,
            reason,
        };

        self.isolated.write().insert(context);
        self.faults.lock().push(fault.clone());
        error!(
            context = %fault.context_name,
            channel = %fault.channel_name,
            ?requested,
            ?reason,
            "FATAL: {fault}; terminating context"
        );
        fault::raise(fault)
    }
}
