use std::collections::HashMap;
use std::fmt;

use bitflags::bitflags;

use crate::IPC::{ChannelHandle, ChannelId};

bitflags! {
    /// Operations a context may perform on a channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Rights: u8 {
        const SEND = 0b01;
        const RECV = 0b10;
    }
}

/// Identity of an execution context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct ContextGrants {
    name: String,
    channels: HashMap<ChannelId, Rights>,
}

/// Immutable map from context to the channels it may touch and how.
///
/// Built once at startup through [`GrantTable::builder`]. There is no way
/// to grant or revoke afterwards.
#[derive(Debug, Clone)]
pub struct GrantTable {
    contexts: HashMap<ContextId, ContextGrants>,
    channels: Vec<ChannelHandle>,
}

impl GrantTable {
    pub fn builder() -> GrantTableBuilder {
        GrantTableBuilder::default()
    }

    /// Rights `context` holds on `channel`. Empty when none were granted or
    /// the context is unknown.
    pub fn rights(&self, context: ContextId, channel: ChannelId) -> Rights {
        self.contexts
            .get(&context)
            .and_then(|grants| grants.channels.get(&channel).copied())
            .unwrap_or_else(Rights::empty)
    }

    pub fn allows(&self, context: ContextId, channel: ChannelId, requested: Rights) -> bool {
        !requested.is_empty() && self.rights(context, channel).contains(requested)
    }

    /// Channels `context` holds any right on, in id order.
    pub fn channels_of(&self, context: ContextId) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self
            .contexts
            .get(&context)
            .map(|grants| grants.channels.keys().copied().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    pub fn context_name(&self, context: ContextId) -> Option<&str> {
        self.contexts.get(&context).map(|grants| grants.name.as_str())
    }

    /// Every channel named by some grant.
    pub(crate) fn channels(&self) -> &[ChannelHandle] {
        &self.channels
    }
}

#[derive(Debug, Default)]
pub struct GrantTableBuilder {
    contexts: HashMap<ContextId, ContextGrants>,
    channels: Vec<ChannelHandle>,
}

impl GrantTableBuilder {
    /// Register a context. A registered context with no grants can touch
    /// nothing.
    pub fn context(mut self, id: ContextId, name: impl Into<String>) -> Self {
        let name = name.into();
        self.contexts
            .entry(id)
            .and_modify(|grants| grants.name = name.clone())
            .or_insert_with(|| ContextGrants {
                name,
                channels: HashMap::new(),
            });
        self
    }

    /// Add `rights` on `channel` to `context`, registering the context under
    /// a generated name if needed. Repeated grants accumulate.
    pub fn grant(mut self, context: ContextId, channel: &ChannelHandle, rights: Rights) -> Self {
        let grants = self
            .contexts
            .entry(context)
            .or_insert_with(|| ContextGrants {
                name: context.to_string(),
                channels: HashMap::new(),
            });
        *grants.channels.entry(channel.id()).or_insert_with(Rights::empty) |= rights;
        if !self.channels.iter().any(|known| known.id() == channel.id()) {
            self.channels.push(channel.clone());
        }
        self
    }

    pub fn build(self) -> GrantTable {
        GrantTable {
            contexts: self.contexts,
            channels: self.channels,
        }
    }
}
