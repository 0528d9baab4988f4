use super::channel::{Channel, ChannelHandle, ChannelId};
use crate::error::ChannelError;

pub struct ChannelBuilder {
    capacity: usize,
    channel_id: u32,
    name: Option<String>,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self {
            capacity: 16,
            channel_id: 0,
            name: None,
        }
    }
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots. Must be a power of two.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_channel_id(mut self, channel_id: u32) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<ChannelHandle, ChannelError> {
        let id = ChannelId(self.channel_id);
        let name = self.name.unwrap_or_else(|| format!("channel_{}", self.channel_id));
        let channel = Channel::new(id, name, self.capacity)?;
        tracing::debug!(
            channel = %channel.name(),
            id = %id,
            capacity = channel.capacity(),
            "channel created"
        );
        Ok(ChannelHandle::new(channel))
    }
}
