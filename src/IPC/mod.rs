mod builder;
pub mod channel;
pub mod consumer;
mod debug;
pub mod producer;

pub use builder::ChannelBuilder;
pub use channel::{ChannelHandle, ChannelId};
pub use producer::DeferredProducer;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub use Buffer::{RingBuffer, Slot}; // re-export for stable path
}

pub mod Structs {
    pub mod Message_Structs;
    pub use Message_Structs::Message; // re-export for stable path
}
