use std::io;

use thiserror::Error;

use crate::IPC::{ChannelId, Structs::Message};

/// Rejected period input. Nothing was changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid <ms> {0:?}: expected a base-10 integer")]
    Malformed(String),

    #[error("invalid <ms> {value} (10..10000)")]
    OutOfRange { value: i64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("{channel} full; dropped seq={}", .message.sequence)]
    Full { channel: ChannelId, message: Message },

    #[error("channel capacity must be a non-zero power of two, got {0}")]
    InvalidCapacity(usize),
}

/// Failures while bringing the system up.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn {what} thread")]
    Spawn {
        what: String,
        #[source]
        source: io::Error,
    },
}

/// Why a period change did not take effect.
#[derive(Debug, Error)]
pub enum RateError {
    #[error(transparent)]
    Invalid(#[from] PeriodError),

    /// The new period was stored but the timer could not be restarted.
    #[error("timer restart failed")]
    Timer(#[source] SystemError),
}
