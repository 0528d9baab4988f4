use std::time::Duration;

use crate::error::SystemError;
use crate::rate::Period;
use crate::Runtime::context::DEFAULT_STACK_SIZE;

/// Smallest consumer stack we agree to spawn with.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Startup configuration. Everything here is fixed once the system runs,
/// except the period, which the rate controller may change later.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial production period.
    pub period: Period,
    /// Slots in the authorized channel.
    pub channel_capacity: usize,
    /// Slots in the shadow channel.
    pub shadow_capacity: usize,
    /// Stack size for the restricted consumer context.
    pub consumer_stack_size: usize,
    /// Interval of the "main alive" log line in the binary.
    pub heartbeat: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period: Period::default(),
            channel_capacity: 16,
            shadow_capacity: 1,
            consumer_stack_size: DEFAULT_STACK_SIZE,
            heartbeat: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), SystemError> {
        for (what, capacity) in [
            ("channel capacity", self.channel_capacity),
            ("shadow capacity", self.shadow_capacity),
        ] {
            if !capacity.is_power_of_two() {
                return Err(SystemError::InvalidConfig(format!(
                    "{what} must be a non-zero power of two, got {capacity}"
                )));
            }
        }
        if self.consumer_stack_size < MIN_STACK_SIZE {
            return Err(SystemError::InvalidConfig(format!(
                "consumer stack size must be at least {MIN_STACK_SIZE} bytes, got {}",
                self.consumer_stack_size
            )));
        }
        if self.heartbeat.is_zero() {
            return Err(SystemError::InvalidConfig("heartbeat must be non-zero".into()));
        }
        Ok(())
    }
}
