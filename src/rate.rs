use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::error::{PeriodError, RateError, SystemError};
use crate::Core::SharedState;
use crate::Runtime::TimerSource;

pub const MIN_PERIOD_MS: u32 = 10;
pub const MAX_PERIOD_MS: u32 = 10_000;
pub const DEFAULT_PERIOD_MS: u32 = 100;

/// Production period in milliseconds, always within
/// `MIN_PERIOD_MS..=MAX_PERIOD_MS`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(u32);

impl Period {
    pub fn new(ms: u32) -> Result<Self, PeriodError> {
        Self::from_i64(i64::from(ms))
    }

    fn from_i64(value: i64) -> Result<Self, PeriodError> {
        if value < i64::from(MIN_PERIOD_MS) || value > i64::from(MAX_PERIOD_MS) {
            return Err(PeriodError::OutOfRange { value });
        }
        Ok(Self(value as u32))
    }

    pub fn as_millis(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_millis(u64::from(self.0))
    }
}

impl Default for Period {
    fn default() -> Self {
        Self(DEFAULT_PERIOD_MS)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ms", self.0)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    /// Whole string must be a base-10 integer (optional sign). Anything
    /// else, including empty input, is malformed.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value: i64 = raw
            .parse()
            .map_err(|_| PeriodError::Malformed(raw.to_owned()))?;
        Self::from_i64(value)
    }
}

/// Single writer of the production period.
///
/// Holds the timer behind the same lock that serializes updates, so a
/// period change and the timer restart form one step: the old timer is
/// stopped and joined before the new period is published and the new timer
/// started.
pub struct RateController {
    state: Arc<SharedState>,
    timer: Mutex<TimerSource>,
}

impl RateController {
    pub fn new(state: Arc<SharedState>, timer: TimerSource) -> Self {
        Self {
            state,
            timer: Mutex::new(timer),
        }
    }

    /// Start the timer at the currently stored period.
    pub fn start(&self) -> Result<(), SystemError> {
        let mut timer = self.timer.lock();
        let period = Duration::from_millis(u64::from(self.state.period_ms()));
        timer.start(period)
    }

    pub fn period(&self) -> Period {
        Period(self.state.period_ms())
    }

    /// Parse, validate and apply. Invalid input changes nothing.
    pub fn set_period_str(&self, raw: &str) -> Result<Period, RateError> {
        let period: Period = raw.parse()?;
        self.set_period(period)?;
        Ok(period)
    }

    pub fn set_period(&self, period: Period) -> Result<(), RateError> {
        let mut timer = self.timer.lock();
        timer.stop();
        self.state.store_period_ms(period.as_millis());
        if let Err(e) = timer.start(period.as_duration()) {
            error!(error = %e, %period, "period stored but timer restart failed");
            return Err(RateError::Timer(e));
        }
        info!(%period, "period set");
        Ok(())
    }

    pub fn timer_fires(&self) -> u64 {
        self.timer.lock().fires()
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().is_running()
    }

    /// Stop production at the source. Idempotent.
    pub fn stop(&self) {
        self.timer.lock().stop();
    }
}
