//! Wiring of the whole pipeline.
//!
//! ```text
//! tick_timer ──submit──▶ sysworkq (privileged) ──try_send──▶ counter_q ──recv──▶ consumer_user (restricted)
//!                                                             secret_q   ✗ no grant for consumer_user
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{RateError, SystemError};
use crate::rate::{Period, RateController};
use crate::Core::{clock, SharedState};
use crate::IPC::consumer::{self, RestrictedConsumer};
use crate::IPC::{ChannelBuilder, ChannelHandle, DeferredProducer, Structs::Message};
use crate::Runtime::{
    context, ContextExit, ContextHandle, ContextSpec, ContextState, Directive, TimerSource,
    WorkQueue, WorkStats,
};
use crate::Security::{AccessMonitor, ContextId, GrantTable, Rights};

pub const PRIVILEGED_CONTEXT: ContextId = ContextId(0);
pub const CONSUMER_CONTEXT: ContextId = ContextId(1);

pub const AUTHORIZED_CHANNEL_NAME: &str = "counter_q";
pub const SHADOW_CHANNEL_NAME: &str = "secret_q";

/// Point-in-time view for the `get` command. Every field is read without
/// locking out the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub period_ms: u32,
    pub sequence: u32,
    pub dropped: u64,
    pub coalesced: u64,
    pub queued: usize,
    pub capacity: usize,
    pub consumer_state: ContextState,
    pub consumer_stack_free: usize,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "period={} ms, seq={}, dropped={}, coalesced={}, queued={}/{}, user_stack_free={} bytes, consumer={}",
            self.period_ms,
            self.sequence,
            self.dropped,
            self.coalesced,
            self.queued,
            self.capacity,
            self.consumer_stack_free,
            self.consumer_state
        )
    }
}

/// Processing step run by the restricted consumer for each message.
pub type MessageSink = Box<dyn FnMut(&Message) + Send + 'static>;

/// The running system: timer, privileged producer, both channels, the
/// restricted consumer and the monitor between them.
pub struct SecureCounter {
    config: Config,
    state: Arc<SharedState>,
    monitor: Arc<AccessMonitor>,
    authorized: ChannelHandle,
    shadow: ChannelHandle,
    work: WorkQueue,
    rate: RateController,
    consumer: ContextHandle,
}

impl SecureCounter {
    /// Bring everything up with messages logged by the consumer.
    pub fn start(config: Config) -> Result<Self, SystemError> {
        Self::start_with_sink(config, Box::new(consumer::log_message))
    }

    /// Bring everything up, running `sink` on each message inside the
    /// restricted context.
    pub fn start_with_sink(config: Config, sink: MessageSink) -> Result<Self, SystemError> {
        config.validate()?;
        clock::init();
        info!("secure_counter starting...");

        let state = Arc::new(SharedState::new(config.period.as_millis()));

        let authorized = ChannelBuilder::new()
            .with_channel_id(0)
            .with_name(AUTHORIZED_CHANNEL_NAME)
            .with_capacity(config.channel_capacity)
            .build()?;
        let shadow = ChannelBuilder::new()
            .with_channel_id(1)
            .with_name(SHADOW_CHANNEL_NAME)
            .with_capacity(config.shadow_capacity)
            .build()?;

        // The consumer gets RECV on the public queue only; secret_q is
        // intentionally left out.
        let grants = GrantTable::builder()
            .context(PRIVILEGED_CONTEXT, "sysworkq")
            .grant(PRIVILEGED_CONTEXT, &authorized, Rights::SEND | Rights::RECV)
            .grant(PRIVILEGED_CONTEXT, &shadow, Rights::SEND | Rights::RECV)
            .context(CONSUMER_CONTEXT, "consumer_user")
            .grant(CONSUMER_CONTEXT, &authorized, Rights::RECV)
            .build();
        let monitor = Arc::new(AccessMonitor::new(grants));

        let consumer = {
            let restricted = RestrictedConsumer::new(authorized.clone(), shadow.clone());
            context::spawn(
                ContextSpec::new(CONSUMER_CONTEXT, "consumer_user")
                    .with_stack_size(config.consumer_stack_size),
                Arc::clone(&monitor),
                move |ctx| restricted.run(&ctx, sink),
            )?
        };

        let producer = DeferredProducer::new(Arc::clone(&state), authorized.clone());
        let work = WorkQueue::spawn(
            ContextSpec::new(PRIVILEGED_CONTEXT, "sysworkq"),
            Arc::clone(&monitor),
            move |ctx| {
                producer.produce(ctx);
            },
        )?;

        let submitter = work.submitter();
        let timer = TimerSource::new(
            "tick_timer",
            Arc::new(move || {
                submitter.submit();
            }),
        );
        let rate = RateController::new(Arc::clone(&state), timer);
        rate.start()?;

        info!(
            period_ms = state.period_ms(),
            capacity = authorized.capacity(),
            "secure_counter running"
        );

        Ok(Self {
            config,
            state,
            monitor,
            authorized,
            shadow,
            work,
            rate,
            consumer,
        })
    }

    pub fn status(&self) -> Status {
        Status {
            period_ms: self.state.period_ms(),
            sequence: self.state.sequence(),
            dropped: self.state.dropped(),
            coalesced: self.work.stats().coalesced,
            queued: self.authorized.len(),
            capacity: self.authorized.capacity(),
            consumer_state: self.consumer.state(),
            consumer_stack_free: self.consumer.stack_headroom(),
        }
    }

    /// Validate and apply a period given as text.
    pub fn set_period(&self, raw: &str) -> Result<Period, RateError> {
        self.rate.set_period_str(raw)
    }

    pub fn set_period_ms(&self, ms: u32) -> Result<Period, RateError> {
        let period = Period::new(ms)?;
        self.rate.set_period(period)?;
        Ok(period)
    }

    /// Drive the restricted consumer into the shadow channel and wait for it
    /// to die.
    ///
    /// What comes back is the consumer's termination record, never a value
    /// produced by the forbidden access itself. Once the consumer is gone,
    /// later calls return the same record.
    pub fn attack(&self) -> ContextExit {
        info!("attempting unauthorized access to {}...", self.shadow.name());
        if !self.consumer.post(Directive::ProbeUnauthorized) {
            warn!(context = %self.consumer.name(), "restricted context already terminated");
        }
        self.consumer.wait_exit()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Read-only view of the monitor. Its `Arc` stays private, so nothing
    /// outside can spawn a context under it.
    pub fn monitor(&self) -> &AccessMonitor {
        &self.monitor
    }

    pub fn authorized(&self) -> &ChannelHandle {
        &self.authorized
    }

    pub fn shadow(&self) -> &ChannelHandle {
        &self.shadow
    }

    pub fn consumer(&self) -> &ContextHandle {
        &self.consumer
    }

    pub fn work_stats(&self) -> WorkStats {
        self.work.stats()
    }

    pub fn timer_fires(&self) -> u64 {
        self.rate.timer_fires()
    }

    /// Stop the timer, then the work queue. The consumer has no stop
    /// primitive; its thread is left parked until process exit. Idempotent.
    pub fn shutdown(&self) {
        self.rate.stop();
        self.work.shutdown();
        info!(seq = self.state.sequence(), "secure_counter stopped");
    }
}

impl Drop for SecureCounter {
    fn drop(&mut self) {
        self.rate.stop();
        self.work.shutdown();
    }
}
