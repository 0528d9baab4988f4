// In src/main.rs
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::Parser;
use secure_counter::{console, Config, Period, SecureCounter};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Privilege-separated counter: a timer-driven producer feeding a
/// restricted consumer through the only channel it is allowed to touch.
#[derive(Debug, Parser)]
#[command(name = "secure-counter", version)]
struct Args {
    /// Initial production period in milliseconds (10..10000).
    #[arg(long, env = "SECURE_COUNTER_PERIOD_MS", default_value_t = 100)]
    period_ms: u32,

    /// Stack size of the restricted consumer, in bytes.
    #[arg(long, env = "SECURE_COUNTER_STACK_SIZE", default_value_t = 64 * 1024)]
    stack_size: usize,

    /// Seconds between "main alive" log lines.
    #[arg(long, env = "SECURE_COUNTER_HEARTBEAT_SECS", default_value_t = 5)]
    heartbeat_secs: u64,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let period = Period::new(self.period_ms).context("--period-ms")?;
        Ok(Config {
            period,
            consumer_stack_size: self.stack_size,
            heartbeat: Duration::from_secs(self.heartbeat_secs),
            ..Config::default()
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let config = Args::parse().into_config()?;
    let heartbeat = config.heartbeat;
    let system = Arc::new(SecureCounter::start(config).context("failed to start")?);

    let keep_alive = Arc::new(AtomicBool::new(true));
    let keep_alive_for_handler = Arc::clone(&keep_alive);
    ctrlc::set_handler(move || {
        keep_alive_for_handler.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")?;

    // Console on its own thread: a blocking stdin read must not hold up
    // shutdown.
    {
        let system = Arc::clone(&system);
        let keep_alive = Arc::clone(&keep_alive);
        thread::Builder::new()
            .name("console".into())
            .spawn(move || {
                let stdin = io::stdin();
                if let Err(e) = console::run(&system, stdin.lock(), io::stdout(), &keep_alive) {
                    tracing::error!(error = %e, "console failed");
                }
                keep_alive.store(false, Ordering::SeqCst);
            })
            .context("failed to spawn console thread")?;
    }

    println!("{}", console::HELP);
    let mut last_beat = Instant::now();
    while keep_alive.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
        if last_beat.elapsed() >= heartbeat {
            last_beat = Instant::now();
            let status = system.status();
            info!(
                seq = status.sequence,
                period_ms = status.period_ms,
                "main alive, seq={}, period={} ms",
                status.sequence,
                status.period_ms
            );
        }
    }

    system.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_capacities_are_not_operator_settable() {
        assert!(Args::try_parse_from(["secure-counter", "--capacity", "8"]).is_err());

        let config = Args::try_parse_from(["secure-counter", "--period-ms", "250"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!(config.period.as_millis(), 250);
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.shadow_capacity, 1);
    }

    #[test]
    fn out_of_range_period_is_rejected_at_launch() {
        let args = Args::try_parse_from(["secure-counter", "--period-ms", "5"]).unwrap();
        assert!(args.into_config().is_err());
    }
}
