//! Line-oriented operator console.
//!
//! Mirrors the `counter` shell group of the device build: `get`, `set <ms>`
//! and `attack`, with or without the leading `counter` word.

use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::debug;

use crate::error::RateError;
use crate::Runtime::ContextExit;
use crate::system::SecureCounter;

pub const HELP: &str = "\
counter get          show current period, seq, drops and user stack free
counter set <ms>     set period (ms), 10..10000
counter attack       trigger blocked access to secret_q (expect fault)
help                 this text
quit | exit          leave the console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get,
    Set(String),
    Attack,
    Help,
    Quit,
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("unknown command {0:?}; try `help`")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Rate(#[from] RateError),
}

impl FromStr for Command {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace().peekable();
        if words.peek() == Some(&"counter") {
            words.next();
        }
        let verb = words.next().unwrap_or("help");
        let args: Vec<&str> = words.collect();

        match (verb, args.as_slice()) {
            ("get", []) => Ok(Command::Get),
            ("get", _) => Err(ConsoleError::Usage("counter get")),
            ("set", [ms]) => Ok(Command::Set((*ms).to_owned())),
            ("set", _) => Err(ConsoleError::Usage("counter set <ms>")),
            ("attack", []) => Ok(Command::Attack),
            ("attack", _) => Err(ConsoleError::Usage("counter attack")),
            ("help", _) => Ok(Command::Help),
            ("quit" | "exit", _) => Ok(Command::Quit),
            (other, _) => Err(ConsoleError::Unknown(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Quit,
}

pub fn execute(system: &SecureCounter, command: Command) -> Result<Reply, ConsoleError> {
    debug!(?command, "console command");
    let text = match command {
        Command::Get => system.status().to_string(),
        Command::Set(raw) => {
            let period = system.set_period(&raw)?;
            format!("period set to {}", period)
        }
        Command::Attack => {
            let head = format!(
                "attempting unauthorized access to {}...",
                system.shadow().name()
            );
            let exit = system.attack();
            let tail = match &exit {
                ContextExit::Faulted(fault) => {
                    format!("{} terminated: {}", system.consumer().name(), fault)
                }
                other => format!(
                    "{} stopped without a fault: {} (should not happen)",
                    system.consumer().name(),
                    other
                ),
            };
            format!("{head}\n{tail}")
        }
        Command::Help => HELP.to_owned(),
        Command::Quit => return Ok(Reply::Quit),
    };
    Ok(Reply::Print(text))
}

/// Read commands from `input` until EOF, `quit`, or `running` drops to
/// false. Command errors are written to `output`; only I/O failures end the
/// loop early.
pub fn run<R, W>(
    system: &SecureCounter,
    input: R,
    mut output: W,
    running: &AtomicBool,
) -> io::Result<()>
where
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        if !running.load(Ordering::Acquire) {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>().and_then(|command| execute(system, command)) {
            Ok(Reply::Print(text)) => writeln!(output, "{text}")?,
            Ok(Reply::Quit) => break,
            Err(e) => writeln!(output, "error: {e}")?,
        }
        output.flush()?;
    }
    Ok(())
}
