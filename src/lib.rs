// Module naming follows project convention (IPC = inter-context channels)
#[allow(non_snake_case)]
pub mod IPC;
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod Security;
#[allow(non_snake_case)]
pub mod Runtime;
#[allow(non_snake_case)]
pub mod Debug;

pub mod config;
pub mod console;
pub mod error;
pub mod rate;
pub mod system;

pub use config::Config;
pub use error::{ChannelError, PeriodError, RateError, SystemError};
pub use rate::Period;
pub use system::{SecureCounter, Status};
