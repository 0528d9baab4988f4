pub mod fault;
pub mod grant;
pub mod monitor;

pub use fault::{FaultReason, PermissionFault};
pub use grant::{ContextId, GrantTable, GrantTableBuilder, Rights};
pub use monitor::AccessMonitor;
