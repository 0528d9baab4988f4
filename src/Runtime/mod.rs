pub mod context;
pub mod timer;
pub mod work;

pub use context::{ContextExit, ContextHandle, ContextSpec, ContextState, Directive, ExecContext};
pub use timer::TimerSource;
pub use work::{WorkQueue, WorkStats, WorkSubmitter};
