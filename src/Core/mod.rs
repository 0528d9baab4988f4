pub mod clock;
pub mod futex;
pub mod state;

pub use state::SharedState;
