//! Streaming control: start/stop state machine, stall watchdog, tick loop

pub mod command;
pub mod supervisor;
pub mod watchdog;

pub use command::Command;
pub use supervisor::{Mode, StreamStats, Supervisor, SupervisorState, TickOutcome};
pub use watchdog::Watchdog;
