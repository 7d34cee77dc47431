//! Process supervision: lifecycle, readiness, restarts.

mod handle;
mod runner;
mod scheduler;
mod signals;
mod state;

pub use handle::{WrapperHandle, CHAT_HISTORY_CAPACITY, CONSOLE_HISTORY_CAPACITY};
pub use runner::{Wrapper, WrapperError};
pub use scheduler::{RestartScheduler, RESTART_WARNINGS};
pub use signals::{NotRunningError, RunSignals, SleepOutcome};
pub use state::{WrapperState, WrapperStateMachine};
