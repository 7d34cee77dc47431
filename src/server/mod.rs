//! Server process boundary: spawning, console events, line decoding.

mod event;
mod parser;
mod process;

pub use event::{EventKind, ServerEvent, SERVER_AUTHOR};
pub use parser::LineDecoder;
pub use process::{ServerCommand, ServerProcess, SpawnError};
