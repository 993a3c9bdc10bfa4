// src/gcode/mod.rs
pub mod command;
pub mod filter;
pub mod queue;

pub use command::{PauseCommand, UsageError};
pub use queue::{CommandLine, CommandQueue, CommandSnapshot, RingBuffer, BUFSIZE, MAX_CMD_SIZE};
