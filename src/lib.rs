// src/lib.rs - Pause/park/resume core for a printer firmware
pub mod config;
pub mod gcode;
pub mod hardware;
pub mod heater_timeout;
pub mod host_actions;
pub mod media;
pub mod pause;
pub mod print_source;
pub mod printer;
pub mod scheduler;
pub mod simulator;

pub use config::Config;
pub use pause::{PauseError, PausePhase, PauseResumeController};
pub use printer::{Printer, PrinterError};
