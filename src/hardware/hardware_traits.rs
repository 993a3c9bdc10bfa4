// Trait-based interfaces for the collaborators the pause/resume core drives.
//
// Real firmware backs these with the planner, the thermal manager, the card
// reader and the display driver; `crate::simulator` backs them in memory.

use crate::media::MediaPresence;

/// Upper bound on heaters tracked by one pause episode (hotends + bed).
pub const MAX_HEATERS: usize = 4;

/// Toolhead position in mm, extruder included.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub e: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64, e: f64) -> Self {
        Self { x, y, z, e }
    }
}

/// Motion planner. Moves are queued; `synchronize` blocks until the queue
/// has drained and is the only suspension point of the pause sequence.
pub trait MotionControl {
    fn synchronize(&mut self);
    fn current_position(&self) -> Position;
    /// Queue a move to `target` at `feedrate` mm/s.
    fn move_to(&mut self, target: Position, feedrate: f64);
    /// Redefine the extruder coordinate without moving.
    fn set_e_position(&mut self, e: f64);
}

pub trait ThermalControl {
    fn heater_count(&self) -> usize;
    fn target(&self, heater: usize) -> f64;
    fn set_target(&mut self, heater: usize, celsius: f64);
    fn actual(&self, heater: usize) -> f64;
}

/// Streaming side of the onboard media reader.
pub trait MediaStream {
    fn is_file_open(&self) -> bool;
    fn is_streaming(&self) -> bool;
    fn pause_stream(&mut self);
    fn offset(&self) -> u64;
    fn set_offset(&mut self, offset: u64);
    fn resume_stream(&mut self);
}

/// Presence/mount side of the onboard media reader.
pub trait MediaStorage {
    fn presence(&self) -> MediaPresence;
    fn is_mounted(&self) -> bool;
    /// Try to mount; returns the resulting mounted state.
    fn mount(&mut self) -> bool;
    fn unmount(&mut self);
    fn is_printing(&self) -> bool;
    fn is_print_start_pending(&self) -> bool;
    /// Clear the printing/pending flags and raise the abort flag.
    fn abort_file_print(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Main,
    Printing,
    PrintPaused,
    Popup,
}

pub trait Display {
    fn set_status(&mut self, message: &str);
    fn goto_screen(&mut self, screen: Screen);
    /// Show a Continue/No popup. The answer comes back asynchronously
    /// through the controller's continue hook.
    fn confirm_popup(&mut self, title: &str, message: &str);
    fn is_ready(&self) -> bool;
    fn media_changed(&mut self, old: MediaPresence, new: MediaPresence);
}

pub trait Buzzer {
    fn beep(&mut self, duration_ms: u16, frequency_hz: u16);
}

/// Elapsed print time clock.
pub trait PrintTimer {
    fn start(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn is_paused(&self) -> bool;
}

/// Line-oriented serial link to a host.
pub trait HostChannel: Send {
    fn send_line(&mut self, line: &str);
    fn is_connected(&self) -> bool;
}
