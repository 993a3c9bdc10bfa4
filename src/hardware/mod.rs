// src/hardware/mod.rs
pub mod hardware_traits;

pub use hardware_traits::{
    Buzzer, Display, HostChannel, MediaStorage, MediaStream, MotionControl, Position, PrintTimer,
    Screen, ThermalControl, MAX_HEATERS,
};

use crate::gcode::CommandQueue;
use crate::host_actions::HostActions;
use crate::print_source::PrintSourceTracker;
use crate::scheduler::TimeInterface;

/// Borrowed view of everything the pause/resume controller touches.
///
/// Built fresh for each call from whoever owns the collaborators, so the
/// controller itself holds no references between ticks.
pub struct Peripherals<'a> {
    pub motion: &'a mut dyn MotionControl,
    pub thermal: &'a mut dyn ThermalControl,
    pub media: &'a mut dyn MediaStream,
    pub display: &'a mut dyn Display,
    pub buzzer: &'a mut dyn Buzzer,
    pub job_timer: &'a mut dyn PrintTimer,
    pub host: &'a mut HostActions,
    pub queue: &'a mut CommandQueue,
    pub source: &'a mut PrintSourceTracker,
    pub clock: &'a dyn TimeInterface,
}
