// src/pause/episode.rs - State of one pause/resume cycle
use std::time::Instant;

use crate::gcode::{CommandSnapshot, BUFSIZE};
use crate::hardware::{Position, MAX_HEATERS};
use crate::heater_timeout::HeaterTargets;
use crate::print_source::PrintSource;

/// Proof that the controller holds a suppression. Only this module can
/// create one, so no other component can raise or drop a suppression.
#[derive(Debug)]
pub struct SuppressionToken {
    _private: (),
}

impl SuppressionToken {
    pub(super) fn acquire() -> Self {
        Self { _private: () }
    }
}

/// Everything captured at pause entry and consumed by the resume.
/// Reset to `Default` on resume finalize and on abort.
#[derive(Debug)]
pub struct PauseEpisode {
    /// `Some` doubles as the saved-position validity flag.
    pub(super) saved_position: Option<Position>,
    pub(super) saved_commands: CommandSnapshot<BUFSIZE>,
    pub(super) saved_offset: Option<u64>,
    pub(super) saved_targets: HeaterTargets,
    pub(super) source: PrintSource,
    pub(super) active: bool,
    pub(super) resume_pending: bool,
    pub(super) resume_to_sd: bool,
    pub(super) resume_to_host: bool,
    pub(super) resume_feedrate: f64,
    /// Keeps the generic pause menu from reading popups as Resume/Purge.
    pub(super) popup_suppression: Option<SuppressionToken>,
    /// Keeps unrelated code from restarting the print job timer.
    pub(super) timer_suppression: Option<SuppressionToken>,
    pub(super) parked_at: Option<Instant>,
    pub(super) next_countdown: Option<Instant>,
    pub(super) waiting_reported: bool,
}

impl Default for PauseEpisode {
    fn default() -> Self {
        Self {
            saved_position: None,
            saved_commands: CommandSnapshot::default(),
            saved_offset: None,
            saved_targets: [0.0; MAX_HEATERS],
            source: PrintSource::None,
            active: false,
            resume_pending: false,
            resume_to_sd: false,
            resume_to_host: false,
            resume_feedrate: 0.0,
            popup_suppression: None,
            timer_suppression: None,
            parked_at: None,
            next_countdown: None,
            waiting_reported: false,
        }
    }
}
