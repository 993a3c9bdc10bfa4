// src/pause/mod.rs - M1125 pause/resume controller
//!
//! Parks the nozzle, preserves the in-flight media commands and keeps the
//! heaters under an idle watchdog until the user resumes. A resume is two
//! phased: [`PauseResumeController::resume`] re-applies temperatures and
//! marks the resume pending, then [`PauseResumeController::poll`] finishes
//! it once every heater is back within tolerance.

pub mod episode;

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{Config, HeaterTimeoutConfig, PauseConfig};
use crate::gcode::filter::should_skip_saved_command;
use crate::gcode::{PauseCommand, UsageError};
use crate::hardware::{Peripherals, Position, Screen, MAX_HEATERS};
use crate::heater_timeout::{
    capture_targets, HeaterIdleTimeoutManager, IdleTimeoutProvider, TimeoutEvent, TimeoutState,
};
use crate::print_source::PrintSource;

pub use episode::{PauseEpisode, SuppressionToken};

pub const STATUS_PARKING: &str = "Parking Nozzle...";
pub const STATUS_PARKED: &str = "Nozzle Parked.";
pub const STATUS_RESUMING: &str = "Resuming print...";
pub const STATUS_WAITING: &str = "Waiting for heater...";
pub const STATUS_HEATERS_DISABLED: &str = "Heaters disabled (timeout)";

#[derive(Debug, Error, PartialEq)]
pub enum PauseError {
    #[error("Pause already active")]
    AlreadyActive,
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Observable lifecycle of a pause episode. `pause()` runs to completion in
/// one call, so the transient pausing step is never visible and goes
/// straight from `Idle` to `Parked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausePhase {
    Idle,
    Parked,
    GracePending,
    HeatersDisabled,
    ResumePending,
}

pub struct PauseResumeController<P = HeaterIdleTimeoutManager> {
    pause_config: PauseConfig,
    timeout_config: HeaterTimeoutConfig,
    watchdog: P,
    episode: PauseEpisode,
}

impl PauseResumeController<HeaterIdleTimeoutManager> {
    pub fn new(config: &Config) -> Self {
        let watchdog = HeaterIdleTimeoutManager::new(config.heater_timeout.settings());
        Self::with_provider(config, watchdog)
    }
}

impl<P: IdleTimeoutProvider> PauseResumeController<P> {
    pub fn with_provider(config: &Config, watchdog: P) -> Self {
        Self {
            pause_config: config.pause.clone(),
            timeout_config: config.heater_timeout.clone(),
            watchdog,
            episode: PauseEpisode::default(),
        }
    }

    pub fn handle_command(
        &mut self,
        command: PauseCommand,
        io: &mut Peripherals<'_>,
    ) -> Result<(), PauseError> {
        match command {
            PauseCommand::Pause => self.pause(io),
            PauseCommand::Resume { feedrate } => self.resume(feedrate, io),
        }
    }

    pub fn is_pause_active(&self) -> bool {
        self.episode.active
    }

    pub fn is_resume_pending(&self) -> bool {
        self.episode.resume_pending
    }

    pub fn phase(&self) -> PausePhase {
        if !self.episode.active {
            return PausePhase::Idle;
        }
        if self.episode.resume_pending {
            return PausePhase::ResumePending;
        }
        match self.watchdog.state() {
            TimeoutState::GracePending => PausePhase::GracePending,
            TimeoutState::Disabled => PausePhase::HeatersDisabled,
            TimeoutState::Armed | TimeoutState::Idle => PausePhase::Parked,
        }
    }

    /// While set, a confirmation popup response must not be read as the
    /// generic pause menu's Resume/Purge choice.
    pub fn popup_pause_response_suppressed(&self) -> bool {
        self.episode.popup_suppression.is_some()
    }

    /// While set, heater-wait commands must not auto-start the job timer.
    pub fn auto_job_timer_suppressed(&self) -> bool {
        self.episode.timer_suppression.is_some()
    }

    pub fn saved_position(&self) -> Option<Position> {
        self.episode.saved_position
    }

    pub fn saved_commands(&self) -> impl Iterator<Item = &str> + '_ {
        self.episode.saved_commands.iter().map(|line| line.as_str())
    }

    pub fn paused_source(&self) -> PrintSource {
        self.episode.source
    }

    pub fn watchdog(&self) -> &P {
        &self.watchdog
    }

    /// Enter the paused state: capture, retract, wipe, park, alert.
    pub fn pause(&mut self, io: &mut Peripherals<'_>) -> Result<(), PauseError> {
        if self.episode.active {
            tracing::warn!("M1125: pause requested while already paused, ignoring");
            return Err(PauseError::AlreadyActive);
        }

        io.display.set_status(STATUS_PARKING);
        let from_media = io.media.is_file_open() && io.media.is_streaming();
        if from_media {
            io.source.set_sd();
        } else {
            io.source.set_host();
        }

        self.episode.source = io.source.get();
        self.episode.popup_suppression = Some(SuppressionToken::acquire());
        self.episode.timer_suppression = Some(SuppressionToken::acquire());

        if from_media {
            self.preserve_media_commands(io);
        }

        io.motion.synchronize();
        let saved = io.motion.current_position();
        self.episode.saved_position = Some(saved);
        io.job_timer.pause();
        tracing::info!(
            "M1125: pausing at X{:.3} Y{:.3} Z{:.3} E{:.3} ({:?})",
            saved.x,
            saved.y,
            saved.z,
            saved.e,
            self.episode.source
        );

        self.retract_lift_wipe(io, saved);
        self.park(io);
        self.alert(io);

        io.display.set_status(STATUS_PARKED);
        io.display.goto_screen(Screen::PrintPaused);

        let now = io.clock.now_monotonic();
        let targets = capture_targets(&*io.thermal);
        self.episode.saved_targets = targets;
        self.watchdog.start(&targets, now);

        self.episode.active = true;
        self.episode.parked_at = Some(now);
        self.episode.next_countdown = None;

        if !from_media {
            io.host.pause(io.source);
        }
        Ok(())
    }

    /// Stop the media stream and move the queued commands aside so the
    /// resume replays exactly what had not executed yet.
    fn preserve_media_commands(&mut self, io: &mut Peripherals<'_>) {
        let offset = io.media.offset();
        io.media.pause_stream();

        self.episode.saved_commands.clear();
        for line in io.queue.iter() {
            if should_skip_saved_command(line.as_str()) {
                tracing::debug!("M1125: not preserving '{}'", line.as_str());
                continue;
            }
            if !self.episode.saved_commands.push(line) {
                tracing::warn!("M1125: preserved command set full, dropping '{}'", line.as_str());
            }
        }
        tracing::debug!(
            "M1125: preserved {} of {} queued commands at offset {}",
            self.episode.saved_commands.len(),
            io.queue.len(),
            offset
        );
        io.queue.clear();

        io.media.set_offset(offset);
        self.episode.saved_offset = Some(offset);
    }

    fn retract_lift_wipe(&self, io: &mut Peripherals<'_>, saved: Position) {
        let cfg = &self.pause_config;
        let mut target = saved;

        target.e -= cfg.retract_length;
        io.motion.move_to(target, cfg.retract_feedrate);

        target.z = (target.z + cfg.z_lift).min(cfg.max_z);
        io.motion.move_to(target, cfg.travel_feedrate);

        if cfg.wipe_distance > 0.0 {
            let start_x = target.x;
            target.x = start_x + cfg.wipe_distance;
            io.motion.move_to(target, cfg.travel_feedrate);
            target.x = start_x;
            io.motion.move_to(target, cfg.travel_feedrate);
        }
        io.motion.synchronize();
    }

    fn park(&self, io: &mut Peripherals<'_>) {
        let cfg = &self.pause_config;
        let mut target = io.motion.current_position();
        match cfg.park {
            Some(point) => {
                target.z = (target.z + point.z_raise).min(cfg.max_z);
                io.motion.move_to(target, cfg.travel_feedrate);
                target.x = point.x;
                target.y = point.y;
                io.motion.move_to(target, cfg.travel_feedrate);
            }
            None => {
                target.z = (target.z + cfg.park_z_raise_min).min(cfg.max_z);
                io.motion.move_to(target, cfg.travel_feedrate);
            }
        }
        io.motion.synchronize();
    }

    fn alert(&self, io: &mut Peripherals<'_>) {
        let cfg = &self.pause_config;
        let gap = Duration::from_millis(u64::from(cfg.beep_duration_ms) + cfg.beep_spacing_ms);
        for pulse in 0..cfg.beep_count {
            io.buzzer.beep(cfg.beep_duration_ms, cfg.beep_frequency_hz);
            if pulse + 1 < cfg.beep_count {
                io.clock.sleep(gap);
            }
        }
    }

    /// Re-apply temperatures and mark the resume pending. Motion happens in
    /// [`Self::poll`] once the heaters are back on temperature.
    pub fn resume(
        &mut self,
        feedrate: Option<f64>,
        io: &mut Peripherals<'_>,
    ) -> Result<(), PauseError> {
        if !self.episode.active {
            tracing::debug!("M1125 R: no pause episode, nothing to resume");
            return Ok(());
        }

        let now = io.clock.now_monotonic();
        let targets = self
            .watchdog
            .saved_targets()
            .copied()
            .unwrap_or(self.episode.saved_targets);
        self.episode.saved_targets = targets;
        for (heater, target) in targets
            .iter()
            .enumerate()
            .take(io.thermal.heater_count())
        {
            io.thermal.set_target(heater, *target);
        }
        self.watchdog.rearm(now);

        self.episode.resume_to_sd = self.episode.source == PrintSource::OnboardMedia;
        self.episode.resume_to_host = !self.episode.resume_to_sd;
        self.episode.resume_feedrate = feedrate.unwrap_or(self.pause_config.resume_feedrate);
        self.episode.resume_pending = true;
        self.episode.waiting_reported = false;

        io.display.set_status(STATUS_RESUMING);
        tracing::info!(
            "M1125 R: resume requested ({}), feedrate {} mm/s",
            if self.episode.resume_to_sd { "media" } else { "host" },
            self.episode.resume_feedrate
        );
        Ok(())
    }

    /// Periodic service: watchdog, countdown, and pending resume completion.
    pub fn poll(&mut self, io: &mut Peripherals<'_>) {
        if !self.episode.active {
            return;
        }
        let now = io.clock.now_monotonic();

        match self.watchdog.poll(now, &mut *io.thermal, &mut *io.display) {
            TimeoutEvent::HeatersDisabled => io.display.set_status(STATUS_HEATERS_DISABLED),
            TimeoutEvent::PromptShown | TimeoutEvent::None => {}
        }

        if self.episode.resume_pending {
            self.try_finish_resume(io);
        } else {
            self.update_countdown(io, now);
        }
    }

    fn update_countdown(&mut self, io: &mut Peripherals<'_>, now: Instant) {
        let Some(parked_at) = self.episode.parked_at else { return };
        if now < parked_at + Duration::from_secs(self.timeout_config.countdown_delay_secs) {
            return;
        }
        if self.episode.next_countdown.is_some_and(|next| now < next) {
            return;
        }
        self.episode.next_countdown =
            Some(now + Duration::from_secs(self.timeout_config.countdown_interval_secs));

        let remaining = self.watchdog.remaining_secs(now);
        if remaining > 0 {
            io.display
                .set_status(&format!("Heaters timeout in {} seconds", remaining));
        }
    }

    /// First saved heater that is still outside the tolerance band.
    fn heater_out_of_band(&self, io: &Peripherals<'_>) -> Option<(usize, f64, f64)> {
        let tolerance = self.timeout_config.temp_tolerance;
        (0..io.thermal.heater_count().min(MAX_HEATERS)).find_map(|heater| {
            let target = self.episode.saved_targets[heater];
            let actual = io.thermal.actual(heater);
            (target > 0.0 && (actual - target).abs() > tolerance).then_some((heater, actual, target))
        })
    }

    fn try_finish_resume(&mut self, io: &mut Peripherals<'_>) {
        if let Some((heater, actual, target)) = self.heater_out_of_band(io) {
            if !self.episode.waiting_reported {
                io.display.set_status(STATUS_WAITING);
                self.episode.waiting_reported = true;
            }
            tracing::debug!(
                "M1125 R: waiting for heater {} ({:.1}/{:.1})",
                heater,
                actual,
                target
            );
            return;
        }
        self.finish_resume(io);
    }

    fn finish_resume(&mut self, io: &mut Peripherals<'_>) {
        let to_media = self.episode.resume_to_sd;
        let feedrate = self.episode.resume_feedrate;

        match self.episode.saved_position.take() {
            Some(saved) => {
                self.return_to(io, saved, feedrate);
                if to_media {
                    io.motion.set_e_position(saved.e);
                }
            }
            None => {
                tracing::error!("M1125 R: no valid saved position, skipping return move");
            }
        }

        self.episode.timer_suppression = None;

        if to_media {
            if !io.queue.is_empty() {
                tracing::warn!(
                    "M1125 R: {} commands already queued ahead of preserved commands",
                    io.queue.len()
                );
            }
            for line in self.episode.saved_commands.iter() {
                if !io.queue.enqueue_line(line) {
                    tracing::warn!("M1125 R: queue full, dropping preserved '{}'", line.as_str());
                }
            }
            if let Some(offset) = self.episode.saved_offset {
                io.media.set_offset(offset);
            }
            io.media.resume_stream();
            io.source.set_sd();
        } else {
            io.source.set_host();
            io.host.resume(io.source);
        }
        io.job_timer.start();

        self.watchdog.abort();
        self.episode = PauseEpisode::default();
        io.display.set_status("");
        io.display.goto_screen(Screen::Printing);
        tracing::info!("M1125 R: print resumed");
    }

    /// Blocking move back to `saved`. XY first when coming down onto the
    /// print, Z first when the saved height is above the park height.
    fn return_to(&self, io: &mut Peripherals<'_>, saved: Position, feedrate: f64) {
        io.motion.synchronize();
        let mut target = io.motion.current_position();
        if saved.z < target.z {
            target.x = saved.x;
            target.y = saved.y;
            io.motion.move_to(target, feedrate);
            target.z = saved.z;
            io.motion.move_to(target, feedrate);
        } else {
            target.z = saved.z;
            io.motion.move_to(target, feedrate);
            target.x = saved.x;
            target.y = saved.y;
            io.motion.move_to(target, feedrate);
        }
        io.motion.synchronize();
    }

    /// The user answered Continue on the heater timeout prompt.
    pub fn heater_timeout_continue(&mut self, io: &mut Peripherals<'_>) {
        if !self.episode.active {
            tracing::debug!("Heater timeout continue with no pause episode");
            return;
        }
        let was_disabled = self.watchdog.state() == TimeoutState::Disabled;
        let now = io.clock.now_monotonic();
        self.watchdog.continue_(now, &mut *io.thermal);
        if was_disabled && !self.episode.resume_pending {
            io.display.set_status(STATUS_PARKED);
        }
        self.episode.next_countdown = None;
    }

    /// Drop the whole episode without moving anything. Used when the print
    /// is stopped or its media disappears.
    pub fn abort(&mut self, io: &mut Peripherals<'_>) {
        let was_active = self.episode.active;
        self.watchdog.abort();
        self.episode = PauseEpisode::default();
        io.source.clear();
        if was_active {
            io.display.set_status("");
            tracing::info!("M1125: pause episode aborted");
        }
    }
}
