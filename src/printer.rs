// src/printer.rs - Wires the pause/resume core to the simulated peripherals
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use thiserror::Error;

use crate::config::Config;
use crate::gcode::{CommandQueue, PauseCommand, UsageError};
use crate::hardware::{
    HostChannel, MediaStorage, MediaStream, MotionControl, Peripherals, PrintTimer, ThermalControl,
};
use crate::host_actions::HostActions;
use crate::media::{MediaPresence, MediaStateMachine, MediaTransition};
use crate::pause::{PauseError, PauseResumeController};
use crate::print_source::{PrintSource, PrintSourceTracker};
use crate::scheduler::TimeInterface;
use crate::simulator::SimulatedHardware;

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Pause(#[from] PauseError),
    #[error("No mounted media to print from")]
    NoMedia,
    #[error("Command queue full")]
    QueueFull,
    #[error("Printer busy: {0}")]
    Busy(&'static str),
}

pub struct Printer {
    pub hardware: SimulatedHardware,
    host: HostActions,
    queue: CommandQueue,
    source: PrintSourceTracker,
    media_state: MediaStateMachine,
    controller: PauseResumeController,
    clock: Arc<dyn TimeInterface>,
}

impl Printer {
    pub fn new(config: &Config, clock: Arc<dyn TimeInterface>, channel: Box<dyn HostChannel>) -> Self {
        Self {
            hardware: SimulatedHardware::new(&config.simulator),
            host: HostActions::new(channel),
            queue: CommandQueue::new(),
            source: PrintSourceTracker::new(),
            media_state: MediaStateMachine::new(),
            controller: PauseResumeController::new(config),
            clock,
        }
    }

    pub fn controller(&self) -> &PauseResumeController {
        &self.controller
    }

    pub fn source(&self) -> &PrintSourceTracker {
        &self.source
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn host_mut(&mut self) -> &mut HostActions {
        &mut self.host
    }

    /// Run `f` with the controller and a fresh peripheral view.
    fn with_io<R>(
        &mut self,
        f: impl FnOnce(&mut PauseResumeController, &mut Peripherals<'_>) -> R,
    ) -> R {
        let Self {
            hardware,
            host,
            queue,
            source,
            controller,
            clock,
            ..
        } = self;
        let mut io = Peripherals {
            motion: &mut hardware.motion,
            thermal: &mut hardware.thermal,
            media: &mut hardware.card,
            display: &mut hardware.display,
            buzzer: &mut hardware.buzzer,
            job_timer: &mut hardware.timer,
            host,
            queue,
            source,
            clock: &**clock,
        };
        f(controller, &mut io)
    }

    pub fn start_media_print(&mut self) -> Result<(), PrinterError> {
        if self.controller.is_pause_active() {
            return Err(PrinterError::Busy("pause active"));
        }
        if !self.hardware.card.start_print() {
            return Err(PrinterError::NoMedia);
        }
        self.source.set_sd();
        self.hardware.timer.start();
        tracing::info!("Media print started");
        Ok(())
    }

    pub fn start_host_print(&mut self) -> Result<(), PrinterError> {
        if self.controller.is_pause_active() {
            return Err(PrinterError::Busy("pause active"));
        }
        self.source.set_host();
        self.host.start(&self.source);
        self.hardware.timer.start();
        tracing::info!("Host print started");
        Ok(())
    }

    /// Cancel the job and drop any pause episode without moving.
    pub fn stop_print(&mut self) {
        self.host.cancel(&self.source);
        if self.hardware.card.is_file_open() {
            self.hardware.card.abort_file_print();
        }
        self.queue.clear();
        self.hardware.timer.stop();
        self.with_io(|controller, io| controller.abort(io));
        tracing::info!("Print stopped");
    }

    /// Answer to the display's confirmation popup.
    pub fn popup_response(&mut self, confirmed: bool) {
        if self.controller.popup_pause_response_suppressed() {
            // The only popup during an M1125 pause is the heater timeout prompt.
            if confirmed {
                self.with_io(|controller, io| controller.heater_timeout_continue(io));
            }
            return;
        }
        tracing::debug!("Popup response {} with no M1125 prompt open, ignored", confirmed);
    }

    /// Dispatch one G-code line the way the firmware's command parser would.
    pub fn handle_line(&mut self, line: &str) -> Result<(), PrinterError> {
        if let Some(parsed) = PauseCommand::parse_line(line) {
            let command = parsed.inspect_err(|e| {
                tracing::warn!("{}", e);
                self.host.echo(&e.to_string());
            })?;
            return Ok(self.with_io(|controller, io| controller.handle_command(command, io))?);
        }

        let words = Words::parse(line);
        match words.command.as_str() {
            "M104" | "M140" | "M109" | "M190" => {
                let heater = if words.command == "M104" || words.command == "M109" { 0 } else { 1 };
                let target = words.get('S').unwrap_or(0.0);
                self.hardware.thermal.set_target(heater, target);
                let waits = words.command == "M109" || words.command == "M190";
                if waits && target > 0.0 && !self.hardware.timer.is_running() {
                    if self.controller.auto_job_timer_suppressed() {
                        tracing::debug!("{}: job timer auto-start suppressed while paused", words.command);
                    } else {
                        self.hardware.timer.start();
                    }
                }
                Ok(())
            }
            "" => Ok(()),
            _ => {
                if self.queue.enqueue(line, false) {
                    Ok(())
                } else {
                    Err(PrinterError::QueueFull)
                }
            }
        }
    }

    /// Console verbs of the simulator (`start sd`, `continue`, `remove`, ...)
    /// with plain G-code as the fallback.
    pub fn handle_request(&mut self, line: &str) -> Result<(), PrinterError> {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (None, _) => Ok(()),
            (Some("start"), Some("sd")) => self.start_media_print(),
            (Some("start"), Some("host")) => self.start_host_print(),
            (Some("continue"), None) => {
                self.popup_response(true);
                Ok(())
            }
            (Some("abort"), None) => {
                self.stop_print();
                Ok(())
            }
            (Some("insert"), kind) => {
                let presence = match kind {
                    Some("usb") => MediaPresence::UsbDrive,
                    _ => MediaPresence::SdCard,
                };
                self.hardware.card.insert(presence);
                Ok(())
            }
            (Some("remove"), None) => {
                self.hardware.card.remove();
                Ok(())
            }
            (Some("status"), None) => {
                println!("{}", self.status_report());
                Ok(())
            }
            _ => self.handle_line(line),
        }
    }

    /// Serve `requests` and tick every `period` until all senders are gone.
    ///
    /// Blocks the calling thread, including the beep spacing of a pause, so
    /// async callers run it through `spawn_blocking`.
    pub fn run(&mut self, requests: &Receiver<String>, period: Duration) {
        let mut last_tick = self.clock.now_monotonic();
        loop {
            let since = self.clock.now_monotonic().saturating_duration_since(last_tick);
            match requests.recv_timeout(period.saturating_sub(since)) {
                Ok(line) => {
                    let line = line.trim();
                    if let Err(e) = self.handle_request(line) {
                        tracing::warn!("'{}': {}", line, e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            let now = self.clock.now_monotonic();
            let dt = now.saturating_duration_since(last_tick);
            if dt >= period {
                self.tick(dt);
                last_tick = now;
            }
        }
        tracing::info!("Request channel closed, printer loop stopped");
    }

    /// One main-loop iteration: physics, media, command execution, pause
    /// servicing.
    pub fn tick(&mut self, dt: Duration) {
        self.hardware.thermal.step(dt);

        let transition = self
            .media_state
            .poll(&mut self.hardware.card, &mut self.hardware.display);
        if let MediaTransition::Removed { aborted: true } = transition {
            // A stale open file says nothing about who drives the job.
            let media_job = self.source.is_sd()
                || self.controller.paused_source() == PrintSource::OnboardMedia;
            if media_job {
                self.queue.clear();
                self.hardware.timer.stop();
                self.with_io(|controller, io| controller.abort(io));
            } else {
                tracing::info!("Media removed; {:?} job left running", self.source.get());
            }
        }

        if !self.controller.is_pause_active() {
            while !self.queue.is_full(1) {
                let Some(line) = self.hardware.card.next_line() else { break };
                self.queue.enqueue(&line, false);
            }
            self.execute_next();
        }

        self.with_io(|controller, io| controller.poll(io));
    }

    fn execute_next(&mut self) {
        let Some(line) = self.queue.dequeue() else { return };
        let text = line.as_str();
        if PauseCommand::parse_line(text).is_some() {
            if let Err(e) = self.handle_line(text) {
                tracing::warn!("'{}': {}", text, e);
            }
            return;
        }
        let words = Words::parse(text);
        if words.command == "G0" || words.command == "G1" {
            let mut target = self.hardware.motion.current_position();
            target.x = words.get('X').unwrap_or(target.x);
            target.y = words.get('Y').unwrap_or(target.y);
            target.z = words.get('Z').unwrap_or(target.z);
            target.e = words.get('E').unwrap_or(target.e);
            let feedrate = words.get('F').map_or(50.0, |f| f / 60.0);
            self.hardware.motion.move_to(target, feedrate);
        } else {
            tracing::debug!("Ignoring '{}'", text);
        }
    }

    pub fn status_report(&self) -> String {
        let position = self.hardware.motion.current_position();
        let temps: Vec<String> = (0..self.hardware.thermal.heater_count())
            .map(|h| {
                format!(
                    "T{}:{:.1}/{:.1}",
                    h,
                    self.hardware.thermal.actual(h),
                    self.hardware.thermal.target(h)
                )
            })
            .collect();
        format!(
            "phase={:?} source={:?} X{:.2} Y{:.2} Z{:.2} E{:.2} {} queue={} status='{}'",
            self.controller.phase(),
            self.source.get(),
            position.x,
            position.y,
            position.z,
            position.e,
            temps.join(" "),
            self.queue.len(),
            self.hardware.display.status
        )
    }
}

/// Minimal G-code word splitter: command token plus letter/value pairs.
struct Words {
    command: String,
    params: Vec<(char, f64)>,
}

impl Words {
    fn parse(line: &str) -> Self {
        let code = line.split(';').next().unwrap_or("");
        let mut tokens = code.split_whitespace();
        let command = tokens.next().unwrap_or("").to_ascii_uppercase();
        let params = tokens
            .filter_map(|token| {
                let mut chars = token.chars();
                let letter = chars.next()?.to_ascii_uppercase();
                let value = chars.as_str().parse().ok()?;
                Some((letter, value))
            })
            .collect();
        Self { command, params }
    }

    fn get(&self, letter: char) -> Option<f64> {
        self.params
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, v)| *v)
    }
}
