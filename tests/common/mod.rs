// Shared test rig: simulated peripherals plus a controller on a manual clock.
#![allow(dead_code)]

use std::time::Duration;

use krusty_pause::config::Config;
use krusty_pause::gcode::CommandQueue;
use krusty_pause::hardware::{MediaStorage, Peripherals, ThermalControl};
use krusty_pause::host_actions::HostActions;
use krusty_pause::media::MediaPresence;
use krusty_pause::pause::{PauseError, PauseResumeController};
use krusty_pause::print_source::PrintSourceTracker;
use krusty_pause::scheduler::ManualClock;
use krusty_pause::simulator::{HostLog, SimHostChannel, SimulatedHardware};

pub struct Rig {
    pub hw: SimulatedHardware,
    pub host: HostActions,
    pub host_log: HostLog,
    pub queue: CommandQueue,
    pub source: PrintSourceTracker,
    pub clock: ManualClock,
    pub controller: PauseResumeController,
}

impl Rig {
    pub fn new(config: Config) -> Self {
        let (channel, host_log) = SimHostChannel::new();
        Self {
            hw: SimulatedHardware::new(&config.simulator),
            host: HostActions::new(Box::new(channel)),
            host_log,
            queue: CommandQueue::new(),
            source: PrintSourceTracker::new(),
            clock: ManualClock::new(),
            controller: PauseResumeController::new(&config),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    pub fn run<R>(
        &mut self,
        f: impl FnOnce(&mut PauseResumeController, &mut Peripherals<'_>) -> R,
    ) -> R {
        let mut io = Peripherals {
            motion: &mut self.hw.motion,
            thermal: &mut self.hw.thermal,
            media: &mut self.hw.card,
            display: &mut self.hw.display,
            buzzer: &mut self.hw.buzzer,
            job_timer: &mut self.hw.timer,
            host: &mut self.host,
            queue: &mut self.queue,
            source: &mut self.source,
            clock: &self.clock,
        };
        f(&mut self.controller, &mut io)
    }

    pub fn pause(&mut self) -> Result<(), PauseError> {
        self.run(|controller, io| controller.pause(io))
    }

    pub fn resume(&mut self, feedrate: Option<f64>) -> Result<(), PauseError> {
        self.run(|controller, io| controller.resume(feedrate, io))
    }

    pub fn poll(&mut self) {
        self.run(|controller, io| controller.poll(io))
    }

    pub fn advance(&mut self, duration: Duration) {
        self.clock.advance(duration);
    }

    /// Set a heater's target and snap its temperature onto it.
    pub fn heat(&mut self, heater: usize, celsius: f64) {
        self.hw.thermal.set_target(heater, celsius);
        self.hw.thermal.set_temperature(heater, celsius);
    }

    /// Mounted card with a file streaming, tracked as a media print.
    pub fn start_media_print(&mut self) {
        self.hw.card.insert(MediaPresence::SdCard);
        assert!(self.hw.card.mount());
        assert!(self.hw.card.start_print());
        self.source.set_sd();
    }

    pub fn host_lines(&self) -> Vec<String> {
        self.host_log.lock().unwrap().clone()
    }

    pub fn queued(&self) -> Vec<String> {
        self.queue.iter().map(|line| line.as_str().to_string()).collect()
    }
}
