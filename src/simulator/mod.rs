// src/simulator/mod.rs - In-memory printer peripherals
pub mod card;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SimulatorConfig;
use crate::hardware::{
    Buzzer, Display, HostChannel, MotionControl, Position, PrintTimer, Screen, ThermalControl,
};
use crate::media::MediaPresence;

pub use card::SimCard;

/// Records every move. Moves complete instantly.
#[derive(Debug, Default, Clone)]
pub struct SimMotion {
    pub position: Position,
    pub moves: Vec<(Position, f64)>,
    pub synchronize_calls: usize,
}

impl SimMotion {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl MotionControl for SimMotion {
    fn synchronize(&mut self) {
        self.synchronize_calls += 1;
    }

    fn current_position(&self) -> Position {
        self.position
    }

    fn move_to(&mut self, target: Position, feedrate: f64) {
        tracing::trace!(
            "move X{:.3} Y{:.3} Z{:.3} E{:.3} F{:.1}",
            target.x,
            target.y,
            target.z,
            target.e,
            feedrate
        );
        self.moves.push((target, feedrate));
        self.position = target;
    }

    fn set_e_position(&mut self, e: f64) {
        self.position.e = e;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimHeater {
    pub target: f64,
    pub temperature: f64,
}

/// First-order heaters that ramp toward their target at `heat_rate` °C/s
/// and cool back to ambient when the target is zero.
#[derive(Debug, Clone)]
pub struct SimThermal {
    pub heaters: Vec<SimHeater>,
    ambient: f64,
    heat_rate: f64,
    sensor_noise: f64,
}

impl SimThermal {
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            heaters: vec![
                SimHeater {
                    target: 0.0,
                    temperature: config.ambient,
                };
                config.heater_count
            ],
            ambient: config.ambient,
            heat_rate: config.heat_rate,
            sensor_noise: config.sensor_noise,
        }
    }

    pub fn step(&mut self, dt: Duration) {
        let max_delta = self.heat_rate * dt.as_secs_f64();
        for heater in &mut self.heaters {
            let goal = if heater.target > 0.0 {
                heater.target
            } else {
                self.ambient
            };
            let delta = (goal - heater.temperature).clamp(-max_delta, max_delta);
            heater.temperature += delta;
        }
    }

    /// Force a heater's true temperature, bypassing the ramp.
    pub fn set_temperature(&mut self, heater: usize, celsius: f64) {
        if let Some(h) = self.heaters.get_mut(heater) {
            h.temperature = celsius;
        }
    }
}

impl ThermalControl for SimThermal {
    fn heater_count(&self) -> usize {
        self.heaters.len()
    }

    fn target(&self, heater: usize) -> f64 {
        self.heaters.get(heater).map_or(0.0, |h| h.target)
    }

    fn set_target(&mut self, heater: usize, celsius: f64) {
        match self.heaters.get_mut(heater) {
            Some(h) => h.target = celsius,
            None => tracing::warn!("set_target on unknown heater {}", heater),
        }
    }

    fn actual(&self, heater: usize) -> f64 {
        let Some(h) = self.heaters.get(heater) else { return 0.0 };
        if self.sensor_noise > 0.0 {
            h.temperature + (rand::random::<f64>() - 0.5) * self.sensor_noise
        } else {
            h.temperature
        }
    }
}

/// Display stand-in that keeps a history of everything shown.
#[derive(Debug, Clone)]
pub struct SimDisplay {
    pub ready: bool,
    pub status: String,
    pub status_history: Vec<String>,
    pub screen: Screen,
    pub popups: Vec<(String, String)>,
    pub media_events: Vec<(MediaPresence, MediaPresence)>,
}

impl Default for SimDisplay {
    fn default() -> Self {
        Self {
            ready: true,
            status: String::new(),
            status_history: Vec::new(),
            screen: Screen::Main,
            popups: Vec::new(),
            media_events: Vec::new(),
        }
    }
}

impl Display for SimDisplay {
    fn set_status(&mut self, message: &str) {
        if !message.is_empty() {
            tracing::info!("[display] {}", message);
        }
        self.status = message.to_string();
        self.status_history.push(message.to_string());
    }

    fn goto_screen(&mut self, screen: Screen) {
        self.screen = screen;
    }

    fn confirm_popup(&mut self, title: &str, message: &str) {
        tracing::info!("[display] popup '{}': {}", title, message);
        self.screen = Screen::Popup;
        self.popups.push((title.to_string(), message.to_string()));
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn media_changed(&mut self, old: MediaPresence, new: MediaPresence) {
        self.media_events.push((old, new));
    }
}

#[derive(Debug, Default, Clone)]
pub struct SimBuzzer {
    pub beeps: Vec<(u16, u16)>,
}

impl Buzzer for SimBuzzer {
    fn beep(&mut self, duration_ms: u16, frequency_hz: u16) {
        self.beeps.push((duration_ms, frequency_hz));
    }
}

#[derive(Debug, Default, Clone)]
pub struct SimTimer {
    running: bool,
    paused: bool,
    pub starts: usize,
}

impl PrintTimer for SimTimer {
    fn start(&mut self) {
        self.running = true;
        self.paused = false;
        self.starts += 1;
    }

    fn pause(&mut self) {
        if self.running {
            self.running = false;
            self.paused = true;
        }
    }

    fn stop(&mut self) {
        self.running = false;
        self.paused = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Shared record of lines sent to the host.
pub type HostLog = Arc<Mutex<Vec<String>>>;

/// Host link that appends every line to a shared log.
#[derive(Debug, Clone)]
pub struct SimHostChannel {
    log: HostLog,
    connected: bool,
}

impl SimHostChannel {
    pub fn new() -> (Self, HostLog) {
        let log = HostLog::default();
        (
            Self {
                log: log.clone(),
                connected: true,
            },
            log,
        )
    }
}

impl HostChannel for SimHostChannel {
    fn send_line(&mut self, line: &str) {
        let mut log = self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        log.push(line.to_string());
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Host link that prints to stdout, for the interactive binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutChannel;

impl HostChannel for StdoutChannel {
    fn send_line(&mut self, line: &str) {
        println!("{}", line);
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// All simulated peripherals of one printer.
#[derive(Debug, Clone)]
pub struct SimulatedHardware {
    pub motion: SimMotion,
    pub thermal: SimThermal,
    pub card: SimCard,
    pub display: SimDisplay,
    pub buzzer: SimBuzzer,
    pub timer: SimTimer,
}

impl SimulatedHardware {
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            motion: SimMotion::default(),
            thermal: SimThermal::new(config),
            card: SimCard::new(config.media_file_lines),
            display: SimDisplay::default(),
            buzzer: SimBuzzer::default(),
            timer: SimTimer::default(),
        }
    }
}
