//! # Pause / Resume Configuration
//!
//! Tunables for the park sequence, the heater idle watchdog and the
//! simulated printer. Every field has a default, so an empty file is valid.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [pause]
//! retract_length = 2.0
//! z_lift = 0.4
//! beep_count = 6
//!
//! [pause.park]
//! x = 10.0
//! y = 200.0
//! z_raise = 20.0
//!
//! [heater_timeout]
//! idle_timeout_secs = 300
//! grace_period_secs = 30
//! temp_tolerance = 3.0
//! ```
//!
//! ## Example: Rust Usage
//!
//! ```rust
//! use krusty_pause::config::Config;
//! let config: Config = toml::from_str("[heater_timeout]\nidle_timeout_secs = 120\n").unwrap();
//! assert_eq!(config.heater_timeout.idle_timeout_secs, 120);
//! assert!(config.pause.park.is_none());
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::heater_timeout::TimeoutSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pause: PauseConfig,
    #[serde(default)]
    pub heater_timeout: HeaterTimeoutConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeout = &self.heater_timeout;
        if timeout.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid("heater_timeout.idle_timeout_secs must be > 0".into()));
        }
        if timeout.grace_period_secs == 0 {
            return Err(ConfigError::Invalid("heater_timeout.grace_period_secs must be > 0".into()));
        }
        if !(timeout.temp_tolerance >= 0.0) {
            return Err(ConfigError::Invalid("heater_timeout.temp_tolerance must be >= 0".into()));
        }
        let pause = &self.pause;
        if pause.beep_count > 1 && pause.beep_spacing_ms == 0 {
            return Err(ConfigError::Invalid(
                "pause.beep_spacing_ms must be > 0 when beeping more than once".into(),
            ));
        }
        for (name, feedrate) in [
            ("retract_feedrate", pause.retract_feedrate),
            ("travel_feedrate", pause.travel_feedrate),
            ("resume_feedrate", pause.resume_feedrate),
        ] {
            if !(feedrate > 0.0) {
                return Err(ConfigError::Invalid(format!("pause.{} must be > 0", name)));
            }
        }
        Ok(())
    }
}

/// Park point used when dedicated nozzle-park support is configured.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ParkPoint {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_park_z_raise")]
    pub z_raise: f64,
}

/// Motion and alert settings for the pause sequence. Lengths in mm,
/// feedrates in mm/s.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PauseConfig {
    #[serde(default = "default_retract_length")]
    pub retract_length: f64,
    #[serde(default = "default_retract_feedrate")]
    pub retract_feedrate: f64,
    #[serde(default = "default_z_lift")]
    pub z_lift: f64,
    #[serde(default = "default_wipe_distance")]
    pub wipe_distance: f64,
    #[serde(default = "default_travel_feedrate")]
    pub travel_feedrate: f64,
    #[serde(default = "default_resume_feedrate")]
    pub resume_feedrate: f64,
    /// `None` falls back to a plain Z raise of `park_z_raise_min`.
    #[serde(default)]
    pub park: Option<ParkPoint>,
    #[serde(default = "default_park_z_raise_min")]
    pub park_z_raise_min: f64,
    #[serde(default = "default_max_z")]
    pub max_z: f64,
    #[serde(default = "default_beep_count")]
    pub beep_count: u8,
    #[serde(default = "default_beep_duration_ms")]
    pub beep_duration_ms: u16,
    #[serde(default = "default_beep_frequency_hz")]
    pub beep_frequency_hz: u16,
    #[serde(default = "default_beep_spacing_ms")]
    pub beep_spacing_ms: u64,
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self {
            retract_length: default_retract_length(),
            retract_feedrate: default_retract_feedrate(),
            z_lift: default_z_lift(),
            wipe_distance: default_wipe_distance(),
            travel_feedrate: default_travel_feedrate(),
            resume_feedrate: default_resume_feedrate(),
            park: None,
            park_z_raise_min: default_park_z_raise_min(),
            max_z: default_max_z(),
            beep_count: default_beep_count(),
            beep_duration_ms: default_beep_duration_ms(),
            beep_frequency_hz: default_beep_frequency_hz(),
            beep_spacing_ms: default_beep_spacing_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaterTimeoutConfig {
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Allowed |actual - target| in °C before a resume may move.
    #[serde(default = "default_temp_tolerance")]
    pub temp_tolerance: f64,
    #[serde(default = "default_countdown_delay_secs")]
    pub countdown_delay_secs: u64,
    #[serde(default = "default_countdown_interval_secs")]
    pub countdown_interval_secs: u64,
}

impl Default for HeaterTimeoutConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            grace_period_secs: default_grace_period_secs(),
            temp_tolerance: default_temp_tolerance(),
            countdown_delay_secs: default_countdown_delay_secs(),
            countdown_interval_secs: default_countdown_interval_secs(),
        }
    }
}

impl HeaterTimeoutConfig {
    pub fn settings(&self) -> TimeoutSettings {
        TimeoutSettings {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            grace_period: Duration::from_secs(self.grace_period_secs),
        }
    }
}

/// In-memory printer used by the `pause-sim` binary and the tests.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_heater_count")]
    pub heater_count: usize,
    #[serde(default = "default_ambient")]
    pub ambient: f64,
    /// Heating/cooling speed in °C per second.
    #[serde(default = "default_heat_rate")]
    pub heat_rate: f64,
    /// Peak-to-peak sensor noise in °C.
    #[serde(default)]
    pub sensor_noise: f64,
    #[serde(default = "default_media_file_lines")]
    pub media_file_lines: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            heater_count: default_heater_count(),
            ambient: default_ambient(),
            heat_rate: default_heat_rate(),
            sensor_noise: 0.0,
            media_file_lines: default_media_file_lines(),
        }
    }
}

fn default_retract_length() -> f64 { 2.0 }
fn default_retract_feedrate() -> f64 { 35.0 }
fn default_z_lift() -> f64 { 0.4 }
fn default_wipe_distance() -> f64 { 5.0 }
fn default_travel_feedrate() -> f64 { 100.0 }
fn default_resume_feedrate() -> f64 { 50.0 }
fn default_park_z_raise() -> f64 { 20.0 }
fn default_park_z_raise_min() -> f64 { 2.0 }
fn default_max_z() -> f64 { 250.0 }
fn default_beep_count() -> u8 { 6 }
fn default_beep_duration_ms() -> u16 { 200 }
fn default_beep_frequency_hz() -> u16 { 100 }
fn default_beep_spacing_ms() -> u64 { 150 }
fn default_idle_timeout_secs() -> u64 { 300 }
fn default_grace_period_secs() -> u64 { 30 }
fn default_temp_tolerance() -> f64 { 3.0 }
fn default_countdown_delay_secs() -> u64 { 10 }
fn default_countdown_interval_secs() -> u64 { 5 }
fn default_heater_count() -> usize { 2 }
fn default_ambient() -> f64 { 25.0 }
fn default_heat_rate() -> f64 { 2.0 }
fn default_media_file_lines() -> u64 { 1000 }

pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
