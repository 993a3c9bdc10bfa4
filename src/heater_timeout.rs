//! # Heater idle timeout
//!
//! Two-stage watchdog that protects a parked printer from heaters left on
//! unattended:
//!
//! 1. `Armed`: after `idle_timeout` without a resume, the user is asked once
//!    (confirmation popup) whether to keep the heaters on.
//! 2. `GracePending`: if nobody answers Continue within `grace_period`, every
//!    heater target is forced to zero (`Disabled`).
//!
//! Continue during the grace window pushes both deadlines out by one idle
//! timeout. Continue after the disable re-applies the saved targets and
//! re-arms. All timing compares absolute deadlines against the caller's
//! `now`, so irregular poll intervals are harmless.

use std::time::{Duration, Instant};

use crate::hardware::{Display, ThermalControl, MAX_HEATERS};

/// Per-heater target temperatures in °C. Zero means off / not set.
pub type HeaterTargets = [f64; MAX_HEATERS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutState {
    Idle,
    Armed,
    GracePending,
    Disabled,
}

/// What a poll did, so the caller can update the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutEvent {
    None,
    PromptShown,
    HeatersDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutSettings {
    pub idle_timeout: Duration,
    pub grace_period: Duration,
}

/// Whole seconds left until `deadline`, rounded up, zero once elapsed.
pub fn remaining_secs(deadline: Instant, now: Instant) -> u32 {
    let ms = deadline.saturating_duration_since(now).as_millis();
    ms.div_ceil(1000).min(u32::MAX as u128) as u32
}

/// Read the live targets of every tracked heater.
pub fn capture_targets(thermal: &dyn ThermalControl) -> HeaterTargets {
    let mut targets = [0.0; MAX_HEATERS];
    for (heater, slot) in targets
        .iter_mut()
        .enumerate()
        .take(thermal.heater_count())
    {
        *slot = thermal.target(heater);
    }
    targets
}

/// Strategy seam for the pause idle-timeout behavior.
pub trait IdleTimeoutProvider {
    /// Capture `targets` and arm the idle timer.
    fn start(&mut self, targets: &HeaterTargets, now: Instant);
    fn poll(
        &mut self,
        now: Instant,
        thermal: &mut dyn ThermalControl,
        display: &mut dyn Display,
    ) -> TimeoutEvent;
    /// The user pressed Continue on the timeout prompt.
    fn continue_(&mut self, now: Instant, thermal: &mut dyn ThermalControl);
    /// Start a fresh idle period, keeping the saved targets.
    fn rearm(&mut self, now: Instant);
    /// Forget everything. Never touches heater outputs.
    fn abort(&mut self);
    fn state(&self) -> TimeoutState;
    fn saved_targets(&self) -> Option<&HeaterTargets>;
    /// Seconds left in the current stage (grace window when one is open).
    fn remaining_secs(&self, now: Instant) -> u32;
}

#[derive(Debug, Clone)]
pub struct HeaterIdleTimeoutManager {
    settings: TimeoutSettings,
    state: TimeoutState,
    idle_deadline: Option<Instant>,
    grace_deadline: Option<Instant>,
    prompt_shown: bool,
    heaters_disabled: bool,
    saved: Option<HeaterTargets>,
}

impl HeaterIdleTimeoutManager {
    pub fn new(settings: TimeoutSettings) -> Self {
        Self {
            settings,
            state: TimeoutState::Idle,
            idle_deadline: None,
            grace_deadline: None,
            prompt_shown: false,
            heaters_disabled: false,
            saved: None,
        }
    }

    pub fn settings(&self) -> TimeoutSettings {
        self.settings
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle_deadline
    }

    pub fn grace_deadline(&self) -> Option<Instant> {
        self.grace_deadline
    }

    /// Pick up targets the user changed while parked. Zero live targets
    /// are ignored so the forced-off state never overwrites the snapshot.
    fn refresh_saved(&mut self, thermal: &dyn ThermalControl) {
        let Some(saved) = self.saved.as_mut() else { return };
        for (heater, slot) in saved
            .iter_mut()
            .enumerate()
            .take(thermal.heater_count())
        {
            let live = thermal.target(heater);
            if live > 0.0 {
                *slot = live;
            }
        }
    }

    fn show_prompt(&mut self, display: &mut dyn Display) -> TimeoutEvent {
        if self.prompt_shown {
            return TimeoutEvent::None;
        }
        self.prompt_shown = true;
        tracing::warn!("Pause idle timeout reached, asking whether to keep heaters on");
        display.confirm_popup("Heater timeout", "Heaters will turn off. Continue?");
        TimeoutEvent::PromptShown
    }

    fn disable_heaters(&mut self, thermal: &mut dyn ThermalControl) -> TimeoutEvent {
        self.state = TimeoutState::Disabled;
        if self.heaters_disabled {
            return TimeoutEvent::None;
        }
        self.heaters_disabled = true;
        for heater in 0..thermal.heater_count().min(MAX_HEATERS) {
            thermal.set_target(heater, 0.0);
        }
        tracing::warn!("Heaters disabled due to pause timeout");
        TimeoutEvent::HeatersDisabled
    }
}

impl IdleTimeoutProvider for HeaterIdleTimeoutManager {
    fn start(&mut self, targets: &HeaterTargets, now: Instant) {
        self.saved = Some(*targets);
        self.state = TimeoutState::Armed;
        self.idle_deadline = Some(now + self.settings.idle_timeout);
        self.grace_deadline = None;
        self.prompt_shown = false;
        self.heaters_disabled = false;
        tracing::info!(
            "Heater idle timeout armed ({}s, grace {}s)",
            self.settings.idle_timeout.as_secs(),
            self.settings.grace_period.as_secs()
        );
    }

    fn poll(
        &mut self,
        now: Instant,
        thermal: &mut dyn ThermalControl,
        display: &mut dyn Display,
    ) -> TimeoutEvent {
        match self.state {
            TimeoutState::Idle | TimeoutState::Disabled => TimeoutEvent::None,
            TimeoutState::Armed => {
                self.refresh_saved(thermal);
                match self.idle_deadline {
                    Some(deadline) if now >= deadline => {
                        self.state = TimeoutState::GracePending;
                        self.grace_deadline = Some(now + self.settings.grace_period);
                        self.show_prompt(display)
                    }
                    _ => TimeoutEvent::None,
                }
            }
            TimeoutState::GracePending => {
                self.refresh_saved(thermal);
                if self.grace_deadline.is_some_and(|deadline| now >= deadline) {
                    return self.disable_heaters(thermal);
                }
                if self.idle_deadline.is_some_and(|deadline| now >= deadline) {
                    return self.show_prompt(display);
                }
                TimeoutEvent::None
            }
        }
    }

    fn continue_(&mut self, now: Instant, thermal: &mut dyn ThermalControl) {
        match self.state {
            TimeoutState::GracePending => {
                let extend = self.settings.idle_timeout;
                self.grace_deadline = self.grace_deadline.map(|deadline| deadline + extend);
                self.idle_deadline = self.idle_deadline.map(|deadline| deadline + extend);
                self.prompt_shown = false;
                tracing::info!(
                    "Heater timeout extended by {}s ({}s left)",
                    extend.as_secs(),
                    self.remaining_secs(now)
                );
            }
            TimeoutState::Disabled => {
                self.refresh_saved(thermal);
                if let Some(saved) = self.saved {
                    for (heater, target) in saved
                        .iter()
                        .enumerate()
                        .take(thermal.heater_count())
                    {
                        thermal.set_target(heater, *target);
                    }
                }
                tracing::info!("Heaters re-enabled after timeout, re-arming");
                self.rearm(now);
            }
            TimeoutState::Armed | TimeoutState::Idle => {
                tracing::debug!("Heater timeout continue ignored in state {:?}", self.state);
            }
        }
    }

    fn rearm(&mut self, now: Instant) {
        if self.saved.is_none() {
            tracing::debug!("Heater timeout re-arm ignored, no saved targets");
            return;
        }
        self.state = TimeoutState::Armed;
        self.idle_deadline = Some(now + self.settings.idle_timeout);
        self.grace_deadline = None;
        self.prompt_shown = false;
        self.heaters_disabled = false;
    }

    fn abort(&mut self) {
        self.state = TimeoutState::Idle;
        self.idle_deadline = None;
        self.grace_deadline = None;
        self.prompt_shown = false;
        self.heaters_disabled = false;
        self.saved = None;
    }

    fn state(&self) -> TimeoutState {
        self.state
    }

    fn saved_targets(&self) -> Option<&HeaterTargets> {
        self.saved.as_ref()
    }

    fn remaining_secs(&self, now: Instant) -> u32 {
        let deadline = match self.state {
            TimeoutState::GracePending => self.grace_deadline,
            TimeoutState::Armed => self.idle_deadline,
            TimeoutState::Idle | TimeoutState::Disabled => None,
        };
        deadline.map_or(0, |deadline| remaining_secs(deadline, now))
    }
}
