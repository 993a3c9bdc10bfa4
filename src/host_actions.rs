// src/host_actions.rs - Host action notifications ("//action:" lines)
use std::time::{Duration, Instant};

use crate::gcode::CommandLine;
use crate::hardware::HostChannel;
use crate::print_source::PrintSourceTracker;

/// A status message equal to the last notification within this window is
/// considered an echo of it.
pub const NOTIFICATION_SUPPRESS_WINDOW: Duration = Duration::from_secs(5);

/// Announces job lifecycle events to an attached host.
///
/// Nothing is emitted while the canonical print source is onboard media:
/// an external host must not react to a print it is not driving.
pub struct HostActions {
    channel: Box<dyn HostChannel>,
    last_notification: Option<(CommandLine, Instant)>,
}

impl std::fmt::Debug for HostActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostActions")
            .field("connected", &self.channel.is_connected())
            .field("last_notification", &self.last_notification)
            .finish()
    }
}

impl HostActions {
    pub fn new(channel: Box<dyn HostChannel>) -> Self {
        Self {
            channel,
            last_notification: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    fn action(&mut self, source: &PrintSourceTracker, action: &str) -> bool {
        if source.is_sd() {
            tracing::debug!("Host action '{}' suppressed for media print", action);
            return false;
        }
        self.channel.send_line(&format!("//action:{}", action));
        true
    }

    pub fn pause(&mut self, source: &PrintSourceTracker) -> bool {
        self.action(source, "pause")
    }

    pub fn resume(&mut self, source: &PrintSourceTracker) -> bool {
        self.action(source, "resume")
    }

    pub fn start(&mut self, source: &PrintSourceTracker) -> bool {
        self.action(source, "start")
    }

    pub fn cancel(&mut self, source: &PrintSourceTracker) -> bool {
        self.action(source, "cancel")
    }

    /// Send a free-form notification and remember it for echo suppression.
    pub fn notify(&mut self, source: &PrintSourceTracker, message: &str, now: Instant) -> bool {
        let sent = self.action(source, &format!("notification {}", message));
        if sent {
            self.store_notification(message, now);
        }
        sent
    }

    /// Diagnostic line, never gated.
    pub fn echo(&mut self, message: &str) {
        self.channel.send_line(&format!("echo:{}", message));
    }

    fn store_notification(&mut self, message: &str, now: Instant) {
        self.last_notification = if message.is_empty() {
            None
        } else {
            Some((CommandLine::new(message, false), now))
        };
    }

    pub fn clear_notification(&mut self) {
        self.last_notification = None;
    }

    /// True when `message` repeats the last notification inside the
    /// suppression window. A match consumes the cached notification.
    pub fn should_suppress_status(&mut self, message: &str, now: Instant) -> bool {
        if message.is_empty() {
            return false;
        }
        let Some((cached, at)) = &self.last_notification else {
            return false;
        };
        if now.saturating_duration_since(*at) > NOTIFICATION_SUPPRESS_WINDOW {
            return false;
        }
        if cached.as_str() != CommandLine::new(message, false).as_str() {
            return false;
        }
        self.last_notification = None;
        tracing::debug!("HostActions: suppressed redundant status from host notification");
        true
    }
}
