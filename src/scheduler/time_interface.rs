//! Monotonic time source used for every pause/resume deadline.
//!
//! Deadlines are absolute [`Instant`]s compared against `now_monotonic()`,
//! so behavior does not depend on how often the main loop polls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

pub trait TimeInterface: Send + Sync {
    fn now_monotonic(&self) -> Instant;
    fn now_wallclock(&self) -> SystemTime;
    /// Block the caller. Used for buzzer pulse spacing.
    fn sleep(&self, duration: Duration);
}

/// Real clock backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeInterface for SystemClock {
    fn now_monotonic(&self) -> Instant {
        Instant::now()
    }

    fn now_wallclock(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Hand-driven clock. Time only moves through `advance`, `set_elapsed`
/// or `sleep`.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: SystemTime,
    elapsed_ms: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: SystemTime::now(),
            elapsed_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.elapsed_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_elapsed(&self, elapsed: Duration) {
        self.elapsed_ms
            .store(elapsed.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }
}

impl TimeInterface for ManualClock {
    fn now_monotonic(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn now_wallclock(&self) -> SystemTime {
        self.wall_origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
