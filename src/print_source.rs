// src/print_source.rs - Canonical origin of the active print job

/// Which channel is driving the active job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintSource {
    #[default]
    None,
    /// Streamed by a host over serial.
    Host,
    /// Read from onboard media (SD card / USB).
    OnboardMedia,
}

/// Single authoritative record of where the current job comes from.
///
/// Other components must ask this tracker instead of guessing from media
/// state: a file can stay open on the card while a host drives the job.
/// Last write wins; no history is kept.
#[derive(Debug, Default)]
pub struct PrintSourceTracker {
    source: PrintSource,
}

impl PrintSourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_host(&mut self) {
        self.source = PrintSource::Host;
        tracing::debug!("PrintSource: set to host");
    }

    pub fn set_sd(&mut self) {
        self.source = PrintSource::OnboardMedia;
        tracing::debug!("PrintSource: set to onboard media");
    }

    pub fn clear(&mut self) {
        self.source = PrintSource::None;
        tracing::debug!("PrintSource: cleared");
    }

    pub fn get(&self) -> PrintSource {
        self.source
    }

    pub fn is_host(&self) -> bool {
        self.source == PrintSource::Host
    }

    pub fn is_sd(&self) -> bool {
        self.source == PrintSource::OnboardMedia
    }
}
