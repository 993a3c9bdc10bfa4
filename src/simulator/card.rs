// src/simulator/card.rs - In-memory onboard media reader
use crate::hardware::{MediaStorage, MediaStream};
use crate::media::MediaPresence;

/// Simulated card with a single synthetic G-code file.
///
/// The stream offset counts lines rather than bytes; the file is generated
/// on the fly so `set_offset` can seek anywhere.
#[derive(Debug, Clone)]
pub struct SimCard {
    presence: MediaPresence,
    mounted: bool,
    mount_fails: bool,
    file_open: bool,
    streaming: bool,
    start_pending: bool,
    offset: u64,
    file_lines: u64,
    aborts: usize,
}

impl SimCard {
    pub fn new(file_lines: u64) -> Self {
        Self {
            presence: MediaPresence::Absent,
            mounted: false,
            mount_fails: false,
            file_open: false,
            streaming: false,
            start_pending: false,
            offset: 0,
            file_lines,
            aborts: 0,
        }
    }

    pub fn insert(&mut self, kind: MediaPresence) {
        self.presence = kind;
    }

    /// Pull the media out. Mount state is left for the state machine to
    /// release, like a real reader that only notices on the next poll.
    pub fn remove(&mut self) {
        self.presence = MediaPresence::Absent;
    }

    pub fn set_mount_fails(&mut self, fails: bool) {
        self.mount_fails = fails;
    }

    /// Open the file and begin streaming from the top.
    pub fn start_print(&mut self) -> bool {
        if !self.mounted {
            return false;
        }
        self.file_open = true;
        self.streaming = true;
        self.start_pending = false;
        self.offset = 0;
        true
    }

    pub fn set_start_pending(&mut self, pending: bool) {
        self.start_pending = pending;
    }

    /// Next line of the synthetic file, or `None` when paused or at EOF.
    pub fn next_line(&mut self) -> Option<String> {
        if !self.streaming {
            return None;
        }
        if self.offset >= self.file_lines {
            self.streaming = false;
            self.file_open = false;
            tracing::info!("Simulated media print finished");
            return None;
        }
        let n = self.offset;
        self.offset += 1;
        Some(format!(
            "G1 X{:.1} Y{:.1} E{:.3}",
            (n % 200) as f64,
            ((n / 200) % 200) as f64,
            n as f64 * 0.05
        ))
    }

    pub fn aborts(&self) -> usize {
        self.aborts
    }
}

impl MediaStream for SimCard {
    fn is_file_open(&self) -> bool {
        self.file_open
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn pause_stream(&mut self) {
        self.streaming = false;
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    fn resume_stream(&mut self) {
        if self.file_open {
            self.streaming = true;
        }
    }
}

impl MediaStorage for SimCard {
    fn presence(&self) -> MediaPresence {
        self.presence
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn mount(&mut self) -> bool {
        self.mounted = self.presence.is_present() && !self.mount_fails;
        self.mounted
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.file_open = false;
        self.streaming = false;
    }

    /// An open file counts as printing even while the stream is paused.
    fn is_printing(&self) -> bool {
        self.file_open
    }

    fn is_print_start_pending(&self) -> bool {
        self.start_pending
    }

    fn abort_file_print(&mut self) {
        self.file_open = false;
        self.streaming = false;
        self.start_pending = false;
        self.aborts += 1;
    }
}
