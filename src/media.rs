// src/media.rs - Onboard media presence / mount state machine
use crate::hardware::{Display, MediaStorage};

/// Detected media level. Ordered: a higher level than before is an
/// insertion, a lower one a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum MediaPresence {
    /// Power-on sentinel: nothing observed yet.
    Boot = -1,
    Absent = 0,
    /// Generic single-volume media.
    Media = 1,
    SdCard = 2,
    UsbDrive = 4,
}

impl MediaPresence {
    pub fn is_present(self) -> bool {
        self > MediaPresence::Absent
    }
}

/// Outcome of one [`MediaStateMachine::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaTransition {
    /// Same level as last time; nothing was touched.
    Unchanged,
    /// A change is pending but the display is not ready; retried next poll.
    Deferred,
    /// First reading after boot. Never mounts or releases.
    Initial(MediaPresence),
    Inserted { mounted: bool },
    /// `aborted` is set when a media print was running or about to start;
    /// the caller must unwind its pause/print state.
    Removed { aborted: bool },
}

/// Edge detector over the storage presence level.
#[derive(Debug)]
pub struct MediaStateMachine {
    previous: MediaPresence,
}

impl Default for MediaStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaStateMachine {
    pub fn new() -> Self {
        Self {
            previous: MediaPresence::Boot,
        }
    }

    pub fn previous(&self) -> MediaPresence {
        self.previous
    }

    pub fn poll(
        &mut self,
        storage: &mut dyn MediaStorage,
        display: &mut dyn Display,
    ) -> MediaTransition {
        let current = storage.presence();
        if current == self.previous {
            return MediaTransition::Unchanged;
        }
        if !display.is_ready() {
            // Keep `previous` so the edge is handled once the UI is up.
            tracing::debug!("Media change {:?} -> {:?} deferred, display not ready", self.previous, current);
            return MediaTransition::Deferred;
        }

        let old = self.previous;
        let old_real = if old == MediaPresence::Boot { MediaPresence::Absent } else { old };
        self.previous = current;

        let mut reported = current;
        let transition = if old == MediaPresence::Boot {
            if current.is_present() && !storage.is_mounted() {
                reported = MediaPresence::Absent;
            }
            tracing::info!("Media at boot: {:?}", current);
            MediaTransition::Initial(current)
        } else if current.is_present() && current > old_real {
            if !storage.is_mounted() {
                tracing::info!("Media inserted ({:?}), mounting", current);
                storage.mount();
            }
            let mounted = storage.is_mounted();
            if !mounted {
                tracing::warn!("Media mount failed");
                reported = old_real;
            }
            MediaTransition::Inserted { mounted }
        } else {
            // current != old and not higher, so strictly lower.
            tracing::info!("Media removed ({:?} -> {:?})", old, current);
            MediaTransition::Removed {
                aborted: Self::release(storage),
            }
        };

        display.media_changed(old, reported);
        transition
    }

    /// Abort any media print first, then unmount. Returns whether a print
    /// was aborted.
    fn release(storage: &mut dyn MediaStorage) -> bool {
        let aborted = storage.is_printing() || storage.is_print_start_pending();
        if aborted {
            tracing::warn!("Media removed during print, aborting");
            storage.abort_file_print();
        }
        storage.unmount();
        aborted
    }
}
