//! Progress reporting utilities using indicatif.
//!
//! This module provides the [`Progress`] struct which implements
//! [`ProgressCallback`] to display a discovery spinner and a byte-based
//! hashing bar in the terminal.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name reported by the walker.
pub const PHASE_DISCOVERY: &str = "discovery";

/// Phase name reported by the content hasher; its total is in bytes.
pub const PHASE_HASHING: &str = "hashing";

/// Progress callback for the scan pipeline.
///
/// Implement this trait to receive progress updates during discovery and
/// hashing. Implementations must be cheap: hashing workers call them from
/// the pool threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - Name of the phase ([`PHASE_DISCOVERY`], [`PHASE_HASHING`])
    /// * `total` - Total amount of work (files, or bytes for hashing; 0 if unknown)
    fn on_phase_start(&self, phase: &str, total: u64);

    /// Called for each file discovered.
    ///
    /// # Arguments
    ///
    /// * `current` - Current item number (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a file has been hashed, providing its size.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    discovery: Mutex<Option<ProgressBar>>,
    hashing: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, no progress bars will be displayed.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupelink::progress::Progress;
    ///
    /// let progress = Progress::new(false);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            discovery: Mutex::new(None),
            hashing: Mutex::new(None),
            quiet,
        }
    }

    fn discovery_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn hashing_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: u64) {
        if self.quiet {
            return;
        }

        match phase {
            PHASE_DISCOVERY => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::discovery_style());
                pb.set_message("Discovering");
                pb.enable_steady_tick(Duration::from_millis(100));
                if let Ok(mut slot) = self.discovery.lock() {
                    *slot = Some(pb);
                }
            }
            PHASE_HASHING => {
                let pb = self.multi.add(ProgressBar::new(total));
                pb.set_style(Self::hashing_style());
                if let Ok(mut slot) = self.hashing.lock() {
                    *slot = Some(pb);
                }
            }
            _ => {}
        }
    }

    fn on_progress(&self, current: usize, _path: &str) {
        if self.quiet {
            return;
        }
        if let Ok(slot) = self.discovery.lock() {
            if let Some(ref pb) = *slot {
                pb.set_position(current as u64);
            }
        }
    }

    fn on_item_completed(&self, bytes: u64) {
        if self.quiet {
            return;
        }
        if let Ok(slot) = self.hashing.lock() {
            if let Some(ref pb) = *slot {
                pb.inc(bytes);
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        let slot = match phase {
            PHASE_DISCOVERY => &self.discovery,
            PHASE_HASHING => &self.hashing,
            _ => return,
        };
        if let Ok(mut slot) = slot.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        }
    }
}
