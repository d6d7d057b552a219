//! Download progress tracking.
//!
//! [`ProgressTracker`] counts bytes of a single download and reports
//! `(bytes_so_far, total)` on every chunk. Counters restart at zero for
//! each file, so [`AggregateProgress`] folds per-file reports into an
//! overall figure by summing deltas.

use tracing::debug;

/// Byte counter for one download.
///
/// `F` receives `(bytes_so_far, total_expected)` after every chunk.
pub struct ProgressTracker<F> {
    current: u64,
    total: u64,
    callback: F,
}

impl<F: FnMut(u64, u64)> ProgressTracker<F> {
    /// Track a download expected to be `total` bytes long (0 if unknown).
    pub fn new(total: u64, callback: F) -> Self {
        Self {
            current: 0,
            total,
            callback,
        }
    }

    /// Replace the expected total, e.g. once `Content-Length` is known.
    pub fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    /// Record `len` freshly written bytes and notify the callback.
    pub fn record(&mut self, len: usize) {
        self.current += len as u64;
        (self.callback)(self.current, self.total);
    }

    /// Bytes recorded so far.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.current
    }
}

/// Overall progress across several sequential downloads.
#[derive(Debug, Clone, Default)]
pub struct AggregateProgress {
    total: u64,
    done: u64,
    file_bytes: u64,
    last_percent: Option<u64>,
}

impl AggregateProgress {
    /// Track downloads totalling `total` bytes.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Reset the per-file counter before the next download starts.
    pub fn start_file(&mut self) {
        self.file_bytes = 0;
    }

    /// Fold a per-file cumulative report into the overall count and return
    /// the overall bytes so far.
    pub fn update(&mut self, file_bytes: u64) -> u64 {
        let delta = file_bytes.saturating_sub(self.file_bytes);
        self.file_bytes = file_bytes;
        self.done += delta;

        if self.total > 0 {
            let percent = self.done.saturating_mul(100) / self.total;
            if self.last_percent != Some(percent) {
                self.last_percent = Some(percent);
                debug!(done = self.done, total = self.total, percent, "download progress");
            }
        }

        self.done
    }

    /// Overall bytes downloaded so far.
    #[must_use]
    pub fn done(&self) -> u64 {
        self.done
    }

    /// Aggregate expected size.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }
}
