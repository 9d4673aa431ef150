//! Progress counters for a batch run
//!
//! Updated by every file worker with relaxed atomics; readers take a
//! `snapshot()` at any time, including while the batch is still running.

use crate::downloader::core::DownloadOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DownloadMetrics {
    pub total_files: AtomicU64,
    pub completed_files: AtomicU64,
    pub skipped_files: AtomicU64,
    pub succeeded_files: AtomicU64,
    pub failed_files: AtomicU64,
    /// Bytes fetched over the network (skipped files excluded)
    pub bytes_downloaded: AtomicU64,
}

impl DownloadMetrics {
    /// Reset all counters for a new batch of `total` files
    pub fn record_batch_started(&self, total: u64) {
        self.total_files.store(total, Ordering::Relaxed);
        self.completed_files.store(0, Ordering::Relaxed);
        self.skipped_files.store(0, Ordering::Relaxed);
        self.succeeded_files.store(0, Ordering::Relaxed);
        self.failed_files.store(0, Ordering::Relaxed);
        self.bytes_downloaded.store(0, Ordering::Relaxed);
    }

    /// Count a finished file and return how many files are now complete
    pub fn record_outcome(&self, outcome: &DownloadOutcome) -> u64 {
        match outcome {
            DownloadOutcome::Skipped { .. } => {
                self.skipped_files.fetch_add(1, Ordering::Relaxed);
            }
            DownloadOutcome::Succeeded { size } => {
                self.succeeded_files.fetch_add(1, Ordering::Relaxed);
                self.bytes_downloaded.fetch_add(*size, Ordering::Relaxed);
            }
            DownloadOutcome::Failed(_) => {
                self.failed_files.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.completed_files.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> DownloadMetricsSnapshot {
        DownloadMetricsSnapshot {
            total_files: self.total_files.load(Ordering::Relaxed),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
            succeeded_files: self.succeeded_files.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of download metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadMetricsSnapshot {
    pub total_files: u64,
    pub skipped_files: u64,
    pub succeeded_files: u64,
    pub failed_files: u64,
    pub bytes_downloaded: u64,
}

impl DownloadMetricsSnapshot {
    /// Files that reached a terminal outcome
    pub fn completed(&self) -> u64 {
        self.skipped_files + self.succeeded_files + self.failed_files
    }

    /// Fraction of files that ended Skipped or Succeeded (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            0.0
        } else {
            (self.skipped_files + self.succeeded_files) as f64 / completed as f64
        }
    }
}
