//! Progress tracking and reporting for download operations

use std::sync::Arc;

/// Progress callback for download operations
///
/// Invoked from worker threads, so implementations must be thread-safe.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted during a run
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    FileSkipped {
        dest: String,
    },
    DownloadStarted {
        url: String,
        total_size: Option<u64>,
    },
    DownloadProgress {
        url: String,
        downloaded: u64,
        total: Option<u64>,
        speed_bps: f64,
    },
    ChunkComplete {
        url: String,
        index: usize,
        total_chunks: usize,
    },
    DownloadComplete {
        url: String,
        final_size: u64,
    },
    ValidationComplete {
        file: String,
        valid: bool,
    },
    FileFailed {
        dest: String,
        error: String,
    },
    /// Files finished (any outcome) out of the catalog total
    BatchProgress {
        completed: u64,
        total: u64,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_file_skipped(&self, _dest: &str) {}
    fn on_download_started(&self, _url: &str, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _url: &str, _downloaded: u64, _total: Option<u64>, _speed_bps: f64) {}
    fn on_chunk_complete(&self, _url: &str, _index: usize, _total_chunks: usize) {}
    fn on_download_complete(&self, _url: &str, _final_size: u64) {}
    fn on_validation_complete(&self, _file: &str, _valid: bool) {}
    fn on_file_failed(&self, _dest: &str, _error: &str) {}
    fn on_batch_progress(&self, _completed: u64, _total: u64) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::FileSkipped { dest } => self.on_file_skipped(&dest),
            ProgressEvent::DownloadStarted { url, total_size } => {
                self.on_download_started(&url, total_size);
            }
            ProgressEvent::DownloadProgress { url, downloaded, total, speed_bps } => {
                self.on_download_progress(&url, downloaded, total, speed_bps);
            }
            ProgressEvent::ChunkComplete { url, index, total_chunks } => {
                self.on_chunk_complete(&url, index, total_chunks);
            }
            ProgressEvent::DownloadComplete { url, final_size } => {
                self.on_download_complete(&url, final_size);
            }
            ProgressEvent::ValidationComplete { file, valid } => {
                self.on_validation_complete(&file, valid);
            }
            ProgressEvent::FileFailed { dest, error } => self.on_file_failed(&dest, &error),
            ProgressEvent::BatchProgress { completed, total } => {
                self.on_batch_progress(completed, total);
            }
        })
    }
}

/// Simple console progress reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_file_skipped(&self, dest: &str) {
        println!("⏭  {} already exists and is valid, skipping", dest);
    }

    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        if self.verbose {
            match total_size {
                Some(size) => println!("📥 Starting download: {} ({} bytes)", url, size),
                None => println!("📥 Starting download: {}", url),
            }
        }
    }

    fn on_download_progress(&self, url: &str, downloaded: u64, total: Option<u64>, speed_bps: f64) {
        if self.verbose {
            let speed_mb = speed_bps / 1_000_000.0;
            match total {
                Some(total) if total > 0 => {
                    let percent = (downloaded as f64 / total as f64) * 100.0;
                    println!("⏬ {}: {:.1}% ({}/{} bytes, {:.1} MB/s)",
                        url, percent, downloaded, total, speed_mb);
                }
                _ => {
                    println!("⏬ {}: {} bytes downloaded ({:.1} MB/s)",
                        url, downloaded, speed_mb);
                }
            }
        }
    }

    fn on_chunk_complete(&self, url: &str, index: usize, total_chunks: usize) {
        if self.verbose {
            println!("🧩 {}: chunk {}/{} done", url, index + 1, total_chunks);
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        println!("✅ Download complete: {} ({} bytes)", url, final_size);
    }

    fn on_validation_complete(&self, file: &str, valid: bool) {
        if self.verbose || !valid {
            let icon = if valid { "✅" } else { "❌" };
            println!("{} Validation {}: {}", icon, if valid { "passed" } else { "failed" }, file);
        }
    }

    fn on_file_failed(&self, dest: &str, error: &str) {
        eprintln!("❌ {} failed: {}", dest, error);
    }

    fn on_batch_progress(&self, completed: u64, total: u64) {
        println!("📦 Files: {}/{}", completed, total);
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Emit `event` when a callback is configured
pub(crate) fn emit(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}
