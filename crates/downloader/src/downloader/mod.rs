//! Downloader module
//!
//! The download engine: core types, configuration, the chunked and
//! single-stream fetchers, per-file orchestration, batch scheduling and
//! failure reporting.

pub mod batch;
pub mod chunked;
pub mod config;
pub mod core;
pub mod orchestrator;
pub mod report;

// Re-export main types for convenience
pub use batch::{BatchReport, BatchScheduler, DownloadMetrics, DownloadMetricsSnapshot};
pub use chunked::{ByteRange, partition};
pub use config::{DownloadConfig, DownloadConfigBuilder, DownloadLayout, RunConfig};
pub use self::core::{
    ConsoleProgressReporter, DownloadError, DownloadOutcome, ErrorKind, FileOperation,
    FileValidation, IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressEvent,
    ProgressReporter, Resource, Result,
};
pub use self::core::http::HttpClient;
pub use orchestrator::FileOrchestrator;
pub use report::{FailureReport, FailureReporter, FailureSet};

#[cfg(test)]
mod tests;
