//! Catalog downloader
//!
//! Downloads every file listed in a catalog, optionally splitting each file
//! across several concurrent byte-range requests, verifies each file's MD5
//! and writes the resources that failed to a report for a later run.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use downloader::{
//!     BatchScheduler, Catalog, ConsoleProgressReporter, DownloadConfig,
//!     DownloadLayout, IntoProgressCallback, RunConfig,
//! };
//! use std::path::Path;
//!
//! # fn example() -> downloader::Result<()> {
//! let catalog = Catalog::from_file(Path::new("resources.json"))?;
//! let run = RunConfig::new("https://example.com/zip", "0.9.0")
//!     .with_multi_connection(4)
//!     .with_max_concurrent_files(8);
//!
//! let scheduler = BatchScheduler::new(DownloadConfig::default(), DownloadLayout::new("."))?
//!     .with_progress_callback(ConsoleProgressReporter::new(false).into_callback());
//!
//! let report = scheduler.run(&catalog, &run)?;
//! println!("{} skipped, {} downloaded, {} failed",
//!     report.skipped(), report.succeeded(), report.failed_count());
//! if let Some(path) = &report.report_path {
//!     println!("Failed resources logged in {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Layout
//!
//! Files land in `<root>/download/<version>/<dest>`; failures are written to
//! `<root>/failed/<version>/<catalog name>`. Re-running a catalog skips every
//! file whose local digest already matches.

pub mod catalog;
pub mod downloader;

// Re-export commonly used types for convenience
pub use catalog::{Catalog, CatalogSource};
pub use downloader::{
    BatchReport, BatchScheduler, ConsoleProgressReporter, DownloadConfig, DownloadConfigBuilder,
    DownloadError, DownloadLayout, DownloadOutcome, FileOrchestrator, HttpClient,
    IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressEvent,
    ProgressReporter, Resource, Result, RunConfig,
};
