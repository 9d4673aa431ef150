//! Batch download of a whole catalog
//!
//! Files are orchestrated on a dedicated rayon pool of `max_concurrent_files`
//! threads. Every resource reaches a terminal outcome regardless of its
//! siblings; failures are collected and reported once the pool drains.

pub mod metrics;

pub use metrics::{DownloadMetrics, DownloadMetricsSnapshot};

use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::downloader::config::{DownloadConfig, DownloadLayout, RunConfig};
use crate::downloader::core::http::HttpClient;
use crate::downloader::core::progress::{self, ProgressCallback, ProgressEvent};
use crate::downloader::core::{DownloadError, DownloadOutcome, Resource, Result};
use crate::downloader::orchestrator::FileOrchestrator;
use crate::downloader::report::{FailureReporter, FailureSet};

/// Result of one catalog run
#[derive(Debug)]
pub struct BatchReport {
    /// One entry per catalog resource, in catalog order
    pub outcomes: Vec<(Resource, DownloadOutcome)>,
    /// Resources that failed, in the order they failed
    pub failed: Vec<Resource>,
    /// Where the failure report was written, if anything failed
    pub report_path: Option<PathBuf>,
    pub metrics: DownloadMetricsSnapshot,
    pub duration: Duration,
}

impl BatchReport {
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, DownloadOutcome::Skipped { .. }))
    }

    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, DownloadOutcome::Succeeded { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, DownloadOutcome::Failed(_)))
    }

    /// True when every resource ended Skipped or Succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    fn count(&self, predicate: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, outcome)| predicate(outcome)).count()
    }
}

/// Runs catalogs through the file orchestrator with bounded concurrency
pub struct BatchScheduler {
    client: HttpClient,
    config: DownloadConfig,
    layout: DownloadLayout,
    metrics: Arc<DownloadMetrics>,
    progress_callback: Option<ProgressCallback>,
}

impl BatchScheduler {
    pub fn new(config: DownloadConfig, layout: DownloadLayout) -> Result<Self> {
        let client = HttpClient::from_config(&config)?;
        Ok(Self::with_client(client, config, layout))
    }

    /// Build a scheduler around an existing client
    pub fn with_client(client: HttpClient, config: DownloadConfig, layout: DownloadLayout) -> Self {
        Self {
            client,
            config,
            layout,
            metrics: Arc::new(DownloadMetrics::default()),
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, progress_callback: ProgressCallback) -> Self {
        self.progress_callback = Some(progress_callback);
        self
    }

    /// Live counters of the current (or last) run
    pub fn metrics(&self) -> Arc<DownloadMetrics> {
        self.metrics.clone()
    }

    pub fn layout(&self) -> &DownloadLayout {
        &self.layout
    }

    /// Download every resource of `catalog` and report the failures
    ///
    /// Returns `Err` only for run-level problems: an invalid `run` config, a
    /// worker pool that cannot start, or a failure report that cannot be
    /// written. Per-resource failures are part of the returned report.
    pub fn run(&self, catalog: &Catalog, run: &RunConfig) -> Result<BatchReport> {
        run.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(run.max_concurrent_files)
            .thread_name(|index| format!("file-worker-{}", index))
            .build()
            .map_err(|e| {
                DownloadError::configuration(
                    format!("failed to start file worker pool: {}", e),
                    "max_concurrent_files",
                )
            })?;

        let failures = Arc::new(FailureSet::new());
        let orchestrator = FileOrchestrator::new(
            self.client.clone(),
            run.clone(),
            self.layout.download_dir(&run.version),
            failures.clone(),
        )
        .with_progress_callback(self.progress_callback.clone())
        .with_block_size(self.config.block_size);

        let total = catalog.resources.len() as u64;
        self.metrics.record_batch_started(total);
        info!(
            "Downloading {} files from catalog '{}' (max {} concurrent, {})",
            total,
            catalog.name,
            run.max_concurrent_files,
            if run.use_multi_connection {
                format!("{} connections per file", run.num_connections)
            } else {
                "single connection per file".to_string()
            }
        );

        let start = Instant::now();
        let outcomes: Vec<DownloadOutcome> = pool.install(|| {
            catalog
                .resources
                .par_iter()
                .map(|resource| {
                    let outcome = orchestrator.process(resource);
                    let completed = self.metrics.record_outcome(&outcome);
                    progress::emit(
                        self.progress_callback.as_ref(),
                        ProgressEvent::BatchProgress { completed, total },
                    );
                    outcome
                })
                .collect()
        });
        let duration = start.elapsed();

        let failed = failures.take();
        let reporter = FailureReporter::new(self.layout.failed_dir(&run.version));
        let report_path = reporter.write(&catalog.name, &failed)?;

        let metrics = self.metrics.snapshot();
        debug!("Batch finished in {:?}: {:?}", duration, metrics);
        info!(
            "Catalog '{}': {} skipped, {} downloaded, {} failed",
            catalog.name, metrics.skipped_files, metrics.succeeded_files, metrics.failed_files
        );

        Ok(BatchReport {
            outcomes: catalog.resources.iter().cloned().zip(outcomes).collect(),
            failed,
            report_path,
            metrics,
            duration,
        })
    }
}
