//! Per-resource download orchestration
//!
//! For one resource: skip when the local copy already has the expected
//! digest, otherwise fetch it (single stream or chunked), verify, and
//! classify the result. Every error ends here as a `Failed` outcome and a
//! failure record; nothing propagates to sibling resources.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

use crate::downloader::chunked;
use crate::downloader::config::RunConfig;
use crate::downloader::core::files;
use crate::downloader::core::http::HttpClient;
use crate::downloader::core::progress::{self, ProgressCallback, ProgressEvent};
use crate::downloader::core::validation::DEFAULT_HASH_BLOCK_SIZE;
use crate::downloader::core::{DownloadOutcome, FileValidation, Resource, Result};
use crate::downloader::report::FailureSet;

pub struct FileOrchestrator {
    client: HttpClient,
    run: RunConfig,
    download_dir: PathBuf,
    failures: Arc<FailureSet>,
    progress_callback: Option<ProgressCallback>,
    block_size: usize,
}

impl FileOrchestrator {
    /// `download_dir` is the run-scoped base (`download/<version>`)
    pub fn new<P: Into<PathBuf>>(
        client: HttpClient,
        run: RunConfig,
        download_dir: P,
        failures: Arc<FailureSet>,
    ) -> Self {
        Self {
            client,
            run,
            download_dir: download_dir.into(),
            failures,
            progress_callback: None,
            block_size: DEFAULT_HASH_BLOCK_SIZE,
        }
    }

    pub fn with_progress_callback(mut self, progress_callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = progress_callback;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Bring `resource` to a terminal outcome
    ///
    /// Failures are recorded in the shared failure set and returned as
    /// `DownloadOutcome::Failed`; this never panics or returns early.
    pub fn process(&self, resource: &Resource) -> DownloadOutcome {
        let _span = info_span!("file", dest = %resource.dest).entered();

        match self.try_process(resource) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{} failed ({}): {}", resource.dest, e.category(), e.detailed_message());
                self.failures.record(resource);
                progress::emit(
                    self.progress_callback.as_ref(),
                    ProgressEvent::FileFailed {
                        dest: resource.dest.clone(),
                        error: e.to_string(),
                    },
                );
                DownloadOutcome::Failed(e)
            }
        }
    }

    fn try_process(&self, resource: &Resource) -> Result<DownloadOutcome> {
        let dest_path = resource.local_path(&self.download_dir)?;
        let url = resource.remote_url(&self.run.main_url)?;
        files::ensure_parent_dir(&dest_path)?;

        let validation = FileValidation::new(&resource.md5).with_block_size(self.block_size);
        if let Some(size) = self.check_existing(&dest_path, &validation) {
            debug!("{} already exists and is valid, skipping download", resource.dest);
            progress::emit(
                self.progress_callback.as_ref(),
                ProgressEvent::FileSkipped {
                    dest: resource.dest.clone(),
                },
            );
            return Ok(DownloadOutcome::Skipped { size });
        }

        let callback = self.progress_callback.as_ref();
        let size = if self.run.use_multi_connection {
            chunked::download_chunked(&self.client, &url, &dest_path, self.run.num_connections, callback)?
        } else {
            self.client.download_to_file(&url, &dest_path, callback)?
        };

        validation.validate_file(&dest_path, callback)?;
        info!("Downloaded and verified {} ({} bytes)", resource.dest, size);
        Ok(DownloadOutcome::Succeeded { size })
    }

    /// Size of the existing file when its digest already matches
    ///
    /// An unreadable file counts as a mismatch.
    fn check_existing(&self, dest_path: &Path, validation: &FileValidation) -> Option<u64> {
        if !dest_path.is_file() {
            return None;
        }

        match validation.check_file(dest_path) {
            Ok((true, _)) => Some(files::file_size(dest_path).unwrap_or_default()),
            Ok((false, actual)) => {
                debug!(
                    "Existing {} has digest {}, expected {}; downloading again",
                    dest_path.display(),
                    actual,
                    validation.md5
                );
                None
            }
            Err(e) => {
                warn!("Could not verify existing {}: {}", dest_path.display(), e);
                None
            }
        }
    }
}
