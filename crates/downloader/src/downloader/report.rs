//! Failure bookkeeping for a run
//!
//! `FailureSet` is shared by every file worker; `FailureReporter` persists it
//! as `{"resource": [...]}` once the batch is done.

use crate::downloader::core::{DownloadError, FileOperation, Resource, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

/// Resources that failed in the current run, in the order they failed
#[derive(Debug, Default)]
pub struct FailureSet {
    resources: Mutex<Vec<Resource>>,
}

impl FailureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, resource: &Resource) {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource.clone());
    }

    pub fn len(&self) -> usize {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the recorded resources, leaving the set empty
    pub fn take(&self) -> Vec<Resource> {
        std::mem::take(
            &mut *self
                .resources
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

/// On-disk shape of a failure report (same shape as a catalog)
#[derive(Debug, Serialize, Deserialize)]
pub struct FailureReport {
    pub resource: Vec<Resource>,
}

/// Writes failure reports under a run-scoped directory
#[derive(Debug, Clone)]
pub struct FailureReporter {
    failed_dir: PathBuf,
}

impl FailureReporter {
    pub fn new<P: Into<PathBuf>>(failed_dir: P) -> Self {
        Self {
            failed_dir: failed_dir.into(),
        }
    }

    pub fn failed_dir(&self) -> &Path {
        &self.failed_dir
    }

    /// Write `failed` to `<failed_dir>/<catalog_name>`, replacing any older report
    ///
    /// Returns `None` without touching the filesystem when nothing failed.
    pub fn write(&self, catalog_name: &str, failed: &[Resource]) -> Result<Option<PathBuf>> {
        if failed.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.failed_dir).map_err(|e| {
            DownloadError::file_system(&self.failed_dir, FileOperation::CreateDir, e)
        })?;
        let path = self.failed_dir.join(catalog_name);

        let file = File::create(&path)
            .map_err(|e| DownloadError::file_system(&path, FileOperation::Create, e))?;
        let mut writer = BufWriter::new(file);
        let report = FailureReport {
            resource: failed.to_vec(),
        };
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
        report.serialize(&mut serializer)?;
        writer
            .flush()
            .map_err(|e| DownloadError::file_system(&path, FileOperation::Write, e))?;

        info!("Failed resources logged in {}", path.display());
        Ok(Some(path))
    }
}
