//! Core types used throughout the downloader
//!
//! Everything else in the engine depends on the types defined here, so they
//! carry no knowledge of scheduling or transport.

pub mod error;
pub mod files;
pub mod http;
pub mod progress;
pub mod validation;

pub use error::{DownloadError, ErrorKind, FileOperation, Result};
pub use progress::{
    ConsoleProgressReporter, IntoProgressCallback, NullProgressReporter, ProgressCallback,
    ProgressEvent, ProgressReporter,
};
pub use validation::FileValidation;

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// One remote file entry of a catalog
///
/// Keys other than `dest` and `md5` are kept as-is so a failure report
/// reproduces the catalog entry exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Destination path relative to the download directory (and to the main URL)
    pub dest: String,
    /// Expected MD5 digest in hex, as spelled in the catalog
    pub md5: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Resource {
    pub fn new<D: Into<String>, M: Into<String>>(dest: D, md5: M) -> Self {
        Self {
            dest: dest.into(),
            md5: md5.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// `dest` without leading slashes
    pub fn relative_dest(&self) -> &str {
        self.dest.trim_start_matches('/')
    }

    /// Resolve the local path of this resource below `base_dir`
    ///
    /// Rejects destinations that would land outside `base_dir`.
    pub fn local_path(&self, base_dir: &Path) -> Result<PathBuf> {
        let relative = Path::new(self.relative_dest());
        if self.relative_dest().is_empty() {
            return Err(DownloadError::InvalidDestination {
                dest: self.dest.clone(),
                reason: "destination is empty".to_string(),
            });
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(DownloadError::InvalidDestination {
                        dest: self.dest.clone(),
                        reason: "destination must stay inside the download directory"
                            .to_string(),
                    });
                }
            }
        }
        Ok(base_dir.join(relative))
    }

    /// Remote URL of this resource under `main_url`
    pub fn remote_url(&self, main_url: &str) -> Result<String> {
        let url = format!("{}/{}", main_url.trim_end_matches('/'), self.relative_dest());
        url::Url::parse(&url).map_err(|source| DownloadError::InvalidUrl {
            url: url.clone(),
            source,
        })?;
        Ok(url)
    }
}

/// Terminal state of one resource in one run
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Local file already had the expected digest; nothing was fetched
    Skipped { size: u64 },
    /// Fetched and verified
    Succeeded { size: u64 },
    /// Fetch or verification failed; the resource is in the failure report
    Failed(DownloadError),
}

impl DownloadOutcome {
    /// `false` only for `Failed`
    pub fn is_success(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DownloadOutcome::Skipped { .. })
    }

    pub fn error(&self) -> Option<&DownloadError> {
        match self {
            DownloadOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}
