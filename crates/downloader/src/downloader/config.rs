//! Configuration types for the downloader

use crate::downloader::core::{DownloadError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transport settings shared by every request in a run
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Per-request timeout (connect through end of body)
    pub timeout: Duration,
    pub user_agent: String,
    /// Block size for streaming bodies to disk and for hashing
    pub block_size: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            user_agent: concat!("downloader/", env!("CARGO_PKG_VERSION")).to_string(),
            block_size: 64 * 1024,
        }
    }
}

/// Builder for `DownloadConfig`
#[derive(Debug, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.config.block_size = block_size.max(1);
        self
    }

    pub fn build(self) -> DownloadConfig {
        self.config
    }
}

/// Settings for one catalog run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Base URL every resource `dest` is appended to
    pub main_url: String,
    /// Run-scoped folder name under `download/` and `failed/`
    pub version: String,
    /// Split each file across `num_connections` range requests
    pub use_multi_connection: bool,
    pub num_connections: usize,
    pub max_concurrent_files: usize,
}

impl RunConfig {
    pub fn new<U: Into<String>, V: Into<String>>(main_url: U, version: V) -> Self {
        Self {
            main_url: main_url.into(),
            version: version.into(),
            use_multi_connection: false,
            num_connections: 4,
            max_concurrent_files: 4,
        }
    }

    pub fn with_multi_connection(mut self, num_connections: usize) -> Self {
        self.use_multi_connection = true;
        self.with_num_connections(num_connections)
    }

    /// Set the per-file connection count without enabling chunked downloads
    pub fn with_num_connections(mut self, num_connections: usize) -> Self {
        self.num_connections = num_connections;
        self
    }

    pub fn with_max_concurrent_files(mut self, max_concurrent_files: usize) -> Self {
        self.max_concurrent_files = max_concurrent_files;
        self
    }

    /// Reject settings that would make the whole run meaningless
    ///
    /// Values are used verbatim afterwards, so surrounding whitespace is an
    /// error rather than something to trim.
    pub fn validate(&self) -> Result<()> {
        let main_url = self.main_url.as_str();
        if main_url.trim().is_empty() {
            return Err(DownloadError::configuration("main URL is empty", "main_url"));
        }
        if main_url.trim() != main_url {
            return Err(DownloadError::configuration(
                format!("main URL '{}' has surrounding whitespace", main_url),
                "main_url",
            ));
        }
        url::Url::parse(main_url).map_err(|e| {
            DownloadError::configuration(format!("main URL '{}' is invalid: {}", main_url, e), "main_url")
        })?;

        let version = self.version.as_str();
        if version.trim().is_empty() {
            return Err(DownloadError::configuration("version is empty", "version"));
        }
        if version.trim() != version {
            return Err(DownloadError::configuration(
                format!("version '{}' has surrounding whitespace", version),
                "version",
            ));
        }
        if version == "." || version.contains("..") || version.contains(['/', '\\']) {
            return Err(DownloadError::configuration(
                format!("version '{}' must be a single folder name", version),
                "version",
            ));
        }

        if self.num_connections == 0 {
            return Err(DownloadError::configuration(
                "number of connections per file must be at least 1",
                "num_connections",
            ));
        }
        if self.max_concurrent_files == 0 {
            return Err(DownloadError::configuration(
                "maximum concurrent files must be at least 1",
                "max_concurrent_files",
            ));
        }
        Ok(())
    }
}

/// Filesystem layout of a run, rooted at an explicit directory
#[derive(Debug, Clone)]
pub struct DownloadLayout {
    root: PathBuf,
}

impl DownloadLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/download/<version>`
    pub fn download_dir(&self, version: &str) -> PathBuf {
        self.root.join("download").join(version)
    }

    /// `<root>/failed/<version>`
    pub fn failed_dir(&self, version: &str) -> PathBuf {
        self.root.join("failed").join(version)
    }
}
