//! Error types for the downloader with context for logging and failure reports

use std::error::Error as StdError;
use std::path::PathBuf;
use thiserror::Error;

use crate::downloader::chunked::ByteRange;

/// Errors raised while loading a catalog or downloading its resources
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Connection dropped or failed while reading a response body
    #[error("Reading response body from '{url}' failed")]
    BodyRead {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Server answered with a status we cannot use
    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Range body did not match the requested width
    #[error("Range {range} of '{url}' returned {actual} bytes, expected {expected}")]
    ShortRead {
        url: String,
        range: ByteRange,
        expected: u64,
        actual: u64,
    },

    /// Size probe returned no usable content length
    #[error("Server did not report a content length for '{url}'")]
    MissingContentLength { url: String },

    /// File system I/O errors with file context
    #[error("Failed {operation} '{path}'")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Post-download digest differs from the catalog
    #[error("Checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Invalid URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Catalog destination that cannot be placed under the download directory
    #[error("Invalid destination '{dest}': {reason}")]
    InvalidDestination { dest: String, reason: String },

    /// Configuration errors
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    #[error("Failed to load catalog '{source_name}': {reason}")]
    CatalogLoad { source_name: String, reason: String },

    #[error("JSON error")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    CreateDir,
    Metadata,
    Allocate,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::Metadata => write!(f, "reading metadata of"),
            FileOperation::Allocate => write!(f, "pre-allocating"),
        }
    }
}

/// Coarse classification used when deciding whether an error is fatal to the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transfer,
    IntegrityMismatch,
    LocalIo,
    Configuration,
    ManifestLoad,
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    pub fn file_system<P: Into<PathBuf>>(
        path: P,
        operation: FileOperation,
        source: std::io::Error,
    ) -> Self {
        DownloadError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn configuration<S: Into<String>>(message: S, field: &str) -> Self {
        DownloadError::Configuration {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::HttpRequest { .. }
            | DownloadError::HttpStatus { .. }
            | DownloadError::BodyRead { .. }
            | DownloadError::ShortRead { .. }
            | DownloadError::MissingContentLength { .. }
            | DownloadError::InvalidUrl { .. }
            | DownloadError::InvalidDestination { .. } => ErrorKind::Transfer,
            DownloadError::ChecksumMismatch { .. } => ErrorKind::IntegrityMismatch,
            DownloadError::FileSystem { .. } => ErrorKind::LocalIo,
            DownloadError::Configuration { .. } => ErrorKind::Configuration,
            DownloadError::CatalogLoad { .. } | DownloadError::Json { .. } => {
                ErrorKind::ManifestLoad
            }
        }
    }

    /// Only configuration and catalog errors abort a whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::ManifestLoad
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::HttpRequest { .. } => "http_request",
            DownloadError::HttpStatus { .. } => "http_status",
            DownloadError::BodyRead { .. } => "body_read",
            DownloadError::ShortRead { .. } => "short_read",
            DownloadError::MissingContentLength { .. } => "missing_content_length",
            DownloadError::FileSystem { .. } => "file_system",
            DownloadError::ChecksumMismatch { .. } => "checksum_mismatch",
            DownloadError::InvalidUrl { .. } => "invalid_url",
            DownloadError::InvalidDestination { .. } => "invalid_destination",
            DownloadError::Configuration { .. } => "configuration",
            DownloadError::CatalogLoad { .. } => "catalog_load",
            DownloadError::Json { .. } => "json",
        }
    }

    /// Error message followed by its chain of causes, on one line
    pub fn detailed_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
