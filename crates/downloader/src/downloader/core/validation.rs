//! File integrity verification by streaming MD5

use crate::downloader::core::error::{DownloadError, FileOperation, Result};
use crate::downloader::core::progress::{self, ProgressCallback, ProgressEvent};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::debug;

/// Default read block used when hashing
pub const DEFAULT_HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Compute the lowercase hex MD5 of a file, reading it in `block_size` blocks
///
/// The whole file is never held in memory.
pub fn md5_file(path: &Path, block_size: usize) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| DownloadError::file_system(path, FileOperation::Read, e))?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; block_size.max(1)];
    let mut total = 0u64;

    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(DownloadError::file_system(path, FileOperation::Read, e)),
        };
        context.consume(&buffer[..read]);
        total += read as u64;
    }

    let digest = hex::encode(context.compute().0);
    debug!("MD5 of {} ({} bytes): {}", path.display(), total, digest);
    Ok(digest)
}

/// Expected checksum of one file
#[derive(Debug, Clone)]
pub struct FileValidation {
    /// Expected MD5 in hex
    pub md5: String,
    block_size: usize,
}

impl FileValidation {
    pub fn new<S: Into<String>>(md5: S) -> Self {
        Self {
            md5: md5.into().to_lowercase(),
            block_size: DEFAULT_HASH_BLOCK_SIZE,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Hash `path` and return the actual digest alongside the verdict
    pub fn check_file(&self, path: &Path) -> Result<(bool, String)> {
        let actual = md5_file(path, self.block_size)?;
        Ok((actual.eq_ignore_ascii_case(&self.md5), actual))
    }

    /// Validate a file, turning a mismatch into `ChecksumMismatch`
    pub fn validate_file(
        &self,
        path: &Path,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<()> {
        let result = self.check_file(path);
        let valid = matches!(result, Ok((true, _)));
        progress::emit(
            progress_callback,
            ProgressEvent::ValidationComplete {
                file: path.display().to_string(),
                valid,
            },
        );

        let (passed, actual) = result?;
        if passed {
            Ok(())
        } else {
            Err(DownloadError::ChecksumMismatch {
                file: path.to_path_buf(),
                expected: self.md5.clone(),
                actual,
            })
        }
    }
}
