//! File operation utilities
//!
//! Local file handling shared by the fetchers, with every I/O error mapped
//! to `DownloadError::FileSystem` carrying the offending path.

use crate::downloader::core::{DownloadError, FileOperation, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing::debug;

/// Create every missing directory above `path`
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| DownloadError::file_system(parent, FileOperation::CreateDir, e))?;
    }
    Ok(())
}

/// Create (or truncate) `path` and size it to exactly `size` bytes
pub fn preallocate(path: &Path, size: u64) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| DownloadError::file_system(path, FileOperation::Create, e))?;
    file.set_len(size)
        .map_err(|e| DownloadError::file_system(path, FileOperation::Allocate, e))?;
    debug!("Pre-allocated {} to {} bytes", path.display(), size);
    Ok(())
}

/// Open an existing file for positioned writes
///
/// Every chunk worker calls this for its own handle, so no two workers share
/// a cursor.
pub fn open_for_write(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| DownloadError::file_system(path, FileOperation::Write, e))
}

/// Write all of `buf` at absolute `offset`, independent of the handle's cursor
#[cfg(unix)]
pub fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

/// Write all of `buf` at absolute `offset`, independent of the handle's cursor
#[cfg(windows)]
pub fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ));
            }
            Ok(written) => {
                buf = &buf[written..];
                offset += written as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Size of an existing file
pub fn file_size(path: &Path) -> Result<u64> {
    fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|e| DownloadError::file_system(path, FileOperation::Metadata, e))
}
