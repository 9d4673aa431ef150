//! Multi-connection download of a single resource
//!
//! A resource of `total_size` bytes is split into contiguous inclusive byte
//! ranges, one per connection. Each range is fetched on its own OS thread
//! through its own file handle with positioned writes, and the download only
//! completes once every range has.

use std::fmt;
use std::path::Path;
use std::thread;
use tracing::{debug, debug_span, warn};

use crate::downloader::core::files::{self, open_for_write};
use crate::downloader::core::http::HttpClient;
use crate::downloader::core::progress::{self, ProgressCallback, ProgressEvent};
use crate::downloader::core::{DownloadError, Result};

/// Inclusive byte span `[start, end]` of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Number of bytes covered
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the HTTP `Range` request header
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Split `[0, total_size - 1]` into `num_connections` contiguous ranges
///
/// Ranges are of equal width `total_size / num_connections`; the remainder
/// goes to the last range. When `total_size < num_connections` the count is
/// lowered to `total_size` so no range is empty.
pub fn partition(total_size: u64, num_connections: usize) -> Result<Vec<ByteRange>> {
    if total_size == 0 {
        return Err(DownloadError::configuration(
            "cannot partition an empty resource",
            "total_size",
        ));
    }
    if num_connections == 0 {
        return Err(DownloadError::configuration(
            "number of connections per file must be at least 1",
            "num_connections",
        ));
    }

    let count = (num_connections as u64).min(total_size);
    let width = total_size / count;
    let mut ranges: Vec<ByteRange> = (0..count)
        .map(|i| ByteRange::new(i * width, (i + 1) * width - 1))
        .collect();
    if let Some(last) = ranges.last_mut() {
        last.end = total_size - 1;
    }
    Ok(ranges)
}

/// Download `url` into `dest_path` over `num_connections` concurrent range requests
///
/// Probes the size with HEAD, pre-allocates the file, then runs one worker
/// thread per range and joins all of them. The first failing range (in
/// range order) is returned; nothing is retried.
pub fn download_chunked(
    client: &HttpClient,
    url: &str,
    dest_path: &Path,
    num_connections: usize,
    progress_callback: Option<&ProgressCallback>,
) -> Result<u64> {
    let total_size = client.probe_size(url)?;
    let ranges = partition(total_size, num_connections)?;
    debug!(
        "Downloading {} ({} bytes) over {} connections",
        url,
        total_size,
        ranges.len()
    );

    files::preallocate(dest_path, total_size)?;
    progress::emit(
        progress_callback,
        ProgressEvent::DownloadStarted {
            url: url.to_string(),
            total_size: Some(total_size),
        },
    );

    let total_chunks = ranges.len();
    let parent_span = tracing::Span::current();
    let results: Vec<Result<u64>> = thread::scope(|scope| {
        let handles: Vec<_> = ranges
            .iter()
            .enumerate()
            .map(|(index, range)| {
                let range = *range;
                let parent_span = &parent_span;
                scope.spawn(move || -> Result<u64> {
                    let _parent = parent_span.enter();
                    let _span = debug_span!("chunk", index, range = %range).entered();
                    let file = open_for_write(dest_path)?;
                    let written = client.fetch_range(url, range, &file, dest_path)?;
                    progress::emit(
                        progress_callback,
                        ProgressEvent::ChunkComplete {
                            url: url.to_string(),
                            index,
                            total_chunks,
                        },
                    );
                    Ok(written)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(DownloadError::BodyRead {
                        url: url.to_string(),
                        source: std::io::Error::other("chunk worker panicked"),
                    })
                })
            })
            .collect()
    });

    let mut downloaded = 0u64;
    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(written) => downloaded += written,
            Err(e) => {
                warn!("Chunk {} of {} failed: {}", index, url, e);
                return Err(e);
            }
        }
    }

    progress::emit(
        progress_callback,
        ProgressEvent::DownloadComplete {
            url: url.to_string(),
            final_size: downloaded,
        },
    );
    Ok(downloaded)
}
