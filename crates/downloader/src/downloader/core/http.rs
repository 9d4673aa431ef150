//! HTTP transport
//!
//! Blocking HTTP client with the two fetchers the engine needs: a
//! single-stream download of a whole resource and a byte-range fetch
//! written at a fixed offset. Every call occupies the calling thread until
//! the transfer finishes.

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::downloader::chunked::ByteRange;
use crate::downloader::config::DownloadConfig;
use crate::downloader::core::files::write_all_at;
use crate::downloader::core::progress::{self, ProgressCallback, ProgressEvent};
use crate::downloader::core::{DownloadError, FileOperation, Result};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// HTTP client with integrated download functionality
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    block_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client from download configuration
    pub fn from_config(config: &DownloadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DownloadError::configuration(format!("failed to create HTTP client: {}", e), "http_client")
            })?;

        Ok(Self {
            client,
            block_size: config.block_size.max(1),
        })
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder, url: &str) -> Result<Response> {
        request.send().map_err(|e| DownloadError::HttpRequest {
            url: url.to_string(),
            source: e,
        })
    }

    /// GET `url` and parse the body as JSON
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("Fetching JSON from {}", url);
        let response = self.send(self.client.get(url), url)?;
        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }
        response.json().map_err(|e| DownloadError::HttpRequest {
            url: url.to_string(),
            source: e,
        })
    }

    /// Get the total size of a resource with a HEAD request
    ///
    /// The header is read directly: a HEAD response has no body to size.
    /// A missing, unparseable or zero length is an error.
    pub fn probe_size(&self, url: &str) -> Result<u64> {
        debug!("Getting file size for: {}", url);
        let response = self.send(self.client.head(url), url)?;
        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|size| *size > 0)
            .ok_or_else(|| DownloadError::MissingContentLength {
                url: url.to_string(),
            })
    }

    /// Download a whole resource sequentially, overwriting `dest_path`
    pub fn download_to_file(
        &self,
        url: &str,
        dest_path: &Path,
        progress_callback: Option<&ProgressCallback>,
    ) -> Result<u64> {
        debug!("Stream downloading: {} to {}", url, dest_path.display());

        let mut response = self.send(self.client.get(url), url)?;
        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let total_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        progress::emit(
            progress_callback,
            ProgressEvent::DownloadStarted {
                url: url.to_string(),
                total_size,
            },
        );

        let mut file = File::create(dest_path)
            .map_err(|e| DownloadError::file_system(dest_path, FileOperation::Create, e))?;

        let mut buffer = vec![0u8; self.block_size];
        let mut downloaded = 0u64;
        let start_time = Instant::now();
        let mut last_progress_time = start_time;

        loop {
            let read = read_block(&mut response, &mut buffer, url)?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .map_err(|e| DownloadError::file_system(dest_path, FileOperation::Write, e))?;
            downloaded += read as u64;

            // Report progress at most every 100ms to avoid spam
            let now = Instant::now();
            if now.duration_since(last_progress_time) >= PROGRESS_INTERVAL {
                let elapsed = start_time.elapsed().as_secs_f64();
                let speed = if elapsed > 0.0 { downloaded as f64 / elapsed } else { 0.0 };
                progress::emit(
                    progress_callback,
                    ProgressEvent::DownloadProgress {
                        url: url.to_string(),
                        downloaded,
                        total: total_size,
                        speed_bps: speed,
                    },
                );
                last_progress_time = now;
            }
        }

        file.sync_all()
            .map_err(|e| DownloadError::file_system(dest_path, FileOperation::Write, e))?;

        progress::emit(
            progress_callback,
            ProgressEvent::DownloadComplete {
                url: url.to_string(),
                final_size: downloaded,
            },
        );
        debug!("Stream download completed: {} bytes", downloaded);
        Ok(downloaded)
    }

    /// Fetch `range` of `url` and write it into `file` at `range.start`
    ///
    /// `file` must already be sized to the full resource. Writes are
    /// positioned, so other workers may hold their own handles to the same
    /// path. The body must be exactly `range.len()` bytes.
    pub fn fetch_range(
        &self,
        url: &str,
        range: ByteRange,
        file: &File,
        dest_path: &Path,
    ) -> Result<u64> {
        debug!("Fetching range {} of {}", range, url);
        let request = self.client.get(url).header(RANGE, range.header_value());
        let mut response = self.send(request, url)?;
        if response.status() != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let expected = range.len();
        let mut buffer = vec![0u8; self.block_size];
        let mut written = 0u64;

        loop {
            let read = read_block(&mut response, &mut buffer, url)?;
            if read == 0 {
                break;
            }
            if written + read as u64 > expected {
                return Err(DownloadError::ShortRead {
                    url: url.to_string(),
                    range,
                    expected,
                    actual: written + read as u64,
                });
            }
            write_all_at(file, &buffer[..read], range.start + written)
                .map_err(|e| DownloadError::file_system(dest_path, FileOperation::Write, e))?;
            written += read as u64;
        }

        if written != expected {
            return Err(DownloadError::ShortRead {
                url: url.to_string(),
                range,
                expected,
                actual: written,
            });
        }
        Ok(written)
    }
}

fn read_block(response: &mut Response, buffer: &mut [u8], url: &str) -> Result<usize> {
    loop {
        match response.read(buffer) {
            Ok(read) => return Ok(read),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(DownloadError::BodyRead {
                    url: url.to_string(),
                    source: e,
                });
            }
        }
    }
}
