//! Catalog loading
//!
//! A catalog is a JSON document `{"resource": [{"dest": .., "md5": ..}, ..]}`
//! fetched from a URL or read from a local file. Its display name (the
//! basename of the URL path or file) names the failure report of a run.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::downloader::core::http::HttpClient;
use crate::downloader::core::{DownloadError, Resource, Result};

/// Where a catalog comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Url(String),
    File(PathBuf),
}

impl CatalogSource {
    /// Basename used as the catalog's display name
    pub fn display_name(&self) -> Result<String> {
        let name = match self {
            CatalogSource::Url(url) => {
                let parsed = url::Url::parse(url).map_err(|e| self.load_error(format!("invalid URL: {}", e)))?;
                parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .unwrap_or_default()
                    .to_string()
            }
            CatalogSource::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        if name.is_empty() {
            return Err(self.load_error("cannot derive a catalog name from an empty basename"));
        }
        Ok(name)
    }

    fn location(&self) -> String {
        match self {
            CatalogSource::Url(url) => url.clone(),
            CatalogSource::File(path) => path.display().to_string(),
        }
    }

    fn load_error<S: Into<String>>(&self, reason: S) -> DownloadError {
        DownloadError::CatalogLoad {
            source_name: self.location(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    resource: Vec<Resource>,
}

/// Ordered list of resources for one run, plus its name
#[derive(Debug, Clone)]
pub struct Catalog {
    pub name: String,
    pub resources: Vec<Resource>,
}

impl Catalog {
    /// Build a catalog, rejecting malformed entries
    ///
    /// Resources are kept exactly as given; digests are compared
    /// case-insensitively at verification time.
    pub fn new<S: Into<String>>(name: S, resources: Vec<Resource>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();

        for resource in &resources {
            if resource.md5.len() != 32 || !resource.md5.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(DownloadError::CatalogLoad {
                    source_name: name.clone(),
                    reason: format!(
                        "resource '{}' has an invalid md5 '{}' (expected 32 hex digits)",
                        resource.dest, resource.md5
                    ),
                });
            }
            if !seen.insert(destination_key(resource)) {
                return Err(DownloadError::CatalogLoad {
                    source_name: name.clone(),
                    reason: format!("destination '{}' appears more than once", resource.dest),
                });
            }
        }

        Ok(Self { name, resources })
    }

    /// Parse a catalog document held in memory
    pub fn from_json_str<S: Into<String>>(name: S, json: &str) -> Result<Self> {
        let name = name.into();
        let document: CatalogDocument =
            serde_json::from_str(json).map_err(|e| DownloadError::CatalogLoad {
                source_name: name.clone(),
                reason: e.to_string(),
            })?;
        Self::new(name, document.resource)
    }

    /// Read a catalog from a local file
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(&CatalogSource::File(path.to_path_buf()), None)
    }

    /// Load a catalog from `source`; `client` is required for URL sources
    pub fn load(source: &CatalogSource, client: Option<&HttpClient>) -> Result<Self> {
        let name = source.display_name()?;
        debug!("Loading catalog '{}' from {}", name, source.location());

        let document: CatalogDocument = match source {
            CatalogSource::Url(url) => {
                let client = client.ok_or_else(|| {
                    source.load_error("an HTTP client is required to load a catalog from a URL")
                })?;
                client
                    .get_json(url)
                    .map_err(|e| source.load_error(e.detailed_message()))?
            }
            CatalogSource::File(path) => {
                let contents = std::fs::read_to_string(path)
                    .map_err(|e| source.load_error(e.to_string()))?;
                serde_json::from_str(&contents).map_err(|e| source.load_error(e.to_string()))?
            }
        };

        let catalog = Self::new(name, document.resource)?;
        info!("Loaded catalog '{}' with {} resources", catalog.name, catalog.resources.len());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Local path a destination resolves to, with `.` and repeated separators folded
fn destination_key(resource: &Resource) -> PathBuf {
    Path::new(resource.relative_dest())
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}
