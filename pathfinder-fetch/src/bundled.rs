//! Guides shipped with the application, addressed as `bundled:<id>`.
//!
//! The catalog directory holds an `index.json` listing the guides and the
//! guide files themselves:
//!
//! ```json
//! {"interactives": [{"id": "first-dashboard", "title": "First dashboard"}]}
//! ```

use std::path::{Path, PathBuf};

use chrono::Utc;
use pathfinder::metadata::{ContentMetadata, ContentType};
use pathfinder::normalize::{RawBody, normalize};
use pathfinder::trust::BUNDLED_SCHEME;
use serde::Deserialize;
use thiserror::Error;

use crate::content::RawContent;

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Error)]
pub enum BundledError {
    #[error("Bundled content is not available")]
    Unavailable,
    #[error("Bundled interactive not found in index.json: {0}")]
    NotFound(String),
    #[error("Bundled interactive content is empty: {0}")]
    Empty(String),
    #[error("Invalid bundled file name for {id}: {filename}")]
    InvalidFilename { id: String, filename: String },
    #[error("Failed to load bundled interactive: {id}. Error: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read bundled index {path}: {source}")]
    IndexIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid bundled index: {0}")]
    IndexFormat(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BundledEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Defaults to `<id>.json`
    #[serde(default)]
    pub filename: Option<String>,
}

impl BundledEntry {
    fn filename(&self) -> String {
        self.filename
            .clone()
            .unwrap_or_else(|| format!("{}.json", self.id))
    }
}

#[derive(Debug, Deserialize)]
struct BundledIndex {
    #[serde(default)]
    interactives: Vec<BundledEntry>,
}

/// A directory of bundled guides.
#[derive(Debug, Clone)]
pub struct BundledCatalog {
    dir: PathBuf,
}

impl BundledCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every guide listed in the index.
    pub async fn entries(&self) -> Result<Vec<BundledEntry>, BundledError> {
        let path = self.dir.join(INDEX_FILE);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| BundledError::IndexIo { path, source })?;
        let index: BundledIndex = serde_json::from_str(&text)?;
        Ok(index.interactives)
    }

    /// Load `bundled:<id>`.
    pub async fn load(&self, url: &str) -> Result<RawContent, BundledError> {
        let id = url
            .strip_prefix(BUNDLED_SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(url);

        let entry = self
            .entries()
            .await?
            .into_iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| BundledError::NotFound(id.to_owned()))?;

        let filename = entry.filename();
        if !is_plain_file_name(&filename) {
            return Err(BundledError::InvalidFilename {
                id: id.to_owned(),
                filename,
            });
        }

        let text = tokio::fs::read_to_string(self.dir.join(&filename))
            .await
            .map_err(|source| BundledError::Io {
                id: id.to_owned(),
                source,
            })?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "{}" {
            return Err(BundledError::Empty(id.to_owned()));
        }

        let title = entry.title.clone().unwrap_or_else(|| id.to_owned());
        debug!(id, filename = %filename, "loaded bundled guide");
        let normalized = normalize(RawBody::NativeJson(text), url, &title);

        Ok(RawContent {
            content: normalized.guide,
            metadata: ContentMetadata::titled(title),
            content_type: ContentType::SingleDoc,
            url: url.to_owned(),
            last_fetched: Utc::now(),
            hash_fragment: None,
        })
    }
}

/// A single path component that stays inside the catalog directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().is_some_and(|f| f == name)
}
