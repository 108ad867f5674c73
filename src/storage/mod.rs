//! Storage abstractions for backup records.
//!
//! Every successful crawl produces one immutable record, grouped into a
//! bucket folder named after the capture month and year. Buckets only
//! organize files; reconstruction orders records by capture timestamp.
//!
//! ## Directory Structure
//!
//! ```text
//! db/
//! ├── 0-2017/                 # January 2017 (zero-based month)
//! │   ├── 1484438400000.json  # first capture: full catalog
//! │   └── 1484524800000.json  # later captures: per-entry patches
//! └── 1-2017/
//!     └── 1486166400000.json
//! ```

pub mod local;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{RecordContent, RecordKind};

// Re-export for convenience
pub use local::LocalStorage;

/// Shared handle to a persisted record.
pub type RecordHandle = Arc<BackupRecord>;

/// One persisted capture.
///
/// The decoded content is cached in memory and may be flushed; it is read
/// back from disk the next time it is needed.
#[derive(Debug)]
pub struct BackupRecord {
    path: PathBuf,
    captured_at: DateTime<Utc>,
    kind: RecordKind,
    content: ArcSwapOption<RecordContent>,
}

impl BackupRecord {
    pub fn new(
        path: impl Into<PathBuf>,
        captured_at: DateTime<Utc>,
        kind: RecordKind,
        content: Option<Arc<RecordContent>>,
    ) -> Self {
        Self {
            path: path.into(),
            captured_at,
            kind,
            content: ArcSwapOption::new(content),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Whether the content is currently held in memory.
    pub fn is_loaded(&self) -> bool {
        self.content.load().is_some()
    }

    /// Decoded content, reading the file if it was flushed.
    pub async fn content(&self) -> Result<Arc<RecordContent>> {
        if let Some(content) = self.content.load_full() {
            return Ok(content);
        }

        let bytes = tokio::fs::read(&self.path).await?;
        let content = Arc::new(RecordContent::from_slice(self.kind, &bytes)?);
        self.content.store(Some(Arc::clone(&content)));
        Ok(content)
    }

    /// Release the cached content.
    pub fn flush(&self) {
        self.content.store(None);
    }
}

/// Trait for backup record backends.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Durably write a new record captured at `captured_at`.
    ///
    /// Never overwrites an existing record with the same timestamp.
    async fn append(
        &self,
        captured_at: DateTime<Utc>,
        content: RecordContent,
    ) -> Result<RecordHandle>;

    /// Enumerate every record, oldest first.
    ///
    /// The oldest record is the full base capture. Content is not decoded
    /// until requested.
    async fn load_all(&self) -> Result<Vec<RecordHandle>>;
}
