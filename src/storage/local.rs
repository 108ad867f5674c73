//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! └── {month0}-{year}/       # capture bucket
//!     └── {unix_millis}.json  # one record per crawl
//! ```
//!
//! Records are written to a temporary file first and renamed into place,
//! so a record is either fully present or absent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{RecordContent, RecordKind};
use crate::storage::{BackupRecord, BackupStore, RecordHandle};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Bucket folder for a capture time: zero-based month, dash, year.
    fn bucket_name(captured_at: DateTime<Utc>) -> String {
        format!("{}-{}", captured_at.month0(), captured_at.year())
    }

    /// Record key relative to the root.
    fn record_key(captured_at: DateTime<Utc>) -> String {
        format!(
            "{}/{}.json",
            Self::bucket_name(captured_at),
            captured_at.timestamp_millis()
        )
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename), refusing to
    /// replace an existing file.
    async fn write_new(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        if tokio::fs::try_exists(&path).await? {
            return Err(AppError::storage(format!(
                "record {} already exists",
                path.display()
            )));
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await
            .map_err(|e| AppError::storage(format!("cannot create {}: {e}", tmp.display())))?;
        let written = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::storage(format!(
                "cannot write {}: {e}",
                tmp.display()
            )));
        }

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Parse a record file name into its capture time.
    fn parse_record_name(path: &Path) -> Option<DateTime<Utc>> {
        if path.extension()? != "json" {
            return None;
        }
        let millis: i64 = path.file_stem()?.to_str()?.parse().ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    /// Collect record files of one bucket folder.
    async fn scan_bucket(dir: &Path, found: &mut Vec<(DateTime<Utc>, PathBuf)>) -> Result<()> {
        let mut files = tokio::fs::read_dir(dir).await?;
        while let Some(file) = files.next_entry().await? {
            let path = file.path();
            if !file.file_type().await?.is_file() {
                continue;
            }
            match Self::parse_record_name(&path) {
                Some(captured_at) => found.push((captured_at, path)),
                None => log::warn!("Skipping unrecognized file {}", path.display()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BackupStore for LocalStorage {
    async fn append(
        &self,
        captured_at: DateTime<Utc>,
        content: RecordContent,
    ) -> Result<RecordHandle> {
        let key = Self::record_key(captured_at);
        let bytes = content.to_vec()?;
        let path = self.write_new(&key, &bytes).await?;

        log::info!(
            "Backup record written to {} ({} bytes)",
            path.display(),
            bytes.len()
        );

        Ok(Arc::new(BackupRecord::new(
            path,
            captured_at,
            content.kind(),
            Some(Arc::new(content)),
        )))
    }

    async fn load_all(&self) -> Result<Vec<RecordHandle>> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let mut found = Vec::new();
        let mut buckets = tokio::fs::read_dir(&self.root_dir).await?;
        while let Some(bucket) = buckets.next_entry().await? {
            if bucket.file_type().await?.is_dir() {
                Self::scan_bucket(&bucket.path(), &mut found).await?;
            }
        }

        found.sort_by_key(|(captured_at, _)| *captured_at);

        let records = found
            .into_iter()
            .enumerate()
            .map(|(i, (captured_at, path))| {
                let kind = if i == 0 {
                    RecordKind::Full
                } else {
                    RecordKind::Patches
                };
                Arc::new(BackupRecord::new(path, captured_at, kind, None))
            })
            .collect();

        Ok(records)
    }
}
