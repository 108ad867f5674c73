// src/services/catalog.rs

//! Catalog service.
//!
//! Owns the reconstructed latest catalog and the ordered record history.
//! Crawl results become backup records here. Read queries are answered
//! from the published snapshot of the latest state.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::{RwLock, watch};

use crate::error::{AppError, Result};
use crate::models::{Catalog, DateRange, Entry, NamespaceMap, Patch, RecordContent};
use crate::pipeline::{Folder, apply_patch_set, compute_patch_set, merge_into};
use crate::services::orchestrator::CrawlOrchestrator;
use crate::storage::{BackupStore, RecordHandle};

/// Shortest search query that is not considered too broad.
const MIN_QUERY_LEN: usize = 2;

/// How the service came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Existing records were folded into the latest state.
    Restored { records: usize },
    /// The store was empty and the first full capture was written.
    FirstCapture,
    /// The store was empty and the first crawl failed.
    Empty,
}

/// One historical state of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub captured_at: DateTime<Utc>,
    /// Reconstructed entry as of this record
    pub entry: Entry,
    /// Patch stored in this record; `None` for the full base capture
    pub patch: Option<Patch>,
}

/// Search results grouped by namespace, in crawl order.
pub type SearchResults = IndexMap<String, NamespaceMap<Entry>>;

pub struct CatalogService {
    orchestrator: CrawlOrchestrator,
    store: Arc<dyn BackupStore>,
    latest: ArcSwapOption<Catalog>,
    records: RwLock<Vec<RecordHandle>>,
    cooldown: Duration,
}

impl CatalogService {
    pub fn new(
        orchestrator: CrawlOrchestrator,
        store: Arc<dyn BackupStore>,
        cooldown: Duration,
    ) -> Self {
        Self {
            orchestrator,
            store,
            latest: ArcSwapOption::empty(),
            records: RwLock::new(Vec::new()),
            cooldown,
        }
    }

    /// Rebuild the latest state from the store, or run the first crawl.
    ///
    /// A history that cannot be folded is an error. A failed first crawl is
    /// logged and reported as [`Startup::Empty`].
    pub async fn init(&self) -> Result<Startup> {
        let records = self.restore().await?;
        if records > 0 {
            return Ok(Startup::Restored { records });
        }

        log::info!("No backup records found, running the first full crawl");
        Ok(match self.crawl_once().await {
            Ok(_) => Startup::FirstCapture,
            Err(e) => {
                log::error!("First crawl failed: {e}");
                Startup::Empty
            }
        })
    }

    /// Fold every stored record into the latest state.
    ///
    /// Returns the number of records found. Only the newest record stays
    /// cached in memory.
    pub async fn restore(&self) -> Result<usize> {
        let loaded = self.store.load_all().await?;
        if loaded.is_empty() {
            return Ok(0);
        }

        let mut folder = Folder::new();
        let newest = loaded.len() - 1;
        for (i, record) in loaded.iter().enumerate() {
            let content = record.content().await?;
            folder.push(&content)?;
            if i != newest {
                record.flush();
            }
        }
        let latest = folder
            .finish()
            .ok_or_else(|| AppError::storage("backup history has no full capture"))?;

        log::info!(
            "Loaded {} backup records ({} namespaces, {} entries)",
            loaded.len(),
            latest.namespaces.len(),
            latest.item_count()
        );

        let count = loaded.len();
        *self.records.write().await = loaded;
        self.latest.store(Some(Arc::new(latest)));
        Ok(count)
    }

    /// Crawl once and persist the result as a new record.
    ///
    /// The first record is the full catalog; later records hold the patch
    /// set against the latest state. `latest` only changes after the record
    /// is durably written.
    pub async fn crawl_once(&self) -> Result<RecordHandle> {
        let fresh = self.orchestrator.crawl().await?.catalog;

        let mut records = self.records.write().await;
        let captured_at = next_capture_time(records.last().map(|r| r.captured_at()));

        let (content, next) = if records.is_empty() {
            (RecordContent::Full(fresh.clone()), fresh)
        } else {
            let latest = self
                .latest
                .load_full()
                .ok_or_else(|| AppError::storage("records exist but no latest state was built"))?;
            let patches = compute_patch_set(&latest, &fresh);
            let mut next = Catalog::clone(&latest);
            apply_patch_set(&mut next, &patches);
            log::info!("{} entries changed since the last capture", patches.item_count());
            (RecordContent::Patches(patches), next)
        };

        let record = self.store.append(captured_at, content).await?;

        if let Some(previous) = records.last() {
            previous.flush();
        }
        records.push(Arc::clone(&record));
        self.latest.store(Some(Arc::new(next)));

        Ok(record)
    }

    /// Chained crawl loop: crawl, persist, wait `cooldown`, repeat.
    ///
    /// Failures are logged and never stop the loop; only `shutdown` does.
    pub async fn run(self: Arc<Self>, startup: Startup, mut shutdown: watch::Receiver<bool>) {
        let mut wait_first = !matches!(startup, Startup::Restored { .. });

        loop {
            if wait_first {
                tokio::select! {
                    _ = tokio::time::sleep(self.cooldown) => {}
                    _ = shutdown.wait_for(|stop| *stop) => break,
                }
            }
            wait_first = true;

            if *shutdown.borrow() {
                break;
            }

            match self.crawl_once().await {
                Ok(record) => log::info!(
                    "Backup from {} saved; next crawl in {:?}",
                    record.captured_at(),
                    self.cooldown
                ),
                Err(AppError::Cancelled) => break,
                Err(e) => log::error!("Crawl failed: {e}; next crawl in {:?}", self.cooldown),
            }
        }

        log::info!("Crawl loop stopped");
    }

    /// Current latest snapshot.
    pub fn latest(&self) -> Option<Arc<Catalog>> {
        self.latest.load_full()
    }

    pub async fn records(&self) -> Vec<RecordHandle> {
        self.records.read().await.clone()
    }

    /// Namespace names in crawl order.
    pub fn list_namespaces(&self) -> Option<Vec<String>> {
        let latest = self.latest.load();
        let latest = latest.as_ref()?;
        Some(latest.namespaces.keys().cloned().collect())
    }

    /// Entry by id, ignoring case. The first namespace in crawl order
    /// holding it wins.
    pub fn get_entry(&self, id: &str) -> Option<Entry> {
        let latest = self.latest.load();
        find_in(latest.as_ref()?, id).map(|(_, entry)| entry.clone())
    }

    /// Entries of one namespace; the name is matched upper-cased.
    pub fn get_namespace(&self, name: &str) -> Option<NamespaceMap<Entry>> {
        let latest = self.latest.load();
        latest
            .as_ref()?
            .namespaces
            .get(&name.to_uppercase())
            .cloned()
    }

    /// Content of the newest record.
    pub async fn latest_raw(&self) -> Result<Option<Arc<RecordContent>>> {
        let newest = self.records.read().await.last().cloned();
        match newest {
            Some(record) => Ok(Some(record.content().await?)),
            None => Ok(None),
        }
    }

    /// States of one entry over an inclusive range of UTC capture days.
    ///
    /// Every record naming the entry inside the range yields one item,
    /// oldest first. Records before the range are still replayed so each
    /// item carries the fully reconstructed state.
    ///
    /// Cost is one read per record up to the end of the range: records that
    /// are not cached are loaded from the store and released again.
    pub async fn entry_history(&self, id: &str, range: DateRange) -> Result<Option<Vec<HistoryItem>>> {
        if range.is_inverted() {
            return Ok(None);
        }

        let records = self.records().await;
        let mut state: Option<Entry> = None;
        let mut items = Vec::new();

        for record in records {
            let day = record.captured_at().date_naive();
            if day > range.end {
                break;
            }

            let was_loaded = record.is_loaded();
            let content = record.content().await?;
            let patch = match content.as_ref() {
                RecordContent::Full(catalog) => {
                    state = find_in(catalog, id).map(|(_, entry)| entry.clone());
                    None
                }
                RecordContent::Patches(patches) => match (find_in(patches, id), state.as_mut()) {
                    (Some((_, patch)), Some(entry)) => {
                        merge_into(entry, patch);
                        Some(patch.clone())
                    }
                    _ => None,
                },
            };
            let named = matches!(content.as_ref(), RecordContent::Full(_)) || patch.is_some();
            drop(content);
            if !was_loaded {
                record.flush();
            }

            if let (true, true, Some(entry)) = (named, range.contains(day), &state) {
                items.push(HistoryItem {
                    captured_at: record.captured_at(),
                    entry: entry.clone(),
                    patch,
                });
            }
        }

        Ok((!items.is_empty()).then_some(items))
    }

    /// Entries whose id contains the query, or whose name contains it
    /// ignoring case. A leading `0x` is ignored; shorter than two characters
    /// is too broad.
    pub fn search(&self, query: &str) -> Option<SearchResults> {
        let query = query.strip_prefix("0x").unwrap_or(query);
        if query.chars().count() < MIN_QUERY_LEN {
            return None;
        }

        let latest = self.latest.load();
        let needle = query.to_lowercase();
        let mut results = SearchResults::new();

        for (namespace, entries) in &latest.as_ref()?.namespaces {
            for (id, entry) in entries {
                if id.contains(query) || entry.name.to_lowercase().contains(&needle) {
                    results
                        .entry(namespace.clone())
                        .or_default()
                        .insert(id.clone(), entry.clone());
                }
            }
        }

        (!results.is_empty()).then_some(results)
    }
}

/// Look up an id across namespaces, ignoring case.
fn find_in<'a, T>(
    snapshot: &'a crate::models::CatalogSnapshot<T>,
    id: &str,
) -> Option<(&'a str, &'a T)> {
    let upper = id.to_uppercase();
    snapshot.namespaces.iter().find_map(|(namespace, items)| {
        items
            .get(&upper)
            .or_else(|| {
                items
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(id))
                    .map(|(_, item)| item)
            })
            .map(|item| (namespace.as_str(), item))
    })
}

/// Millisecond capture time strictly after the previous record.
fn next_capture_time(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().timestamp_millis();
    let millis = match previous {
        Some(previous) => now.max(previous.timestamp_millis() + 1),
        None => now,
    };
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
