//! In-memory source used by orchestrator and service tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{EntryDetail, EntryStub, PacingConfig, Param};
use crate::services::catalog::CatalogService;
use crate::services::orchestrator::CrawlOrchestrator;
use crate::services::source::SourceClient;
use crate::storage::LocalStorage;

/// Catalog service over a scripted source with zero pacing.
pub fn scripted_service(
    source: &Arc<ScriptedSource>,
    storage_dir: &Path,
    namespaces: &[&str],
) -> CatalogService {
    let orchestrator = CrawlOrchestrator::new(
        Arc::clone(source) as Arc<dyn SourceClient>,
        namespaces.iter().map(|s| s.to_string()).collect(),
        PacingConfig::immediate(1),
    );
    CatalogService::new(
        orchestrator,
        Arc::new(LocalStorage::new(storage_dir)),
        Duration::from_millis(10),
    )
}

/// Scripted catalog source.
///
/// Namespaces that were never populated answer with a permanent error.
#[derive(Default)]
pub struct ScriptedSource {
    indexes: Mutex<HashMap<String, Vec<EntryStub>>>,
    details: Mutex<HashMap<String, EntryDetail>>,
    failing: Mutex<HashSet<String>>,
    entry_failures: Mutex<HashMap<String, usize>>,
    entry_calls: Mutex<HashMap<String, usize>>,
    entry_latency: Mutex<HashMap<String, Duration>>,
    answered: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one entry.
    pub fn put(&self, namespace: &str, id: &str, name: &str, lines: &[&str]) {
        let stub = EntryStub {
            id: id.into(),
            name: name.into(),
            return_type: "void".into(),
            params: vec![Param::new("Player", "player")],
        };
        let mut indexes = self.indexes.lock().unwrap();
        let stubs = indexes.entry(namespace.into()).or_default();
        match stubs.iter_mut().find(|s| s.id == id) {
            Some(existing) => *existing = stub,
            None => stubs.push(stub),
        }

        self.details.lock().unwrap().insert(
            id.into(),
            EntryDetail {
                name: name.into(),
                namespace: namespace.into(),
                secondary_hash: format!("H{id}"),
                description_lines: lines.iter().map(|l| l.to_string()).collect(),
            },
        );
    }

    /// Make every request for a namespace index fail.
    pub fn fail_namespace(&self, namespace: &str) {
        self.failing.lock().unwrap().insert(namespace.into());
    }

    pub fn restore_namespace(&self, namespace: &str) {
        self.failing.lock().unwrap().remove(namespace);
    }

    /// Fail the next `times` detail requests for an entry.
    pub fn fail_entry(&self, id: &str, times: usize) {
        self.entry_failures.lock().unwrap().insert(id.into(), times);
    }

    pub fn entry_calls(&self, id: &str) -> usize {
        self.entry_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    /// Delay every detail answer for an entry by `latency`.
    pub fn slow_entry(&self, id: &str, latency: Duration) {
        self.entry_latency.lock().unwrap().insert(id.into(), latency);
    }

    /// Ids of answered detail requests, in the order the answers went out.
    pub fn answer_order(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    async fn fetch_namespace_index(&self, namespace: &str) -> Result<Vec<EntryStub>> {
        if self.failing.lock().unwrap().contains(namespace) {
            return Err(AppError::remote(namespace, "HTTP 503", true));
        }
        self.indexes
            .lock()
            .unwrap()
            .get(namespace)
            .cloned()
            .ok_or_else(|| AppError::remote(namespace, "unknown namespace", false))
    }

    async fn fetch_entry_detail(&self, id: &str) -> Result<EntryDetail> {
        *self.entry_calls.lock().unwrap().entry(id.into()).or_default() += 1;

        let latency = self.entry_latency.lock().unwrap().get(id).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.answered.lock().unwrap().push(id.into());

        if let Some(remaining) = self.entry_failures.lock().unwrap().get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::remote(id, "connection reset", true));
            }
        }
        self.details
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::remote(id, "unknown entry", false))
    }
}
