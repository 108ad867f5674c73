// src/services/orchestrator.rs

//! Crawl orchestration.
//!
//! A crawl first downloads every namespace index one after another, then
//! fetches entry details namespace by namespace. Entry requests within a
//! namespace start on staggered timers and complete in any order; entries
//! that fail get one more attempt in a slower second pass.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::models::{Catalog, DelayRange, Entry, EntryStub, NamespaceMap, PacingConfig};
use crate::pipeline::{Backoff, BackoffConfig};
use crate::services::source::SourceClient;
use crate::utils::{random_delay, staggered_delay};

/// Progress of the current crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    FetchingNamespaces,
    FetchingEntries,
    Done,
    Failed,
}

/// Result of a successful crawl.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub catalog: Catalog,
    pub namespace_total: usize,
    pub namespace_failures: usize,
    pub entry_total: usize,
    pub entries_retried: usize,
    pub entries_dropped: usize,
}

/// Drives a [`SourceClient`] across the whole catalog.
pub struct CrawlOrchestrator {
    source: Arc<dyn SourceClient>,
    namespaces: Vec<String>,
    pacing: PacingConfig,
    phase: watch::Sender<CrawlPhase>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl CrawlOrchestrator {
    pub fn new(source: Arc<dyn SourceClient>, namespaces: Vec<String>, pacing: PacingConfig) -> Self {
        let (phase, _) = watch::channel(CrawlPhase::Idle);
        Self {
            source,
            namespaces,
            pacing,
            phase,
            shutdown: None,
        }
    }

    /// Abort waits as soon as `shutdown` turns true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn phase(&self) -> CrawlPhase {
        *self.phase.borrow()
    }

    /// Run one complete crawl.
    ///
    /// Fails with [`AppError::NoData`] when no namespace index could be
    /// downloaded, and with [`AppError::Cancelled`] on shutdown.
    pub async fn crawl(&self) -> Result<CrawlOutcome> {
        let started = Instant::now();
        log::info!("Crawl started ({} namespaces)", self.namespaces.len());

        let result = self.run().await;
        match &result {
            Ok(outcome) => {
                self.phase.send_replace(CrawlPhase::Done);
                log::info!(
                    "Crawl finished in {:.1?}: {}/{} namespaces, {} entries ({} retried, {} dropped)",
                    started.elapsed(),
                    outcome.namespace_total - outcome.namespace_failures,
                    outcome.namespace_total,
                    outcome.catalog.item_count(),
                    outcome.entries_retried,
                    outcome.entries_dropped,
                );
            }
            Err(e) => {
                self.phase.send_replace(CrawlPhase::Failed);
                log::error!("Crawl failed after {:.1?}: {}", started.elapsed(), e);
            }
        }
        result
    }

    async fn run(&self) -> Result<CrawlOutcome> {
        self.phase.send_replace(CrawlPhase::FetchingNamespaces);

        let mut outcome = CrawlOutcome {
            namespace_total: self.namespaces.len(),
            ..CrawlOutcome::default()
        };

        let mut indexes = Vec::new();
        for (position, namespace) in self.namespaces.iter().enumerate() {
            if position > 0 {
                self.pause(random_delay(self.pacing.namespace_delay)).await?;
            }
            log::info!("Fetching namespace {namespace}");

            match self
                .with_backoff(namespace, || self.source.fetch_namespace_index(namespace))
                .await
            {
                Ok(stubs) => indexes.push((namespace.clone(), stubs)),
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    outcome.namespace_failures += 1;
                    log::error!("Giving up on namespace {namespace}: {e}");
                }
            }
        }

        if indexes.is_empty() {
            return Err(AppError::NoData);
        }

        self.phase.send_replace(CrawlPhase::FetchingEntries);
        for (namespace, stubs) in indexes {
            let entries = self.fetch_entries(&namespace, stubs, &mut outcome).await?;
            outcome.catalog.namespaces.insert(namespace, entries);
        }

        Ok(outcome)
    }

    /// Fetch every entry of one namespace, with a second pass for failures.
    async fn fetch_entries(
        &self,
        namespace: &str,
        stubs: Vec<EntryStub>,
        outcome: &mut CrawlOutcome,
    ) -> Result<NamespaceMap<Entry>> {
        outcome.entry_total += stubs.len();
        let mut entries = NamespaceMap::new();

        let failed = self
            .fetch_pass(&stubs, self.pacing.entry_delay, &mut entries)
            .await?;
        if failed.is_empty() {
            return Ok(entries);
        }

        log::warn!("{namespace}: {} entries failed, retrying", failed.len());
        outcome.entries_retried += failed.len();
        let remaining: Vec<EntryStub> = failed.into_iter().map(|(stub, _)| stub).collect();

        let dropped = self
            .fetch_pass(&remaining, self.pacing.remaining_delay, &mut entries)
            .await?;
        for (stub, error) in &dropped {
            log::warn!("Dropping entry {namespace}/{}: {error}", stub.id);
        }
        outcome.entries_dropped += dropped.len();

        Ok(entries)
    }

    /// One staggered pass over `stubs`. Returns the stubs that failed.
    async fn fetch_pass(
        &self,
        stubs: &[EntryStub],
        delay: DelayRange,
        entries: &mut NamespaceMap<Entry>,
    ) -> Result<Vec<(EntryStub, AppError)>> {
        let mut pending: FuturesUnordered<_> = stubs
            .iter()
            .enumerate()
            .map(|(position, stub)| {
                let wait = staggered_delay(delay, position);
                async move {
                    let result = async {
                        self.pause(wait).await?;
                        log::debug!("Fetching entry {}", stub.id);
                        self.with_backoff(&stub.id, || self.source.fetch_entry_detail(&stub.id))
                            .await
                    }
                    .await;
                    (stub, result)
                }
            })
            .collect();

        let mut failed = Vec::new();
        while let Some((stub, result)) = pending.next().await {
            match result {
                Ok(detail) => {
                    entries.insert(stub.id.clone(), Entry::from_parts(stub, detail));
                }
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => failed.push((stub.clone(), e)),
            }
        }
        Ok(failed)
    }

    /// Retry `request` under the configured backoff policy.
    async fn with_backoff<T, F, Fut>(&self, context: &str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = Backoff::new(BackoffConfig::from(&self.pacing));
        loop {
            let error = match request().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            let Some(delay) = backoff.next_delay() else {
                return Err(error);
            };
            log::debug!(
                "{context}: {error} (transient: {}); retry {} in {delay:?}",
                error.is_transient(),
                backoff.attempts()
            );
            self.pause(delay).await?;
        }
    }

    /// Sleep for `delay`, returning early with `Cancelled` on shutdown.
    async fn pause(&self, delay: Duration) -> Result<()> {
        let Some(shutdown) = &self.shutdown else {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            return Ok(());
        };

        if *shutdown.borrow() {
            return Err(AppError::Cancelled);
        }
        if delay.is_zero() {
            return Ok(());
        }

        let mut shutdown = shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            Ok(_) = shutdown.wait_for(|stop| *stop) => Err(AppError::Cancelled),
        }
    }
}
