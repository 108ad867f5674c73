//! Service layer for the catalog archive.
//!
//! This module contains the business logic for:
//! - Talking to the catalog source (`SourceClient`, `HttpSourceClient`)
//! - Driving one complete crawl (`CrawlOrchestrator`)
//! - Owning the latest catalog and its backup history (`CatalogService`)

pub mod catalog;
pub mod orchestrator;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{CatalogService, HistoryItem, SearchResults, Startup};
pub use orchestrator::{CrawlOrchestrator, CrawlOutcome, CrawlPhase};
pub use source::{HttpSourceClient, SourceClient};
