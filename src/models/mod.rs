// src/models/mod.rs

//! Domain models for the catalog archive.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod date_range;
mod entry;
mod patch;
mod snapshot;

// Re-export all public types
pub use config::{Config, DelayRange, PacingConfig, ServerConfig, ServiceConfig, SourceConfig};
pub use date_range::DateRange;
pub use entry::{Description, Entry, EntryDetail, EntryStub, EntryView, Param};
pub use patch::{DescriptionPatch, ParamPatch, Patch};
pub use snapshot::{
    Catalog, CatalogSnapshot, NamespaceMap, PatchSet, RecordContent, RecordKind, SCHEMA_VERSION,
};
