//! Pure catalog pipeline stages.
//!
//! - `diff`: positional diff/merge of single entries
//! - `fold`: patch sets between catalogs and replay of backup history
//! - `backoff`: retry delay policy used by the crawl orchestrator

pub mod backoff;
pub mod diff;
pub mod fold;

pub use backoff::{Backoff, BackoffConfig};
pub use diff::{diff, diff_optional, merge, merge_into};
pub use fold::{Folder, apply_patch_set, compute_patch_set, fold_contents};
