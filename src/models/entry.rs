//! Catalog entry data structures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One positional parameter of an entry signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Param {
    /// Parameter type label
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Parameter name
    #[serde(default)]
    pub name: String,
}

impl Param {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Description text keyed by line position.
///
/// Only the current band is kept here; changed and removed lines exist
/// inside a [`crate::models::DescriptionPatch`] only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Description {
    #[serde(rename = "add", default)]
    pub lines: BTreeMap<usize, String>,
}

impl Description {
    /// Build a description from ordered lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines
                .into_iter()
                .enumerate()
                .map(|(i, line)| (i, line.into()))
                .collect(),
        }
    }

    /// Join the current band in position order.
    pub fn text(&self) -> String {
        self.lines.values().cloned().collect::<Vec<_>>().join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One cataloged item as reconstructed from backups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Entry {
    /// Display name
    pub name: String,

    /// Return type label
    #[serde(rename = "returnType", default)]
    pub return_type: String,

    /// Parameters keyed by position
    #[serde(default)]
    pub params: BTreeMap<usize, Param>,

    /// Short fingerprint of the entry as last observed
    #[serde(rename = "hash", default)]
    pub secondary_hash: String,

    /// Description lines
    #[serde(default)]
    pub description: Description,
}

impl Entry {
    /// Combine an index stub with its fetched detail.
    ///
    /// Name, return type and params come from the index listing; the detail
    /// page contributes the fingerprint and description.
    pub fn from_parts(stub: &EntryStub, detail: EntryDetail) -> Self {
        Self {
            name: stub.name.clone(),
            return_type: stub.return_type.clone(),
            params: stub
                .params
                .iter()
                .cloned()
                .enumerate()
                .collect(),
            secondary_hash: detail.secondary_hash,
            description: Description::from_lines(detail.description_lines),
        }
    }
}

/// An entry as listed in a namespace index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryStub {
    pub id: String,
    pub name: String,
    pub return_type: String,
    pub params: Vec<Param>,
}

/// Full detail of a single entry from the source.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryDetail {
    pub name: String,
    pub namespace: String,
    pub secondary_hash: String,
    pub description_lines: Vec<String>,
}

/// Entry shape served to readers, with the description flattened to text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntryView {
    pub name: String,
    #[serde(rename = "returnType")]
    pub return_type: String,
    pub params: BTreeMap<usize, Param>,
    pub hash: String,
    pub description: String,
}

impl From<&Entry> for EntryView {
    fn from(entry: &Entry) -> Self {
        Self {
            name: entry.name.clone(),
            return_type: entry.return_type.clone(),
            params: entry.params.clone(),
            hash: entry.secondary_hash.clone(),
            description: entry.description.text(),
        }
    }
}
