//! Whole-catalog snapshots and backup record content.
//!
//! A snapshot maps namespace → entry id → item. On disk it is a single JSON
//! object whose keys are namespace names, plus the key `"V"` holding the
//! schema version. Namespaces keep the order they were crawled in.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::models::{Entry, Patch};

/// Schema version written into every record.
pub const SCHEMA_VERSION: &str = "1.0";

/// Reserved key carrying the schema version.
const VERSION_KEY: &str = "V";

/// Entries of one namespace keyed by id.
pub type NamespaceMap<T> = BTreeMap<String, T>;

/// Namespace → id → item, tagged with a schema version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot<T> {
    pub version: String,
    /// Insertion ordered: crawl order in memory, file order when decoded
    pub namespaces: IndexMap<String, NamespaceMap<T>>,
}

/// A fully reconstructed catalog.
pub type Catalog = CatalogSnapshot<Entry>;

/// Per-entry patches of one capture.
pub type PatchSet = CatalogSnapshot<Patch>;

impl<T> CatalogSnapshot<T> {
    pub fn new() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            namespaces: IndexMap::new(),
        }
    }

    /// Insert one item, creating its namespace on demand.
    pub fn insert(&mut self, namespace: impl Into<String>, id: impl Into<String>, item: T) {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .insert(id.into(), item);
    }

    /// Look up an item by namespace and exact id.
    pub fn get(&self, namespace: &str, id: &str) -> Option<&T> {
        self.namespaces.get(namespace).and_then(|ns| ns.get(id))
    }

    /// Total number of items across namespaces.
    pub fn item_count(&self) -> usize {
        self.namespaces.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.values().all(BTreeMap::is_empty)
    }
}

impl<T> Default for CatalogSnapshot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> Serialize for CatalogSnapshot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.namespaces.len() + 1))?;
        for (name, entries) in &self.namespaces {
            map.serialize_entry(name, entries)?;
        }
        map.serialize_entry(VERSION_KEY, &self.version)?;
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CatalogSnapshot<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SnapshotVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for SnapshotVisitor<T> {
            type Value = CatalogSnapshot<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of namespaces with a version key")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut snapshot = CatalogSnapshot {
                    version: String::new(),
                    namespaces: IndexMap::new(),
                };
                while let Some(key) = access.next_key::<String>()? {
                    if key == VERSION_KEY {
                        snapshot.version = access.next_value()?;
                    } else {
                        let entries: NamespaceMap<T> = access.next_value()?;
                        snapshot.namespaces.insert(key, entries);
                    }
                }
                if snapshot.version.is_empty() {
                    snapshot.version = SCHEMA_VERSION.to_string();
                }
                Ok(snapshot)
            }
        }

        deserializer.deserialize_map(SnapshotVisitor(PhantomData))
    }
}

/// Whether a record holds a full base capture or per-entry patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Full,
    Patches,
}

/// Decoded content of one backup record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordContent {
    Full(Catalog),
    Patches(PatchSet),
}

impl RecordContent {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Full(_) => RecordKind::Full,
            Self::Patches(_) => RecordKind::Patches,
        }
    }

    /// Decode record bytes of a known kind.
    pub fn from_slice(kind: RecordKind, bytes: &[u8]) -> Result<Self> {
        fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<CatalogSnapshot<T>> {
            Ok(serde_json::from_slice(bytes)?)
        }

        Ok(match kind {
            RecordKind::Full => Self::Full(decode(bytes)?),
            RecordKind::Patches => Self::Patches(decode(bytes)?),
        })
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Namespace names present in this record.
    pub fn namespace_names(&self) -> Vec<&str> {
        match self {
            Self::Full(catalog) => catalog.namespaces.keys().map(String::as_str).collect(),
            Self::Patches(patches) => patches.namespaces.keys().map(String::as_str).collect(),
        }
    }
}

impl Serialize for RecordContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Full(catalog) => catalog.serialize(serializer),
            Self::Patches(patches) => patches.serialize(serializer),
        }
    }
}
