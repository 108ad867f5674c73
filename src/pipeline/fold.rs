//! Folding backup records into the latest catalog.
//!
//! The first record of a history is a full capture; every later record
//! holds per-entry patches. Replaying them oldest to newest reconstructs
//! the latest known state, so record order is part of correctness.

use crate::error::{AppError, Result};
use crate::models::{Catalog, PatchSet, RecordContent};

use super::diff::{diff_optional, merge_into};

/// Per-entry patches between `latest` and a freshly crawled catalog.
///
/// Namespaces or entries missing from `latest` have no prior state and are
/// skipped, so they never enter the patch set.
pub fn compute_patch_set(latest: &Catalog, fresh: &Catalog) -> PatchSet {
    let mut patches = PatchSet::new();

    for (namespace, entries) in &fresh.namespaces {
        let Some(previous) = latest.namespaces.get(namespace) else {
            continue;
        };
        for (id, entry) in entries {
            if let Some(patch) = diff_optional(previous.get(id), Some(entry)) {
                patches.insert(namespace.clone(), id.clone(), patch);
            }
        }
    }

    patches
}

/// Merge a patch set into `latest` in place.
///
/// Returns the number of patches applied. Patches for unknown entries are
/// logged and skipped.
pub fn apply_patch_set(latest: &mut Catalog, patches: &PatchSet) -> usize {
    let mut applied = 0;

    for (namespace, entries) in &patches.namespaces {
        for (id, patch) in entries {
            match latest
                .namespaces
                .get_mut(namespace)
                .and_then(|ns| ns.get_mut(id))
            {
                Some(base) => {
                    merge_into(base, patch);
                    applied += 1;
                }
                None => log::warn!("Patch for unknown entry {namespace}/{id} skipped"),
            }
        }
    }

    applied
}

/// Incremental fold state: a base capture followed by patch sets.
#[derive(Debug, Default)]
pub struct Folder {
    latest: Option<Catalog>,
}

impl Folder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one more record.
    ///
    /// The first record must be a full capture; a full capture later in the
    /// sequence is rejected since it would discard the history before it.
    pub fn push(&mut self, content: &RecordContent) -> Result<()> {
        match content {
            RecordContent::Full(catalog) => {
                if self.latest.is_some() {
                    return Err(AppError::storage(
                        "full capture found after the first backup record",
                    ));
                }
                self.latest = Some(catalog.clone());
            }
            RecordContent::Patches(patches) => {
                let Some(latest) = self.latest.as_mut() else {
                    return Err(AppError::storage(
                        "backup history does not start with a full capture",
                    ));
                };
                apply_patch_set(latest, patches);
            }
        }
        Ok(())
    }

    pub fn latest(&self) -> Option<&Catalog> {
        self.latest.as_ref()
    }

    pub fn finish(self) -> Option<Catalog> {
        self.latest
    }
}

/// Fold an ordered sequence of record contents from scratch.
pub fn fold_contents<'a, I>(contents: I) -> Result<Option<Catalog>>
where
    I: IntoIterator<Item = &'a RecordContent>,
{
    let mut folder = Folder::new();
    for content in contents {
        folder.push(content)?;
    }
    Ok(folder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Description, Entry, Param};

    fn entry(name: &str, lines: &[&str]) -> Entry {
        Entry {
            name: name.into(),
            return_type: "float".into(),
            params: [(0, Param::new("Player", "player"))].into_iter().collect(),
            secondary_hash: "AB12".into(),
            description: Description::from_lines(lines.iter().copied()),
        }
    }

    fn catalog(items: &[(&str, &str, Entry)]) -> Catalog {
        let mut catalog = Catalog::new();
        for (ns, id, e) in items {
            catalog.insert(*ns, *id, e.clone());
        }
        catalog
    }

    #[test]
    fn test_patch_set_records_only_changes() {
        let latest = catalog(&[
            ("PLAYER", "P1", entry("GetX", &["a"])),
            ("PLAYER", "P2", entry("Same", &["b"])),
        ]);
        let fresh = catalog(&[
            ("PLAYER", "P1", entry("GetXPos", &["a"])),
            ("PLAYER", "P2", entry("Same", &["b"])),
        ]);

        let patches = compute_patch_set(&latest, &fresh);
        assert_eq!(patches.item_count(), 1);
        assert_eq!(
            patches.get("PLAYER", "P1").unwrap().name.as_deref(),
            Some("GetXPos")
        );
    }

    #[test]
    fn test_new_entries_and_namespaces_are_skipped() {
        let latest = catalog(&[("PLAYER", "P1", entry("GetX", &[]))]);
        let fresh = catalog(&[
            ("PLAYER", "P1", entry("GetX", &[])),
            ("PLAYER", "P9", entry("Brand new", &[])),
            ("AUDIO", "A1", entry("PlaySound", &[])),
        ]);

        let patches = compute_patch_set(&latest, &fresh);
        assert!(patches.is_empty());
    }

    #[test]
    fn test_apply_skips_unknown_entries() {
        let mut latest = catalog(&[("PLAYER", "P1", entry("GetX", &[]))]);
        let fresh = catalog(&[("PLAYER", "P1", entry("GetXPos", &[]))]);
        let mut patches = compute_patch_set(&latest, &fresh);
        patches.insert("PLAYER", "GHOST", Default::default());

        assert_eq!(apply_patch_set(&mut latest, &patches), 1);
        assert_eq!(latest.get("PLAYER", "P1").unwrap().name, "GetXPos");
        assert!(latest.get("PLAYER", "GHOST").is_none());
    }

    #[test]
    fn test_incremental_fold_matches_full_replay() {
        let states = [
            catalog(&[
                ("PLAYER", "P1", entry("GetX", &["one", "two", "three"])),
                ("AUDIO", "A1", entry("Play", &["x"])),
            ]),
            catalog(&[
                ("PLAYER", "P1", entry("GetXPos", &["one", "2"])),
                ("AUDIO", "A1", entry("Play", &["x", "y"])),
            ]),
            catalog(&[
                ("PLAYER", "P1", entry("GetXPos", &["uno"])),
                ("AUDIO", "A1", entry("PlaySound", &["x", "y"])),
            ]),
        ];

        // Incremental: diff against the running latest after every capture.
        let mut records = vec![RecordContent::Full(states[0].clone())];
        let mut latest = states[0].clone();
        for fresh in &states[1..] {
            let patches = compute_patch_set(&latest, fresh);
            apply_patch_set(&mut latest, &patches);
            records.push(RecordContent::Patches(patches));
        }

        let replayed = fold_contents(&records).unwrap().unwrap();
        assert_eq!(replayed, latest);
        assert_eq!(replayed, states[2]);
    }

    #[test]
    fn test_fold_requires_full_base() {
        let records = vec![RecordContent::Patches(PatchSet::new())];
        assert!(fold_contents(&records).is_err());
    }

    #[test]
    fn test_fold_rejects_second_full_capture() {
        let base = catalog(&[("PLAYER", "P1", entry("GetX", &[]))]);
        let records = vec![
            RecordContent::Full(base.clone()),
            RecordContent::Full(base),
        ];
        assert!(fold_contents(&records).is_err());
    }

    #[test]
    fn test_fold_empty_history() {
        let records: Vec<RecordContent> = Vec::new();
        assert!(fold_contents(&records).unwrap().is_none());
    }
}
