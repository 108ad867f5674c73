//! Entry diff and merge.
//!
//! Computes the positional difference between two observed states of one
//! entry, and folds such a patch back into a base state.
//!
//! Parameters and description lines are compared by position, not by
//! content alignment. Inserting a parameter at the front is recorded as a
//! change at every following position, and params beyond the shorter list
//! are never compared. Persisted records depend on this exact behavior.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Description, DescriptionPatch, Entry, Param, ParamPatch, Patch};

/// Compute the patch turning `old` into `new`, or `None` if nothing changed.
pub fn diff(old: &Entry, new: &Entry) -> Option<Patch> {
    let patch = Patch {
        name: (old.name != new.name).then(|| new.name.clone()),
        return_type: (old.return_type != new.return_type).then(|| new.return_type.clone()),
        params: diff_params(&old.params, &new.params),
        description: diff_description(&old.description, &new.description),
    };

    if patch.is_empty() { None } else { Some(patch) }
}

/// Diff two optional states; absence on either side means no patch.
pub fn diff_optional(old: Option<&Entry>, new: Option<&Entry>) -> Option<Patch> {
    match (old, new) {
        (Some(old), Some(new)) => diff(old, new),
        _ => None,
    }
}

fn diff_params(
    old: &BTreeMap<usize, Param>,
    new: &BTreeMap<usize, Param>,
) -> BTreeMap<usize, ParamPatch> {
    let shared = old.len().min(new.len());
    let mut changed = BTreeMap::new();

    for pos in 0..shared {
        let (Some(a), Some(b)) = (old.get(&pos), new.get(&pos)) else {
            continue;
        };
        let param = ParamPatch {
            kind: (a.kind != b.kind).then(|| b.kind.clone()),
            name: (a.name != b.name).then(|| b.name.clone()),
        };
        if !param.is_empty() {
            changed.insert(pos, param);
        }
    }

    changed
}

fn diff_description(old: &Description, new: &Description) -> Option<DescriptionPatch> {
    let equal: BTreeSet<usize> = old
        .lines
        .iter()
        .filter(|(pos, text)| new.lines.get(pos) == Some(text))
        .map(|(pos, _)| *pos)
        .collect();

    let mut patch = DescriptionPatch::default();

    for (pos, text) in &new.lines {
        if equal.contains(pos) {
            continue;
        }
        if old.lines.contains_key(pos) {
            patch.change.insert(*pos, text.clone());
        } else {
            patch.add.insert(*pos, text.clone());
        }
    }

    // Removals are only reported when the description got shorter.
    if old.len() > new.len() {
        for (pos, text) in &old.lines {
            if !equal.contains(pos) && !new.lines.contains_key(pos) {
                patch.rem.insert(*pos, text.clone());
            }
        }
    }

    if patch.is_empty() { None } else { Some(patch) }
}

/// Apply a patch to `base` in place.
pub fn merge_into(base: &mut Entry, patch: &Patch) {
    if let Some(name) = &patch.name {
        base.name = name.clone();
    }
    if let Some(return_type) = &patch.return_type {
        base.return_type = return_type.clone();
    }

    for (pos, changed) in &patch.params {
        let param = base.params.entry(*pos).or_default();
        if let Some(name) = &changed.name {
            param.name = name.clone();
        }
        if let Some(kind) = &changed.kind {
            param.kind = kind.clone();
        }
    }

    if let Some(description) = &patch.description {
        merge_description(&mut base.description, description);
    }
}

/// Apply a patch to an owned base and return it.
pub fn merge(mut base: Entry, patch: &Patch) -> Entry {
    merge_into(&mut base, patch);
    base
}

fn merge_description(base: &mut Description, patch: &DescriptionPatch) {
    // Never let a removal erase every current line.
    if !patch.rem.is_empty() && patch.rem.len() != base.len() {
        for pos in patch.rem.keys() {
            base.lines.remove(pos);
        }
    }

    for (pos, text) in &patch.add {
        base.lines.insert(*pos, text.clone());
    }

    for (pos, text) in &patch.change {
        base.lines.insert(*pos, text.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(name: &str, params: &[(&str, &str)], lines: &[&str]) -> Entry {
        Entry {
            name: name.to_string(),
            return_type: "void".to_string(),
            params: params
                .iter()
                .enumerate()
                .map(|(i, (kind, name))| (i, Param::new(*kind, *name)))
                .collect(),
            secondary_hash: "6EF43BBB".to_string(),
            description: Description::from_lines(lines.iter().copied()),
        }
    }

    fn assert_round_trip(old: &Entry, new: &Entry) {
        let patch = diff(old, new).expect("states differ");
        let merged = merge(old.clone(), &patch);
        assert_eq!(merged.name, new.name);
        assert_eq!(merged.return_type, new.return_type);
        assert_eq!(merged.description, new.description);
    }

    #[test]
    fn test_identical_entries_have_no_diff() {
        let entry = make_entry("GET_PLAYER_PED", &[("Player", "player")], &["a", "b"]);
        assert!(diff(&entry, &entry.clone()).is_none());
        assert!(diff(&Entry::default(), &Entry::default()).is_none());
    }

    #[test]
    fn test_absent_side_has_no_diff() {
        let entry = make_entry("X", &[], &[]);
        assert!(diff_optional(None, Some(&entry)).is_none());
        assert!(diff_optional(Some(&entry), None).is_none());
    }

    #[test]
    fn test_name_and_return_type() {
        let old = make_entry("GetX", &[], &["doc"]);
        let mut new = make_entry("GetXPos", &[], &["doc"]);
        new.return_type = "float".into();

        let patch = diff(&old, &new).unwrap();
        assert_eq!(patch.name.as_deref(), Some("GetXPos"));
        assert_eq!(patch.return_type.as_deref(), Some("float"));
        assert!(patch.params.is_empty());
        assert!(patch.description.is_none());
        assert_round_trip(&old, &new);
    }

    #[test]
    fn test_param_changes_only_named_fields() {
        let old = make_entry("F", &[("int", "a"), ("int", "b")], &[]);
        let new = make_entry("F", &[("int", "a"), ("float", "b")], &[]);

        let patch = diff(&old, &new).unwrap();
        assert_eq!(patch.params.len(), 1);
        assert_eq!(patch.params[&1].kind.as_deref(), Some("float"));
        assert!(patch.params[&1].name.is_none());

        let merged = merge(old, &patch);
        assert_eq!(merged.params, new.params);
    }

    #[test]
    fn test_param_insert_at_front_is_positional() {
        let old = make_entry("F", &[("int", "a"), ("int", "b")], &[]);
        let new = make_entry("F", &[("Ped", "ped"), ("int", "a"), ("int", "b")], &[]);

        let patch = diff(&old, &new).unwrap();
        // Both shared positions changed; the new tail position is not compared.
        assert_eq!(patch.params.len(), 2);
        assert_eq!(patch.params[&0].name.as_deref(), Some("ped"));
        assert_eq!(patch.params[&1].name.as_deref(), Some("a"));
        assert!(!patch.params.contains_key(&2));
    }

    #[test]
    fn test_param_tail_growth_is_invisible() {
        let old = make_entry("F", &[("int", "a")], &[]);
        let new = make_entry("F", &[("int", "a"), ("int", "b")], &[]);
        assert!(diff(&old, &new).is_none());
    }

    #[test]
    fn test_description_add_change_rem() {
        let old = make_entry("F", &[], &["keep", "old", "drop"]);
        let new = make_entry("F", &[], &["keep", "new"]);

        let patch = diff(&old, &new).unwrap();
        let desc = patch.description.as_ref().unwrap();
        assert!(desc.add.is_empty());
        assert_eq!(desc.change[&1], "new");
        assert_eq!(desc.rem[&2], "drop");
        assert_round_trip(&old, &new);
    }

    #[test]
    fn test_description_growth_adds_lines() {
        let old = make_entry("F", &[], &["one"]);
        let new = make_entry("F", &[], &["one", "two", "three"]);

        let patch = diff(&old, &new).unwrap();
        let desc = patch.description.as_ref().unwrap();
        assert_eq!(desc.add.len(), 2);
        assert_eq!(desc.add[&2], "three");
        assert_round_trip(&old, &new);
    }

    #[test]
    fn test_same_length_rewrite_reports_no_removals() {
        let old = make_entry("F", &[], &["a", "b"]);
        let new = make_entry("F", &[], &["c", "d"]);

        let patch = diff(&old, &new).unwrap();
        let desc = patch.description.as_ref().unwrap();
        assert!(desc.rem.is_empty());
        assert_eq!(desc.change.len(), 2);
        assert_round_trip(&old, &new);
    }

    #[test]
    fn test_merge_never_erases_whole_description() {
        let base = make_entry("F", &[], &["a", "b"]);
        let patch = Patch {
            description: Some(DescriptionPatch {
                rem: [(0, "a".to_string()), (1, "b".to_string())]
                    .into_iter()
                    .collect(),
                ..DescriptionPatch::default()
            }),
            ..Patch::default()
        };

        let merged = merge(base.clone(), &patch);
        assert_eq!(merged.description, base.description);
    }

    #[test]
    fn test_shrinking_to_single_line() {
        let old = make_entry("F", &[], &["a", "b", "c"]);
        let new = make_entry("F", &[], &["a"]);
        assert_round_trip(&old, &new);
    }

    #[test]
    fn test_merge_keeps_fingerprint() {
        let old = make_entry("F", &[], &["a"]);
        let mut new = make_entry("G", &[], &["a"]);
        new.secondary_hash = "DEADBEEF".into();

        let merged = merge(old.clone(), &diff(&old, &new).unwrap());
        assert_eq!(merged.secondary_hash, old.secondary_hash);
    }
}
