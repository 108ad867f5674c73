//! Patch structures produced by diffing two entry states.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Changed fields of one parameter position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ParamPatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ParamPatch {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.name.is_none()
    }
}

/// Line-level changes to a description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DescriptionPatch {
    /// Line positions absent from the old state
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: BTreeMap<usize, String>,

    /// Existing line positions whose text changed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub change: BTreeMap<usize, String>,

    /// Old line positions dropped by a shorter new state, with their old text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rem: BTreeMap<usize, String>,
}

impl DescriptionPatch {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.change.is_empty() && self.rem.is_empty()
    }
}

/// The recorded difference between two states of one entry.
///
/// Only populated parts are present; an empty patch means "no change" and
/// is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        rename = "returnType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub return_type: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<usize, ParamPatch>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<DescriptionPatch>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.return_type.is_none()
            && self.params.is_empty()
            && self.description.as_ref().is_none_or(DescriptionPatch::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_populated_fields_serialized() {
        let patch = Patch {
            name: Some("GetXPos".into()),
            ..Patch::default()
        };
        assert_eq!(
            serde_json::to_string(&patch).unwrap(),
            r#"{"name":"GetXPos"}"#
        );
    }

    #[test]
    fn test_description_bands_serialized_by_position() {
        let patch = Patch {
            description: Some(DescriptionPatch {
                change: [(1, "new text".to_string())].into_iter().collect(),
                rem: [(2, "old text".to_string())].into_iter().collect(),
                ..DescriptionPatch::default()
            }),
            ..Patch::default()
        };

        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["description"]["change"]["1"], "new text");
        assert_eq!(json["description"]["rem"]["2"], "old text");
        assert!(json["description"].get("add").is_none());
    }

    #[test]
    fn test_empty_patch() {
        assert!(Patch::default().is_empty());
        let patch = Patch {
            description: Some(DescriptionPatch::default()),
            ..Patch::default()
        };
        assert!(patch.is_empty());
    }
}
