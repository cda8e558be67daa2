use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::SnapshotError;

/// Root key under which the thumbnail side-table travels inside a persisted
/// template config.
pub const THUMBNAILS_KEY: &str = "mediaThumbnails";

/// Full site configuration tree at one instant.
///
/// Cloning a snapshot deep-copies the tree, so history entries, the live
/// state and server payloads never alias each other.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    tree: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    thumbnails: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn new(tree: Value) -> Self {
        Self {
            tree,
            thumbnails: BTreeMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_template_config(value))
    }

    /// Builds a snapshot from a server-side template config, lifting the
    /// thumbnail side-table out of the tree.
    pub fn from_template_config(mut value: Value) -> Self {
        let mut thumbnails = BTreeMap::new();
        if let Value::Object(root) = &mut value {
            if let Some(Value::Object(table)) = root.remove(THUMBNAILS_KEY) {
                for (full, thumb) in table {
                    if let Value::String(thumb) = thumb {
                        thumbnails.insert(full, thumb);
                    }
                }
            }
        }
        Self {
            tree: value,
            thumbnails,
        }
    }

    /// The tree as the server stores it, with the side-table embedded.
    pub fn to_template_config(&self) -> Value {
        let mut value = self.tree.clone();
        if self.thumbnails.is_empty() {
            return value;
        }
        if let Value::Object(root) = &mut value {
            let table: Map<String, Value> = self
                .thumbnails
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            root.insert(THUMBNAILS_KEY.to_string(), Value::Object(table));
        }
        value
    }

    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn into_tree(self) -> Value {
        self.tree
    }

    pub fn thumbnails(&self) -> &BTreeMap<String, String> {
        &self.thumbnails
    }

    pub fn thumbnail_for(&self, url: &str) -> Option<&str> {
        self.thumbnails.get(url).map(String::as_str)
    }

    /// Returns a copy with `tree` replaced and the side-table kept.
    pub fn with_tree(&self, tree: Value) -> Self {
        Self {
            tree,
            thumbnails: self.thumbnails.clone(),
        }
    }

    pub fn merge_thumbnails<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.thumbnails.extend(entries);
    }

    pub fn ensure_object(&self) -> Result<(), SnapshotError> {
        match &self.tree {
            Value::Object(_) => Ok(()),
            Value::Null => Err(SnapshotError::NotAnObject("null")),
            Value::Bool(_) => Err(SnapshotError::NotAnObject("bool")),
            Value::Number(_) => Err(SnapshotError::NotAnObject("number")),
            Value::String(_) => Err(SnapshotError::NotAnObject("string")),
            Value::Array(_) => Err(SnapshotError::NotAnObject("array")),
        }
    }
}

impl From<Value> for Snapshot {
    fn from(tree: Value) -> Self {
        Self::new(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_config_carries_thumbnails() {
        let mut snap = Snapshot::new(json!({ "pages": [] }));
        snap.merge_thumbnails([(
            "https://cdn/a.png".to_string(),
            "https://cdn/a_thumb.png".to_string(),
        )]);

        let wire = snap.to_template_config();
        assert_eq!(
            wire[THUMBNAILS_KEY]["https://cdn/a.png"],
            json!("https://cdn/a_thumb.png")
        );

        let back = Snapshot::from_template_config(wire);
        assert_eq!(back, snap);
        assert!(back.tree().get(THUMBNAILS_KEY).is_none());
    }

    #[test]
    fn test_clone_does_not_alias() {
        let original = Snapshot::new(json!({ "title": "Home" }));
        let mut copy = original.clone();
        copy = copy.with_tree(json!({ "title": "About" }));
        assert_eq!(original.tree()["title"], json!("Home"));
        assert_eq!(copy.tree()["title"], json!("About"));
    }

    #[test]
    fn test_ensure_object() {
        assert!(Snapshot::empty().ensure_object().is_ok());
        assert!(Snapshot::new(json!([1, 2])).ensure_object().is_err());
        assert!(Snapshot::from_json_str("not json").is_err());
    }
}
