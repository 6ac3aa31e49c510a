//! Structural diff of schema documents.
//!
//! Two JSON documents are walked over the union of their keys. Every leaf
//! that differs is recorded under its dotted path with its old and new
//! value. Arrays are compared like objects keyed by position, so moving an
//! element shows up as a run of per-index changes rather than a move.
//!
//! Keys listed in [`IgnoreKeys`] (coordinates, colors, viewport state) are
//! skipped together with everything below them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::schema::Schema;

/// Old and new value at one path. `None` means the key is absent on that
/// side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Value in the older document.
    pub from: Option<Value>,
    /// Value in the newer document.
    pub to: Option<Value>,
}

/// Changed paths, sorted.
pub type ChangeMap = BTreeMap<String, Change>;

/// Keys excluded from diffing.
///
/// An entry matches either a key name at any depth (`"color"`) or one exact
/// dotted path (`"tables.0.comment"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreKeys {
    keys: BTreeSet<String>,
}

/// Presentation-only keys of the editor's document.
const PRESENTATION_KEYS: &[&str] = &[
    "x",
    "y",
    "color",
    "title",
    "transform",
    "pan",
    "zoom",
    "width",
    "height",
    "locked",
    "notes",
    "subjectAreas",
];

impl IgnoreKeys {
    /// Ignores nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignores the editor's presentation-only keys.
    #[must_use]
    pub fn presentation() -> Self {
        PRESENTATION_KEYS.iter().copied().collect()
    }

    /// Adds a key name or dotted path.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>) -> Self {
        self.keys.insert(key.into());
        self
    }

    /// Returns true if the key at `path` is ignored.
    #[must_use]
    pub fn matches(&self, key: &str, path: &str) -> bool {
        self.keys.contains(key) || self.keys.contains(path)
    }

    /// Iterates over the configured entries.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Returns true if nothing is ignored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreKeys {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for IgnoreKeys {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.keys.extend(iter.into_iter().map(Into::into));
    }
}

/// Compares two documents.
#[must_use]
pub fn diff(older: &Value, newer: &Value, ignore: &IgnoreKeys) -> ChangeMap {
    let mut changes = ChangeMap::new();
    walk("", Some(older), Some(newer), ignore, &mut changes);
    changes
}

/// Compares two schema snapshots through their serialized form.
///
/// # Errors
///
/// Returns [`crate::error::SchemaError::Serialization`] if a snapshot cannot
/// be serialized.
pub fn diff_schemas(older: &Schema, newer: &Schema, ignore: &IgnoreKeys) -> Result<ChangeMap> {
    let older = serde_json::to_value(older)?;
    let newer = serde_json::to_value(newer)?;
    Ok(diff(&older, &newer, ignore))
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn walk(
    path: &str,
    older: Option<&Value>,
    newer: Option<&Value>,
    ignore: &IgnoreKeys,
    changes: &mut ChangeMap,
) {
    match (older, newer) {
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                let child = join(path, key);
                if !ignore.matches(key, &child) {
                    walk(&child, a.get(key), b.get(key), ignore, changes);
                }
            }
        }
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            for i in 0..a.len().max(b.len()) {
                let key = i.to_string();
                let child = join(path, &key);
                if !ignore.matches(&key, &child) {
                    walk(&child, a.get(i), b.get(i), ignore, changes);
                }
            }
        }
        (a, b) if a == b => {}
        (a, b) => {
            changes.insert(
                path.to_string(),
                Change {
                    from: a.cloned(),
                    to: b.cloned(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_documents_have_no_changes() {
        let doc = json!({ "tables": [{ "id": 0, "name": "a", "fields": [] }] });
        assert!(diff(&doc, &doc, &IgnoreKeys::new()).is_empty());
    }

    #[test]
    fn test_leaf_change_is_keyed_by_dotted_path() {
        let older = json!({ "tables": [{ "name": "a", "fields": [{ "type": "INT" }] }] });
        let newer = json!({ "tables": [{ "name": "a", "fields": [{ "type": "BIGINT" }] }] });
        let changes = diff(&older, &newer, &IgnoreKeys::new());
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes["tables.0.fields.0.type"],
            Change {
                from: Some(json!("INT")),
                to: Some(json!("BIGINT")),
            }
        );
    }

    #[test]
    fn test_added_and_removed_keys() {
        let older = json!({ "a": 1 });
        let newer = json!({ "b": { "c": 2 } });
        let changes = diff(&older, &newer, &IgnoreKeys::new());
        assert_eq!(changes["a"].to, None);
        assert_eq!(changes["b"].from, None);
        assert_eq!(changes["b"].to, Some(json!({ "c": 2 })));
    }

    #[test]
    fn test_reorder_is_reported_per_index() {
        let older = json!({ "v": ["a", "b"] });
        let newer = json!({ "v": ["b", "a"] });
        let changes = diff(&older, &newer, &IgnoreKeys::new());
        let paths: Vec<&str> = changes.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["v.0", "v.1"]);
    }

    #[test]
    fn test_presentation_keys_are_ignored_at_any_depth() {
        let older = json!({ "title": "A", "tables": [{ "name": "t", "x": 1, "y": 2, "color": "#fff" }] });
        let newer = json!({ "title": "B", "tables": [{ "name": "t", "x": 9, "y": 8, "color": "#000" }] });
        assert!(diff(&older, &newer, &IgnoreKeys::presentation()).is_empty());
        assert_eq!(diff(&older, &newer, &IgnoreKeys::new()).len(), 4);
    }

    #[test]
    fn test_exact_path_ignore() {
        let older = json!({ "tables": [{ "comment": "a" }, { "comment": "a" }] });
        let newer = json!({ "tables": [{ "comment": "b" }, { "comment": "b" }] });
        let ignore = IgnoreKeys::new().with("tables.0.comment");
        let changes = diff(&older, &newer, &ignore);
        assert_eq!(changes.len(), 1);
        assert!(changes.contains_key("tables.1.comment"));
    }
}
