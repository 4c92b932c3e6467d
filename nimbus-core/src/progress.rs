//! Progress and summary reporting

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A single named progress metric
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub current: i64,
    pub total: i64,
    /// Free-form identifier of the item being processed (file name, URL, ...)
    #[serde(default)]
    pub identifier: String,
}

impl ProgressEntry {
    pub fn new(current: i64, total: i64) -> Self {
        Self {
            current,
            total,
            identifier: String::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }
}

/// Progress of a task keyed by sub-metric name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(HashMap<String, ProgressEntry>);

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ProgressEntry) {
        self.0.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&ProgressEntry> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProgressEntry)> {
        self.0.iter()
    }

    /// Merge another progress map into this one; entries from `other` win
    pub fn merge(&mut self, other: &Progress) {
        for (name, entry) in other.iter() {
            self.0.insert(name.clone(), entry.clone());
        }
    }

    /// Return a merged copy, leaving both inputs untouched
    pub fn merged(mut self, other: &Progress) -> Progress {
        self.merge(other);
        self
    }
}

impl FromIterator<(String, ProgressEntry)> for Progress {
    fn from_iter<I: IntoIterator<Item = (String, ProgressEntry)>>(iter: I) -> Self {
        Progress(iter.into_iter().collect())
    }
}

/// Human-facing summary of where a task currently is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub phase: String,
    #[serde(default)]
    pub props: HashMap<String, JsonValue>,
}

impl Summary {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            props: HashMap::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_merge_prefers_incoming() {
        let mut local = Progress::new();
        local.insert("upload", ProgressEntry::new(10, 100));
        local.insert("files", ProgressEntry::new(1, 4));

        let mut remote = Progress::new();
        remote.insert("upload", ProgressEntry::new(50, 100).with_identifier("a.zip"));
        remote.insert("extract", ProgressEntry::new(3, 9));

        local.merge(&remote);
        assert_eq!(local.len(), 3);
        assert_eq!(local.get("upload").unwrap().current, 50);
        assert_eq!(local.get("upload").unwrap().identifier, "a.zip");
        assert_eq!(local.get("files").unwrap().total, 4);
    }

    #[test]
    fn test_progress_serializes_as_map() {
        let mut progress = Progress::new();
        progress.insert("download", ProgressEntry::new(1, 2));
        let value = serde_json::to_value(&progress).unwrap();
        assert_eq!(
            value,
            json!({"download": {"current": 1, "total": 2, "identifier": ""}})
        );
    }

    #[test]
    fn test_summary_builder() {
        let summary = Summary::new("monitor").with_prop("node_id", 3);
        assert_eq!(summary.phase, "monitor");
        assert_eq!(summary.props["node_id"], json!(3));
    }
}
