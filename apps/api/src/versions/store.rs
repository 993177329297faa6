//! Version Store: bounded, most-recent-first log of document snapshots.
//!
//! Every mutating caller snapshots the PRE-mutation document here before
//! overwriting the live document. Undo does not go through this log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_VERSIONS: usize = 20;

pub const LABEL_CHAT_EDIT: &str = "Pre-chat edit";
pub const LABEL_OPTIMIZE: &str = "Pre-optimization";
pub const LABEL_RESTORE: &str = "Pre-restore";
pub const LABEL_EXTERNAL_EDIT: &str = "Pre-external edit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: Uuid,
    pub title: String,
    pub latex_snapshot: String,
    pub timestamp: DateTime<Utc>,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStore {
    versions: VecDeque<Version>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from persisted versions, re-applying the cap.
    pub fn from_versions(versions: Vec<Version>) -> Self {
        let mut versions: VecDeque<Version> = versions.into();
        versions.truncate(MAX_VERSIONS);
        Self { versions }
    }

    /// Prepends a snapshot, evicting the oldest beyond the cap. Returns the new id.
    pub fn save_version(&mut self, document: &str, title: &str, label: &str) -> Uuid {
        let version = Version {
            id: Uuid::new_v4(),
            title: title.to_string(),
            latex_snapshot: document.to_string(),
            timestamp: Utc::now(),
            label: label.to_string(),
        };
        let id = version.id;
        self.versions.push_front(version);
        self.versions.truncate(MAX_VERSIONS);
        id
    }

    /// Removes a version. Unknown ids are ignored.
    pub fn delete_version(&mut self, id: Uuid) -> bool {
        match self.versions.iter().position(|v| v.id == id) {
            Some(index) => {
                self.versions.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn update_label(&mut self, id: Uuid, label: &str) -> bool {
        match self.versions.iter_mut().find(|v| v.id == id) {
            Some(version) => {
                version.label = label.to_string();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Most recent first.
    pub fn list(&self) -> Vec<Version> {
        self.versions.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_prepends() {
        let mut store = VersionStore::new();
        let first = store.save_version("v1", "Resume", "one");
        let second = store.save_version("v2", "Resume", "two");
        let list = store.list();
        assert_eq!(list[0].id, second);
        assert_eq!(list[1].id, first);
        assert_eq!(list[1].latex_snapshot, "v1");
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut store = VersionStore::new();
        for i in 0..25 {
            store.save_version(&format!("doc {i}"), "Resume", &format!("v{i}"));
        }
        assert_eq!(store.len(), MAX_VERSIONS);
        let list = store.list();
        assert_eq!(list[0].latex_snapshot, "doc 24");
        assert_eq!(list[19].latex_snapshot, "doc 5");
        assert!(list.iter().all(|v| v.latex_snapshot != "doc 4"));
    }

    #[test]
    fn test_twenty_first_save_keeps_twenty() {
        let mut store = VersionStore::new();
        let oldest = store.save_version("doc 0", "Resume", "first");
        for i in 1..=20 {
            store.save_version(&format!("doc {i}"), "Resume", "next");
        }
        assert_eq!(store.len(), 20);
        assert!(store.get(oldest).is_none());
    }

    #[test]
    fn test_delete_version() {
        let mut store = VersionStore::new();
        let id = store.save_version("v1", "Resume", "x");
        assert!(store.delete_version(id));
        assert!(store.is_empty());
        assert!(!store.delete_version(id));
    }

    #[test]
    fn test_update_label_in_place() {
        let mut store = VersionStore::new();
        let a = store.save_version("a", "Resume", "x");
        let b = store.save_version("b", "Resume", "y");
        assert!(store.update_label(a, "Before interview prep"));
        assert_eq!(store.get(a).unwrap().label, "Before interview prep");
        assert_eq!(store.list()[0].id, b);
        assert!(!store.update_label(Uuid::new_v4(), "nope"));
    }

    #[test]
    fn test_from_versions_reapplies_cap() {
        let mut source = VersionStore::new();
        for i in 0..MAX_VERSIONS {
            source.save_version(&format!("doc {i}"), "Resume", "x");
        }
        let mut versions = source.list();
        versions.extend(source.list());
        let store = VersionStore::from_versions(versions);
        assert_eq!(store.len(), MAX_VERSIONS);
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let mut store = VersionStore::new();
        store.save_version("doc", "Resume", "x");
        let json = serde_json::to_value(&store).unwrap();
        assert!(json.is_array());
        let restored: VersionStore = serde_json::from_value(json).unwrap();
        assert_eq!(restored, store);
    }
}
