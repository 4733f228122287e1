//! Key/label configuration store abstraction.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One setting. `key` + `label` is unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: String,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, label: Option<&str>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.map(str::to_string),
            value: value.into(),
        }
    }
}

/// Remote source of truth for configuration values.
pub trait ConfigStore: Send + Sync {
    /// Fetch one entry; `Ok(None)` when the key/label pair does not exist.
    fn get(&self, key: &str, label: Option<&str>) -> Result<Option<ConfigEntry>>;

    /// Create or overwrite one entry.
    fn set(&self, key: &str, label: Option<&str>, value: &str) -> Result<()>;

    /// List entries, optionally restricted to a key prefix and label.
    fn list(&self, prefix: Option<&str>, label: Option<&str>) -> Result<Vec<ConfigEntry>>;
}

type EntryKey = (String, Option<String>);

/// In-memory store for tests and offline runs.
///
/// Counts `get` calls so callers can assert how many remote round-trips
/// a resolution pass would have made.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<EntryKey, String>>,
    gets: AtomicUsize,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(key, value)` pairs under one label.
    pub fn with_entries<'a>(
        label: Option<&str>,
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let store = Self::new();
        for (key, value) in entries {
            store.insert(key, label, value);
        }
        store
    }

    pub fn insert(&self, key: &str, label: Option<&str>, value: &str) {
        self.lock()
            .insert((key.to_string(), label.map(str::to_string)), value.to_string());
    }

    /// Number of `get` calls served.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<EntryKey, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str, label: Option<&str>) -> Result<Option<ConfigEntry>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let entries = self.lock();
        Ok(entries
            .get(&(key.to_string(), label.map(str::to_string)))
            .map(|value| ConfigEntry::new(key, label, value.clone())))
    }

    fn set(&self, key: &str, label: Option<&str>, value: &str) -> Result<()> {
        self.insert(key, label, value);
        Ok(())
    }

    fn list(&self, prefix: Option<&str>, label: Option<&str>) -> Result<Vec<ConfigEntry>> {
        let entries = self.lock();
        Ok(entries
            .iter()
            .filter(|((key, entry_label), _)| {
                prefix.is_none_or(|p| key.starts_with(p)) && entry_label.as_deref() == label
            })
            .map(|((key, entry_label), value)| ConfigEntry {
                key: key.clone(),
                label: entry_label.clone(),
                value: value.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_separate_namespaces() {
        let store = MemoryStore::new();
        store.insert("REGION", Some("infra"), "eastus");
        store.insert("REGION", None, "westus");

        let infra = store.get("REGION", Some("infra")).unwrap().unwrap();
        let unlabeled = store.get("REGION", None).unwrap().unwrap();

        assert_eq!(infra.value, "eastus");
        assert_eq!(unlabeled.value, "westus");
        assert!(store.get("REGION", Some("app")).unwrap().is_none());
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemoryStore::new();
        store.set("K", None, "1").unwrap();
        store.set("K", None, "2").unwrap();
        assert_eq!(store.get("K", None).unwrap().unwrap().value, "2");
        assert_eq!(store.get_count(), 1);
    }

    #[test]
    fn test_list_filters_prefix_and_label() {
        let store = MemoryStore::with_entries(
            Some("infra"),
            [("AZURE_A", "1"), ("AZURE_B", "2"), ("OTHER", "3")],
        );
        store.insert("AZURE_C", None, "4");

        let listed = store.list(Some("AZURE_"), Some("infra")).unwrap();
        let keys: Vec<&str> = listed.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["AZURE_A", "AZURE_B"]);
    }
}
