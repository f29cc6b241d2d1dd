//! Merged, queryable collection of scanner indexes.

use std::collections::{BTreeSet, HashSet};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::IndexEntry;

/// A single scanner's multimap: key to a deduplicated set of values.
///
/// Insertion order is kept so serialized output is reproducible, but equality
/// compares contents only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    entries: IndexMap<String, IndexSet<String>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value under a key. Returns `true` if the value was new.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.entries
            .entry(key.into())
            .or_default()
            .insert(value.into())
    }

    /// Values for a key, if the key is present.
    pub fn get(&self, key: &str) -> Option<&IndexSet<String>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate `(key, values)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexSet<String>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of (key, value) pairs.
    pub fn value_count(&self) -> usize {
        self.entries.values().map(IndexSet::len).sum()
    }

    /// Union another index into this one.
    pub fn merge(&mut self, other: &Index) {
        for (key, values) in &other.entries {
            let target = self.entries.entry(key.clone()).or_default();
            for value in values {
                target.insert(value.clone());
            }
        }
    }
}

/// Mapping from scanner name to that scanner's [`Index`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    indexes: IndexMap<String, Index>,
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `(key, value)` pair for a scanner.
    pub fn insert(
        &mut self,
        scanner: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        self.indexes
            .entry(scanner.into())
            .or_default()
            .insert(key, value)
    }

    /// Record a full index entry.
    pub fn insert_entry(&mut self, entry: IndexEntry) -> bool {
        self.insert(entry.scanner, entry.key, entry.value)
    }

    /// Replace the index for a scanner wholesale.
    pub fn set_index(&mut self, scanner: impl Into<String>, index: Index) {
        self.indexes.insert(scanner.into(), index);
    }

    /// Borrow the index of one scanner.
    pub fn index(&self, scanner: &str) -> Option<&Index> {
        self.indexes.get(scanner)
    }

    /// Scanner names in insertion order.
    pub fn scanners(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    /// Iterate `(scanner, index)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Index)> {
        self.indexes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.values().all(Index::is_empty)
    }

    /// Number of keys across every index.
    pub fn key_count(&self) -> usize {
        self.indexes.values().map(Index::len).sum()
    }

    /// Number of (key, value) pairs across every index.
    pub fn value_count(&self) -> usize {
        self.indexes.values().map(Index::value_count).sum()
    }

    /// Values stored under `key` for `scanner`. Empty when either is absent.
    pub fn get(&self, scanner: &str, key: &str) -> BTreeSet<String> {
        self.indexes
            .get(scanner)
            .and_then(|index| index.get(key))
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Union of [`Store::get`] over several keys.
    pub fn get_all<'a>(
        &self,
        scanner: &str,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> BTreeSet<String> {
        keys.into_iter()
            .flat_map(|key| self.get(scanner, key))
            .collect()
    }

    /// Reverse lookup: every key under which `value` is stored for `scanner`.
    pub fn keys_for(&self, scanner: &str, value: &str) -> BTreeSet<String> {
        let Some(index) = self.indexes.get(scanner) else {
            return BTreeSet::new();
        };
        index
            .iter()
            .filter(|(_, values)| values.contains(value))
            .map(|(key, _)| key.to_string())
            .collect()
    }

    /// Every value reachable from `key` by repeatedly looking up discovered values.
    ///
    /// Visited keys are never expanded twice, so cyclic indexes terminate. The
    /// starting key is only part of the result if some discovered value leads back to it.
    pub fn get_transitive_closure(&self, scanner: &str, key: &str) -> BTreeSet<String> {
        let Some(index) = self.indexes.get(scanner) else {
            return BTreeSet::new();
        };

        let mut result = BTreeSet::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut frontier: Vec<&str> = vec![key];
        visited.insert(key);

        while let Some(current) = frontier.pop() {
            let Some(values) = index.get(current) else {
                continue;
            };
            for value in values {
                result.insert(value.clone());
                if visited.insert(value.as_str()) {
                    frontier.push(value.as_str());
                }
            }
        }

        result
    }

    /// Union another store into this one, per scanner and key.
    pub fn merge(&mut self, other: &Store) {
        for (scanner, index) in &other.indexes {
            self.indexes.entry(scanner.clone()).or_default().merge(index);
        }
    }

    /// Consume two stores and return their union.
    pub fn merged(mut self, other: &Store) -> Store {
        self.merge(other);
        self
    }
}

impl FromIterator<IndexEntry> for Store {
    fn from_iter<I: IntoIterator<Item = IndexEntry>>(iter: I) -> Self {
        let mut store = Store::new();
        for entry in iter {
            store.insert_entry(entry);
        }
        store
    }
}
