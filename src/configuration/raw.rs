//! Raw configuration store
//!
//! The raw key/value table is the single source of truth for a
//! configuration. It has two representations:
//!
//! - `Canonical`: a key-sorted, duplicate-free entry vector. This is the
//!   form that is compared, hashed and persisted.
//! - `Buffered`: an ordered map used while a batch of edits is applied.
//!
//! `RawStore::to_canonical` moves a buffered store back to canonical form.
//! Calling it on an already-canonical store does nothing.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use super::keys::KeyRange;

/// One key/value pair of the configuration table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    pub key: String,
    pub value: Vec<u8>,
}

impl ConfigurationEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Canonical configuration table: sorted by key, keys unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<ConfigurationEntry>", into = "Vec<ConfigurationEntry>")]
pub struct RawConfiguration {
    entries: Vec<ConfigurationEntry>,
}

impl RawConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a canonical table from entries in any order.
    ///
    /// When a key appears more than once the last occurrence wins.
    pub fn from_entries(entries: impl IntoIterator<Item = ConfigurationEntry>) -> Self {
        let map: BTreeMap<String, Vec<u8>> = entries
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();
        Self::from_map(map)
    }

    fn from_map(map: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, value)| ConfigurationEntry { key, value })
                .collect(),
        }
    }

    /// Whether `entries` is already sorted by key with no duplicates.
    pub fn is_canonical(entries: &[ConfigurationEntry]) -> bool {
        entries.windows(2).all(|pair| pair[0].key < pair[1].key)
    }

    pub fn entries(&self) -> &[ConfigurationEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigurationEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .binary_search_by(|entry| entry.key.as_str().cmp(key))
            .ok()
            .map(|idx| self.entries[idx].value.as_slice())
    }

    /// Entries whose keys fall inside `range`.
    pub fn range(&self, range: &KeyRange) -> &[ConfigurationEntry] {
        if range.is_empty() {
            return &[];
        }
        let start = self
            .entries
            .partition_point(|entry| entry.key.as_str() < range.begin.as_str());
        let end = self
            .entries
            .partition_point(|entry| entry.key.as_str() < range.end.as_str());
        &self.entries[start..end]
    }

    pub fn into_entries(self) -> Vec<ConfigurationEntry> {
        self.entries
    }
}

impl From<Vec<ConfigurationEntry>> for RawConfiguration {
    fn from(entries: Vec<ConfigurationEntry>) -> Self {
        if Self::is_canonical(&entries) {
            Self { entries }
        } else {
            Self::from_entries(entries)
        }
    }
}

impl From<RawConfiguration> for Vec<ConfigurationEntry> {
    fn from(raw: RawConfiguration) -> Self {
        raw.entries
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for RawConfiguration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_entries(
            iter.into_iter()
                .map(|(key, value)| ConfigurationEntry::new(key, value)),
        )
    }
}

impl<'a> IntoIterator for &'a RawConfiguration {
    type Item = &'a ConfigurationEntry;
    type IntoIter = std::slice::Iter<'a, ConfigurationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Raw table in one of its two representations.
#[derive(Debug, Clone)]
pub enum RawStore {
    Canonical(RawConfiguration),
    Buffered(BTreeMap<String, Vec<u8>>),
}

impl Default for RawStore {
    fn default() -> Self {
        RawStore::Canonical(RawConfiguration::new())
    }
}

impl RawStore {
    pub fn is_buffered(&self) -> bool {
        matches!(self, RawStore::Buffered(_))
    }

    /// The canonical table, or `None` while edits are buffered.
    pub fn canonical(&self) -> Option<&RawConfiguration> {
        match self {
            RawStore::Canonical(raw) => Some(raw),
            RawStore::Buffered(_) => None,
        }
    }

    /// Move to canonical form and return the sorted table.
    pub fn to_canonical(&mut self) -> &RawConfiguration {
        if let RawStore::Buffered(map) = self {
            let map = std::mem::take(map);
            *self = RawStore::Canonical(RawConfiguration::from_map(map));
        }
        match self {
            RawStore::Canonical(raw) => raw,
            RawStore::Buffered(_) => unreachable!("store was just made canonical"),
        }
    }

    fn buffer(&mut self) -> &mut BTreeMap<String, Vec<u8>> {
        if let RawStore::Canonical(raw) = self {
            let entries = std::mem::take(&mut raw.entries);
            *self = RawStore::Buffered(
                entries
                    .into_iter()
                    .map(|entry| (entry.key, entry.value))
                    .collect(),
            );
        }
        match self {
            RawStore::Buffered(map) => map,
            RawStore::Canonical(_) => unreachable!("store was just buffered"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        match self {
            RawStore::Canonical(raw) => raw.get(key),
            RawStore::Buffered(map) => map.get(key).map(Vec::as_slice),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.buffer().insert(key.into(), value.into());
    }

    /// Remove every entry inside `range`, returning the removed entries in key order.
    pub fn clear(&mut self, range: &KeyRange) -> Vec<ConfigurationEntry> {
        if range.is_empty() {
            return Vec::new();
        }
        if let RawStore::Canonical(raw) = self {
            if raw.range(range).is_empty() {
                return Vec::new();
            }
        }
        let map = self.buffer();
        let doomed: Vec<String> = map
            .range::<str, _>((
                Bound::Included(range.begin.as_str()),
                Bound::Excluded(range.end.as_str()),
            ))
            .map(|(key, _)| key.clone())
            .collect();
        doomed
            .into_iter()
            .filter_map(|key| map.remove(&key).map(|value| ConfigurationEntry { key, value }))
            .collect()
    }

    /// All entries in key order, from whichever form is current.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (&str, &[u8])> + '_> {
        match self {
            RawStore::Canonical(raw) => Box::new(
                raw.iter()
                    .map(|entry| (entry.key.as_str(), entry.value.as_slice())),
            ),
            RawStore::Buffered(map) => {
                Box::new(map.iter().map(|(key, value)| (key.as_str(), value.as_slice())))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawStore::Canonical(raw) => raw.len(),
            RawStore::Buffered(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Both forms iterate in key order, so comparing the iterators compares the
// canonical sequences without forcing a conversion.
impl PartialEq for RawStore {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for RawStore {}

impl Hash for RawStore {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for (key, value) in self.iter() {
            key.hash(state);
            value.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawConfiguration {
        vec![("c", "3"), ("a", "1"), ("b", "2")].into_iter().collect()
    }

    #[test]
    fn test_from_entries_sorts() {
        let raw = sample();
        let keys: Vec<_> = raw.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(RawConfiguration::is_canonical(raw.entries()));
    }

    #[test]
    fn test_from_entries_last_duplicate_wins() {
        let raw: RawConfiguration = vec![("a", "1"), ("a", "2")].into_iter().collect();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw.get("a"), Some(&b"2"[..]));
    }

    #[test]
    fn test_range_lookup() {
        let raw = sample();
        let slice = raw.range(&KeyRange::new("b", "z"));
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[0].key, "b");
        assert!(raw.range(&KeyRange::new("z", "a")).is_empty());
    }

    #[test]
    fn test_set_buffers_store() {
        let mut store = RawStore::Canonical(sample());
        store.set("d", "4");
        assert!(store.is_buffered());
        assert!(store.canonical().is_none());
        assert_eq!(store.get("d"), Some(&b"4"[..]));
        assert_eq!(store.get("a"), Some(&b"1"[..]));
    }

    #[test]
    fn test_to_canonical_is_idempotent() {
        let mut store = RawStore::default();
        store.set("b", "2");
        store.set("a", "1");
        let first = store.to_canonical().clone();
        let second = store.to_canonical().clone();
        assert_eq!(first, second);
        assert!(!store.is_buffered());
        assert_eq!(first.entries()[0].key, "a");
    }

    #[test]
    fn test_clear_returns_removed_entries() {
        let mut store = RawStore::Canonical(sample());
        let removed = store.clear(&KeyRange::new("a", "c"));
        let keys: Vec<_> = removed.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.len(), 1);
        assert!(store.clear(&KeyRange::new("c", "c")).is_empty());
    }

    #[test]
    fn test_equality_across_representations() {
        let canonical = RawStore::Canonical(sample());
        let mut buffered = RawStore::default();
        buffered.set("a", "1");
        buffered.set("c", "3");
        buffered.set("b", "2");
        assert!(buffered.is_buffered());
        assert_eq!(canonical, buffered);

        buffered.set("d", "4");
        assert_ne!(canonical, buffered);
    }

    #[test]
    fn test_serde_restores_canonical_order() {
        let json = r#"[{"key":"b","value":[50]},{"key":"a","value":[49]}]"#;
        let raw: RawConfiguration = serde_json::from_str(json).unwrap();
        assert!(RawConfiguration::is_canonical(raw.entries()));
        assert_eq!(raw.get("a"), Some(&b"1"[..]));
    }
}
