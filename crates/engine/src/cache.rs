//! DetailCache: per-key detail row cache with explicit fetch status
//!
//! ## Design
//!
//! The cache is the single source of truth other components read from.
//! Each master key carries an explicit status tag:
//!
//! - `Unfetched`: never the subject of a completed fetch
//! - `Fetched`: at least one successful fetch merged rows for this key
//! - `Failed`: the most recent attempt for this key failed; no rows
//!   were stored
//!
//! Tracking `Failed` separately from absence removes the ambiguity where
//! a missing entry could mean either "never tried" or "tried and failed".
//! `known_keys()` only reports `Fetched` keys, so a failed batch leaves
//! the next delta computation identical to the previous one and a retry
//! re-attempts cleanly.
//!
//! ## Mutation discipline
//!
//! `merge`, `mark_failed`, and `reset` are the only mutations. Rows are
//! immutable once merged; a later fetch for the same key overwrites the
//! whole row set. `reset` is called only when the master source binding
//! changes, so stale details are never shown against new master rows.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::HashMap;
use tracing::debug;
use trellis_core::{DetailRecord, MasterKey};

/// Fetch status of one master key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Never the subject of a completed fetch
    Unfetched,
    /// Rows for this key were merged from a successful fetch
    Fetched,
    /// The most recent attempt failed; no rows stored
    Failed,
}

/// Mapping from master key to its cached detail rows
#[derive(Debug, Default)]
pub struct DetailCache {
    entries: FxHashMap<MasterKey, Vec<DetailRecord>>,
    failed: FxHashMap<MasterKey, String>,
}

impl DetailCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached detail rows for a key, if a successful fetch stored them
    pub fn get(&self, key: &MasterKey) -> Option<&[DetailRecord]> {
        self.entries.get(key).map(|rows| rows.as_slice())
    }

    /// Whether a successful fetch stored rows for this key
    pub fn has(&self, key: &MasterKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Fetch status of a key
    pub fn status(&self, key: &MasterKey) -> FetchStatus {
        if self.entries.contains_key(key) {
            FetchStatus::Fetched
        } else if self.failed.contains_key(key) {
            FetchStatus::Failed
        } else {
            FetchStatus::Unfetched
        }
    }

    /// Human-readable message of the last failure for a key, if any
    pub fn failure_message(&self, key: &MasterKey) -> Option<&str> {
        self.failed.get(key).map(|m| m.as_str())
    }

    /// Keys the cache holds successfully fetched rows for.
    ///
    /// This is the `previous` set fed to the delta computation; `Failed`
    /// keys are deliberately excluded so they are re-attempted.
    pub fn known_keys(&self) -> FxHashSet<MasterKey> {
        self.entries.keys().cloned().collect()
    }

    /// Upsert fetched entries.
    ///
    /// Last-write-wins per key within one call; existing keys not named
    /// in `entries` are untouched. Merged keys become `Fetched` and any
    /// prior failure mark is cleared.
    pub fn merge(&mut self, entries: Vec<(MasterKey, Vec<DetailRecord>)>) {
        debug!(count = entries.len(), "merging fetched detail entries");
        for (key, rows) in entries {
            self.failed.remove(&key);
            self.entries.insert(key, rows);
        }
    }

    /// Record a failed attempt for a batch of keys.
    ///
    /// Status only: stored rows are never touched, and keys that already
    /// hold fetched rows keep them (a failed refresh does not evict).
    pub fn mark_failed(&mut self, keys: &[MasterKey], message: &str) {
        for key in keys {
            if !self.entries.contains_key(key) {
                self.failed.insert(key.clone(), message.to_string());
            }
        }
    }

    /// Clear all entries and statuses.
    ///
    /// Called when the master data source identity changes.
    pub fn reset(&mut self) {
        debug!(entries = self.entries.len(), "resetting detail cache");
        self.entries.clear();
        self.failed.clear();
    }

    /// Number of keys with fetched rows
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys hold fetched rows
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Immutable snapshot of the fetched entries.
    ///
    /// This is what the outward value-changed signal carries; consumers
    /// never alias the cache's internal state.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Immutable copy of the cache contents at one point in time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheSnapshot {
    entries: HashMap<MasterKey, Vec<DetailRecord>>,
}

impl CacheSnapshot {
    /// Detail rows for a key
    pub fn get(&self, key: &MasterKey) -> Option<&[DetailRecord]> {
        self.entries.get(key).map(|rows| rows.as_slice())
    }

    /// Number of keys in the snapshot
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, rows)` pairs (unordered)
    pub fn iter(&self) -> impl Iterator<Item = (&MasterKey, &[DetailRecord])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use trellis_core::Value;

    fn row(field: &str, value: i64) -> DetailRecord {
        DetailRecord::new(HashMap::from([(field.to_string(), Value::Int(value))]))
    }

    #[test]
    fn test_merge_and_get() {
        let mut cache = DetailCache::new();
        cache.merge(vec![(MasterKey::from("A101"), vec![row("AMT", 10)])]);

        assert!(cache.has(&MasterKey::from("A101")));
        assert_eq!(cache.get(&MasterKey::from("A101")).unwrap().len(), 1);
        assert_eq!(cache.status(&MasterKey::from("A101")), FetchStatus::Fetched);
        assert!(!cache.has(&MasterKey::from("A102")));
    }

    #[test]
    fn test_merge_idempotence() {
        let mut cache = DetailCache::new();
        let entry = (MasterKey::from("A101"), vec![row("AMT", 10)]);

        cache.merge(vec![entry.clone()]);
        let once = cache.snapshot();
        cache.merge(vec![entry]);
        let twice = cache.snapshot();

        assert_eq!(once, twice);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_merge_overwrites_never_appends() {
        let mut cache = DetailCache::new();
        cache.merge(vec![(
            MasterKey::from("A101"),
            vec![row("AMT", 10), row("AMT", 20)],
        )]);
        cache.merge(vec![(MasterKey::from("A101"), vec![row("AMT", 30)])]);

        let rows = cache.get(&MasterKey::from("A101")).unwrap();
        assert_eq!(rows, &[row("AMT", 30)]);
    }

    #[test]
    fn test_merge_last_write_wins_within_one_call() {
        let mut cache = DetailCache::new();
        cache.merge(vec![
            (MasterKey::from("A101"), vec![row("AMT", 1)]),
            (MasterKey::from("A101"), vec![row("AMT", 2)]),
        ]);
        assert_eq!(cache.get(&MasterKey::from("A101")).unwrap(), &[row("AMT", 2)]);
    }

    #[test]
    fn test_merge_does_not_remove_other_keys() {
        let mut cache = DetailCache::new();
        cache.merge(vec![(MasterKey::from("A101"), vec![row("AMT", 10)])]);
        cache.merge(vec![(MasterKey::from("A102"), vec![row("AMT", 20)])]);
        assert_eq!(cache.len(), 2);
        assert!(cache.has(&MasterKey::from("A101")));
    }

    #[test]
    fn test_failed_distinguishable_from_unfetched() {
        let mut cache = DetailCache::new();
        cache.mark_failed(&[MasterKey::from("A102")], "HTTP 503");

        assert_eq!(cache.status(&MasterKey::from("A102")), FetchStatus::Failed);
        assert_eq!(cache.status(&MasterKey::from("A103")), FetchStatus::Unfetched);
        assert_eq!(cache.failure_message(&MasterKey::from("A102")), Some("HTTP 503"));

        // Failed keys stay out of known_keys so retry recomputes the same delta
        assert!(!cache.known_keys().contains(&MasterKey::from("A102")));
    }

    #[test]
    fn test_failed_mark_does_not_evict_fetched_rows() {
        let mut cache = DetailCache::new();
        cache.merge(vec![(MasterKey::from("A101"), vec![row("AMT", 10)])]);
        cache.mark_failed(&[MasterKey::from("A101")], "refresh failed");

        assert_eq!(cache.status(&MasterKey::from("A101")), FetchStatus::Fetched);
        assert!(cache.has(&MasterKey::from("A101")));
    }

    #[test]
    fn test_merge_clears_failure_mark() {
        let mut cache = DetailCache::new();
        cache.mark_failed(&[MasterKey::from("A102")], "HTTP 503");
        cache.merge(vec![(MasterKey::from("A102"), vec![row("AMT", 5)])]);

        assert_eq!(cache.status(&MasterKey::from("A102")), FetchStatus::Fetched);
        assert_eq!(cache.failure_message(&MasterKey::from("A102")), None);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut cache = DetailCache::new();
        cache.merge(vec![(MasterKey::from("A101"), vec![row("AMT", 10)])]);
        cache.mark_failed(&[MasterKey::from("A102")], "x");

        cache.reset();

        assert!(cache.is_empty());
        assert_eq!(cache.status(&MasterKey::from("A101")), FetchStatus::Unfetched);
        assert_eq!(cache.status(&MasterKey::from("A102")), FetchStatus::Unfetched);
        assert!(cache.known_keys().is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut cache = DetailCache::new();
        cache.merge(vec![(MasterKey::from("A101"), vec![row("AMT", 10)])]);

        let snapshot = cache.snapshot();
        cache.merge(vec![(MasterKey::from("A101"), vec![row("AMT", 99)])]);

        // Snapshot still holds the rows from merge time
        assert_eq!(snapshot.get(&MasterKey::from("A101")).unwrap(), &[row("AMT", 10)]);
    }
}
