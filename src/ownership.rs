// ✅ Ownership Tracker - Per-item acquisition flags, kept durable
//
// One record per entry name, one boolean per acquisition channel.
// An entry is owned when any channel flag is set; a missing record
// means every flag is false.

use crate::catalog::{CatalogEntry, CatalogStore};
use crate::error::OwnershipError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Acquisition channels tracked by default
pub const CHANNELS: [&str; 2] = ["Hasbro", "Takara"];

/// Key under which the whole ownership mapping is persisted
pub const STORE_KEY: &str = "ownedBeys";

// ============================================================================
// RECORDS
// ============================================================================

/// OwnershipRecord - channel name → flag
///
/// Serializes as a plain object: `{"Hasbro": true, "Takara": false}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnershipRecord {
    flags: BTreeMap<String, bool>,
}

impl OwnershipRecord {
    /// A record with every given channel set to false
    pub fn with_channels(channels: &[String]) -> Self {
        OwnershipRecord {
            flags: channels.iter().map(|c| (c.clone(), false)).collect(),
        }
    }

    pub fn get(&self, channel: &str) -> bool {
        self.flags.get(channel).copied().unwrap_or(false)
    }

    pub fn set(&mut self, channel: &str, value: bool) {
        self.flags.insert(channel.to_string(), value);
    }

    /// Flip one flag, returning the new value
    pub fn flip(&mut self, channel: &str) -> bool {
        let value = !self.get(channel);
        self.set(channel, value);
        value
    }
}

/// Full persisted mapping: entry name → record
pub type OwnershipMap = BTreeMap<String, OwnershipRecord>;

// ============================================================================
// PERSISTENT STORE (I/O seam)
// ============================================================================

/// OwnershipStore - durable key/value home of the ownership mapping
///
/// The tracker reads it once when opened and writes the full mapping
/// after every mutation.
pub trait OwnershipStore: Send {
    fn load(&mut self) -> anyhow::Result<OwnershipMap>;
    fn save(&mut self, map: &OwnershipMap) -> anyhow::Result<()>;
}

// ============================================================================
// COUNTS
// ============================================================================

/// Owned vs total among the entries selected by a predicate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OwnershipCount {
    pub owned: usize,
    pub total: usize,
}

impl OwnershipCount {
    pub fn as_tuple(&self) -> (usize, usize) {
        (self.owned, self.total)
    }
}

impl fmt::Display for OwnershipCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owned, self.total)
    }
}

/// Per-group counts plus the overall count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipSummary {
    pub all: OwnershipCount,
    pub groups: Vec<(String, OwnershipCount)>,
}

// ============================================================================
// TRACKER
// ============================================================================

pub struct OwnershipTracker {
    channels: Vec<String>,
    records: OwnershipMap,
    store: Box<dyn OwnershipStore>,
    dirty: bool,
}

impl OwnershipTracker {
    /// Open with the default channels, reading persisted state once
    pub fn open(store: Box<dyn OwnershipStore>) -> Result<Self, OwnershipError> {
        let channels: Vec<String> = CHANNELS.iter().map(|c| c.to_string()).collect();
        Self::with_channels(store, channels)
    }

    pub fn with_channels(
        mut store: Box<dyn OwnershipStore>,
        channels: Vec<String>,
    ) -> Result<Self, OwnershipError> {
        let records = store
            .load()
            .map_err(|e| OwnershipError::PersistRead(format!("{:#}", e)))?;

        info!(records = records.len(), channels = ?channels, "Ownership state loaded");

        Ok(OwnershipTracker {
            channels,
            records,
            store,
            dirty: false,
        })
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn records(&self) -> &OwnershipMap {
        &self.records
    }

    /// True when the last write failed and memory is ahead of the store
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn check_channel(&self, channel: &str) -> Result<(), OwnershipError> {
        if self.channels.iter().any(|c| c == channel) {
            Ok(())
        } else {
            Err(OwnershipError::UnknownChannel {
                channel: channel.to_string(),
                expected: self.channels.join(", "),
            })
        }
    }

    /// Flip one channel flag for `name` and persist the whole mapping.
    ///
    /// Returns the flag's new value. A failed write keeps the in-memory
    /// change, marks the tracker dirty and returns `PersistWrite`.
    pub fn toggle(&mut self, name: &str, channel: &str) -> Result<bool, OwnershipError> {
        self.check_channel(channel)?;

        let channels = &self.channels;
        let record = self
            .records
            .entry(name.to_string())
            .or_insert_with(|| OwnershipRecord::with_channels(channels));
        let value = record.flip(channel);

        debug!(name, channel, value, "Ownership toggled");

        self.dirty = true;
        self.flush()?;
        Ok(value)
    }

    /// Write the current mapping to the store
    pub fn flush(&mut self) -> Result<(), OwnershipError> {
        match self.store.save(&self.records) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(error = %message, "Ownership state not saved; will retry on next write");
                Err(OwnershipError::PersistWrite(message))
            }
        }
    }

    pub fn has(&self, name: &str, channel: &str) -> bool {
        self.records
            .get(name)
            .map(|r| r.get(channel))
            .unwrap_or(false)
    }

    /// OR across the configured channels; absent record is not owned
    pub fn is_owned(&self, name: &str) -> bool {
        match self.records.get(name) {
            Some(record) => self.channels.iter().any(|c| record.get(c)),
            None => false,
        }
    }

    /// Copy of the record for `name` (all false when absent)
    pub fn record(&self, name: &str) -> OwnershipRecord {
        self.records
            .get(name)
            .cloned()
            .unwrap_or_else(|| OwnershipRecord::with_channels(&self.channels))
    }

    /// Owned/total among catalog entries accepted by `predicate`.
    ///
    /// Always recomputed from the live catalog and records.
    pub fn count_owned<P>(&self, catalog: &CatalogStore, predicate: P) -> OwnershipCount
    where
        P: Fn(&CatalogEntry) -> bool,
    {
        catalog
            .entries()
            .iter()
            .filter(|&e| predicate(e))
            .fold(OwnershipCount::default(), |mut count, e| {
                count.total += 1;
                if self.is_owned(&e.name) {
                    count.owned += 1;
                }
                count
            })
    }

    pub fn summary<S: AsRef<str>>(&self, catalog: &CatalogStore, groups: &[S]) -> OwnershipSummary {
        let groups = groups
            .iter()
            .map(|g| {
                let g = g.as_ref();
                (g.to_string(), self.count_owned(catalog, |e| e.group == g))
            })
            .collect();

        OwnershipSummary {
            all: self.count_owned(catalog, |_| true),
            groups,
        }
    }
}

impl Drop for OwnershipTracker {
    fn drop(&mut self) {
        if self.dirty && self.flush().is_err() {
            warn!("Exiting with unsaved ownership changes");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn catalog() -> CatalogStore {
        CatalogStore::from_entries(vec![
            CatalogEntry::new("a", "G1", "Attaque", "Droite", 10.0),
            CatalogEntry::new("b", "G1", "Défense", "Gauche", 25.0),
            CatalogEntry::new("c", "G1", "Endurance", "Double", 45.0),
            CatalogEntry::new("d", "G2", "Équilibre", "Droite", 70.0),
            CatalogEntry::new("e", "G2", "Attaque", "Droite", 35.0),
        ])
        .unwrap()
    }

    fn tracker() -> (OwnershipTracker, MemoryStore) {
        let store = MemoryStore::new();
        let tracker = OwnershipTracker::open(Box::new(store.clone())).unwrap();
        (tracker, store)
    }

    #[test]
    fn test_absent_record_is_not_owned() {
        let (tracker, _) = tracker();
        assert!(!tracker.is_owned("a"));
        assert!(!tracker.has("a", "Hasbro"));
        assert_eq!(tracker.record("a"), OwnershipRecord::with_channels(tracker.channels()));
    }

    #[test]
    fn test_toggle_sets_flag_and_persists() {
        let (mut tracker, store) = tracker();

        assert!(tracker.toggle("a", "Takara").unwrap());
        assert!(tracker.is_owned("a"));
        assert!(tracker.has("a", "Takara"));
        assert!(!tracker.has("a", "Hasbro"));

        let saved = store.snapshot();
        assert!(saved["a"].get("Takara"));
        assert!(!saved["a"].get("Hasbro"));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_double_toggle_restores_state() {
        let (mut tracker, _) = tracker();
        tracker.toggle("a", "Hasbro").unwrap();
        let before_flags = tracker.record("a");
        let before_owned = tracker.is_owned("a");

        tracker.toggle("a", "Takara").unwrap();
        tracker.toggle("a", "Takara").unwrap();

        assert_eq!(tracker.record("a"), before_flags);
        assert_eq!(tracker.is_owned("a"), before_owned);
    }

    #[test]
    fn test_owned_if_any_channel() {
        let (mut tracker, _) = tracker();
        tracker.toggle("a", "Hasbro").unwrap();
        tracker.toggle("a", "Takara").unwrap();
        assert!(tracker.is_owned("a"));

        tracker.toggle("a", "Hasbro").unwrap();
        assert!(tracker.is_owned("a"));

        tracker.toggle("a", "Takara").unwrap();
        assert!(!tracker.is_owned("a"));
    }

    #[test]
    fn test_unknown_channel_rejected_without_write() {
        let (mut tracker, store) = tracker();
        let result = tracker.toggle("a", "Bootleg");
        assert!(matches!(result, Err(OwnershipError::UnknownChannel { .. })));
        assert!(tracker.records().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_count_owned_per_group() {
        let catalog = catalog();
        let (mut tracker, _) = tracker();
        let in_g1 = |e: &CatalogEntry| e.group == "G1";

        assert_eq!(tracker.count_owned(&catalog, in_g1).as_tuple(), (0, 3));

        tracker.toggle("b", "Hasbro").unwrap();
        assert_eq!(tracker.count_owned(&catalog, in_g1).as_tuple(), (1, 3));
        assert_eq!(tracker.count_owned(&catalog, |e| e.group == "G2").as_tuple(), (0, 2));

        tracker.toggle("b", "Hasbro").unwrap();
        assert_eq!(tracker.count_owned(&catalog, in_g1).as_tuple(), (0, 3));
    }

    #[test]
    fn test_summary() {
        let catalog = catalog();
        let (mut tracker, _) = tracker();
        tracker.toggle("a", "Hasbro").unwrap();
        tracker.toggle("d", "Takara").unwrap();
        // Records for names outside the catalog are not counted
        tracker.toggle("ghost", "Takara").unwrap();

        let summary = tracker.summary(&catalog, &["G1", "G2", "G3"]);
        assert_eq!(summary.all.to_string(), "2/5");
        assert_eq!(summary.groups[0], ("G1".to_string(), OwnershipCount { owned: 1, total: 3 }));
        assert_eq!(summary.groups[1].1.to_string(), "1/2");
        assert_eq!(summary.groups[2].1.to_string(), "0/0");
    }

    #[test]
    fn test_reopen_reads_persisted_state() {
        let store = MemoryStore::new();
        {
            let mut tracker = OwnershipTracker::open(Box::new(store.clone())).unwrap();
            tracker.toggle("c", "Hasbro").unwrap();
        }

        let tracker = OwnershipTracker::open(Box::new(store)).unwrap();
        assert!(tracker.is_owned("c"));
    }

    #[test]
    fn test_failed_write_is_surfaced_and_retried() {
        let (mut tracker, store) = tracker();
        store.fail_writes(true);

        let result = tracker.toggle("a", "Hasbro");
        assert!(matches!(result, Err(OwnershipError::PersistWrite(_))));
        // Memory keeps the change
        assert!(tracker.is_owned("a"));
        assert!(tracker.is_dirty());
        assert!(store.snapshot().is_empty());

        store.fail_writes(false);
        tracker.flush().unwrap();
        assert!(!tracker.is_dirty());
        assert!(store.snapshot()["a"].get("Hasbro"));
    }

    #[test]
    fn test_record_serializes_as_plain_object() {
        let mut map = OwnershipMap::new();
        let mut record = OwnershipRecord::default();
        record.set("Hasbro", true);
        record.set("Takara", false);
        map.insert("Dran Sword".to_string(), record);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"Dran Sword":{"Hasbro":true,"Takara":false}}"#);

        let back: OwnershipMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
