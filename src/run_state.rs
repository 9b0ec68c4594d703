//! Shared state for one collection-then-enrichment run.
//!
//! A `RunState` is created empty when a run starts and frozen when the run
//! stops. The collector is the only writer of the identifier sequence and
//! the fetcher is the only writer of the record map, so no field ever has
//! two concurrent writers; status queries read point-in-time snapshots that
//! may be slightly stale.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::region::{classify, Region};

/// One enriched follower/following entry, keyed by handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedRecord {
    /// The username, without a leading `@`.
    pub handle: String,
    /// Display name; only the direct lookup path populates this.
    #[serde(default)]
    pub display_name: String,
    /// Self-reported location, possibly empty.
    #[serde(default)]
    pub location: String,
    /// Region label derived from `location`.
    #[serde(default)]
    pub region: Region,
    /// Canonical profile URL derived from the handle.
    pub profile_url: String,
    /// Follower count; only the direct lookup path populates this.
    #[serde(default)]
    pub followers_count: u64,
    /// Blue-check status; only the direct lookup path populates this.
    #[serde(default)]
    pub verified: bool,
    /// RFC 3339 capture timestamp.
    pub scraped_at: String,
}

impl EnrichedRecord {
    /// Build a record from a handle and whatever location the enrichment
    /// call produced (empty on failure). Region is derived here so a record
    /// can never carry a location/region pair that disagrees.
    pub fn from_location(handle: &str, location: impl Into<String>) -> Self {
        let location = location.into();
        let region = classify(&location);
        Self {
            handle: handle.to_string(),
            display_name: String::new(),
            location,
            region,
            profile_url: profile_url_for(handle),
            followers_count: 0,
            verified: false,
            scraped_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Canonical profile URL for a handle.
pub fn profile_url_for(handle: &str) -> String {
    format!("https://x.com/{}", handle)
}

/// Mutable state of a single run.
#[derive(Debug, Default)]
pub struct RunState {
    /// Whether the run is still in progress.
    pub active: bool,
    /// Identifiers in order of first discovery. Append-only during
    /// collection; read-only afterwards.
    pub identifiers: Vec<String>,
    /// Enriched records by handle. At most one per identifier per run.
    pub records: HashMap<String, EnrichedRecord>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            active: true,
            identifiers: Vec::new(),
            records: HashMap::new(),
        }
    }
}

/// Cloneable handle to the run state. Writers lock briefly for each append
/// or insert; readers take snapshots.
#[derive(Debug, Clone, Default)]
pub struct SharedRunState {
    inner: Arc<Mutex<RunState>>,
}

/// Point-in-time view of a run, for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub active: bool,
    pub collected: usize,
    pub enriched: usize,
}

impl SharedRunState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RunState::new())),
        }
    }

    /// Append a newly discovered identifier. Collector-only.
    pub fn push_identifier(&self, handle: &str) -> usize {
        let mut state = self.inner.lock().unwrap();
        state.identifiers.push(handle.to_string());
        state.identifiers.len()
    }

    /// Insert an enriched record. Fetcher-only. A later insert for the same
    /// handle overwrites, though within one run each handle is processed
    /// exactly once.
    pub fn insert_record(&self, record: EnrichedRecord) -> usize {
        let mut state = self.inner.lock().unwrap();
        state.records.insert(record.handle.clone(), record);
        state.records.len()
    }

    /// Snapshot of the identifier sequence in discovery order.
    pub fn identifiers(&self) -> Vec<String> {
        self.inner.lock().unwrap().identifiers.clone()
    }

    /// Snapshot of all records, ordered by identifier discovery order.
    pub fn records_in_order(&self) -> Vec<EnrichedRecord> {
        let state = self.inner.lock().unwrap();
        state
            .identifiers
            .iter()
            .filter_map(|h| state.records.get(h).cloned())
            .collect()
    }

    pub fn status(&self) -> RunStatus {
        let state = self.inner.lock().unwrap();
        RunStatus {
            active: state.active,
            collected: state.identifiers.len(),
            enriched: state.records.len(),
        }
    }

    /// Mark the run finished. Called once, by the run owner, on stop or
    /// natural completion.
    pub fn finish(&self) {
        self.inner.lock().unwrap().active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    #[test]
    fn test_record_from_location_derives_region() {
        let record = EnrichedRecord::from_location("alice", "Berlin".to_string());
        assert_eq!(record.handle, "alice");
        assert_eq!(record.region, Region::Europe);
        assert_eq!(record.profile_url, "https://x.com/alice");
        assert_eq!(record.followers_count, 0);
        assert!(!record.verified);
        assert!(!record.scraped_at.is_empty());
    }

    #[test]
    fn test_record_from_empty_location_is_unknown() {
        let record = EnrichedRecord::from_location("bob", String::new());
        assert_eq!(record.region, Region::Unknown);
        assert!(record.location.is_empty());
    }

    #[test]
    fn test_run_state_lifecycle() {
        let state = SharedRunState::new();
        assert!(state.status().active);

        state.push_identifier("alice");
        state.push_identifier("bob");
        assert_eq!(state.status().collected, 2);

        state.insert_record(EnrichedRecord::from_location("bob", "Tokyo".to_string()));
        assert_eq!(state.status().enriched, 1);

        state.finish();
        assert!(!state.status().active);
    }

    #[test]
    fn test_records_in_order_follows_discovery_order() {
        let state = SharedRunState::new();
        for h in ["c", "a", "b"] {
            state.push_identifier(h);
        }
        // Insert out of order
        for h in ["a", "b", "c"] {
            state.insert_record(EnrichedRecord::from_location(h, String::new()));
        }
        let ordered: Vec<String> = state
            .records_in_order()
            .into_iter()
            .map(|r| r.handle)
            .collect();
        assert_eq!(ordered, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_insert_overwrites_same_handle() {
        let state = SharedRunState::new();
        state.push_identifier("a");
        state.insert_record(EnrichedRecord::from_location("a", String::new()));
        state.insert_record(EnrichedRecord::from_location("a", "Paris".to_string()));
        let records = state.records_in_order();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].region, Region::Europe);
    }
}
