//! Deduplicator (spec §4.5): SHA-224 content-digest cache with sliding
//! last-seen eviction, bypassed entirely by a fixed set of "always pass"
//! product types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::digest::digest_value;
use crate::normalize::Record;

#[derive(Default)]
pub struct Deduplicator {
    seen: HashMap<String, DateTime<Utc>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `record` should be emitted: either its type always
    /// passes the cache, or its digest has not been seen (and is now
    /// recorded as last_seen = `now`).
    pub fn admit(&mut self, record: &Record, now: DateTime<Utc>) -> bool {
        if record.always_passes_dedup() {
            return true;
        }

        let value = serde_json::to_value(record).expect("Record serializes");
        let digest = digest_value(&value);

        if self.seen.contains_key(&digest) {
            false
        } else {
            self.seen.insert(digest, now);
            true
        }
    }

    /// Periodic sweep (spec §4.5 `expunge_interval`): remove entries not
    /// seen within `expire_msg_time` minutes.
    pub fn expunge(&mut self, now: DateTime<Utc>, expire_msg_time_minutes: i64) {
        self.seen.retain(|_, last_seen| (now - *last_seen).num_minutes() < expire_msg_time_minutes);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_metar(contents: &str) -> Record {
        Record::Metar {
            unique_name: "KIND".to_string(),
            insert_time: "2024-06-11T04:57:00Z".to_string(),
            expiration_time: "2024-06-11T06:54:00Z".to_string(),
            station: "KIND".to_string(),
            observation_time: "2024-06-11T04:54:00Z".to_string(),
            contents: contents.to_string(),
        }
    }

    #[test]
    fn admits_once_then_suppresses_duplicate() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let mut dedup = Deduplicator::new();
        let record = sample_metar("METAR KIND 110454Z");
        assert!(dedup.admit(&record, now));
        assert!(!dedup.admit(&record, now));
    }

    #[test]
    fn differing_content_is_admitted_separately() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let mut dedup = Deduplicator::new();
        assert!(dedup.admit(&sample_metar("A"), now));
        assert!(dedup.admit(&sample_metar("B"), now));
    }

    #[test]
    fn expunge_drops_stale_entries() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let mut dedup = Deduplicator::new();
        dedup.admit(&sample_metar("A"), now);
        assert_eq!(dedup.len(), 1);
        dedup.expunge(now + chrono::Duration::minutes(30), 20);
        assert_eq!(dedup.len(), 0);
    }

    #[test]
    fn always_pass_types_bypass_cache() {
        let now = Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let mut dedup = Deduplicator::new();
        let record = Record::FisbUnavailable {
            unique_name: "FIS_B_UNAVAILABLE".to_string(),
            insert_time: "2024-06-11T05:00:00Z".to_string(),
            expiration_time: "2024-06-11T05:20:00Z".to_string(),
            issued_time: None,
            centers: vec![],
        };
        assert!(dedup.admit(&record, now));
        assert!(dedup.admit(&record, now));
        assert_eq!(dedup.len(), 0);
    }
}
