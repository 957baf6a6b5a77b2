//! Harvester (spec §4.7): upsert-if-changed persistence, CRL completeness
//! annotation, expiration sweeps, and image-tile lifecycle management.

pub mod image;
pub mod store;

pub use image::{BinsDict, ColorMap, ImageState, Renderer};
pub use store::{MemoryStore, Store};

use chrono::{DateTime, Utc};

use crate::digest::digest_value;
use crate::error::StoreError;
use crate::normalize::record::{CrlEntrySummary, Record};

const COLLECTION: &str = "MSG";

/// Tracks the last-persisted digest per key so upserts that would produce
/// identical content are skipped (spec §4.7 "compute a digest of the
/// persisted payload; if unchanged, ignore").
#[derive(Default)]
pub struct Harvester {
    last_digest: std::collections::HashMap<String, String>,
}

impl Harvester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a normalized record if its content digest changed since the
    /// last admission. Returns `true` if the store was actually written.
    pub fn upsert(&mut self, store: &mut dyn Store, record: &Record) -> Result<bool, StoreError> {
        let key = record.store_key();
        let value = serde_json::to_value(record).expect("Record serializes");
        let digest = digest_value(&value);

        if self.last_digest.get(&key) == Some(&digest) {
            return Ok(false);
        }

        store.upsert(COLLECTION, &key, value)?;
        self.last_digest.insert(key, digest);
        Ok(true)
    }

    /// Expiration sweep (spec §4.7 "Expiration sweep"): delete stored
    /// records whose `expiration_time` is at or before `now`.
    pub fn expire(&mut self, store: &mut dyn Store, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let now_str = crate::time::format_instant(now);
        let removed = store.delete_many(COLLECTION, &|doc| {
            doc.get("expiration_time").and_then(|v| v.as_str()).is_some_and(|exp| exp <= now_str.as_str())
        })?;
        Ok(removed)
    }

    /// Annotate a CRL's entries with completeness markers by checking the
    /// store for each identity's required parts (spec §4.7 "For every
    /// CRL-related record admission...").
    pub fn annotate_crl_completeness(
        &self,
        store: &dyn Store,
        product_type: &str,
        entries: &mut [CrlEntrySummary],
    ) -> Result<(), StoreError> {
        for entry in entries.iter_mut() {
            let key = format!("{product_type}-{}", entry.identity);
            let doc = store.find_one(COLLECTION, &key)?;
            entry.complete = match doc {
                Some(doc) => {
                    let has_contents = doc.get("contents").is_some();
                    let has_geometry = doc.get("geometry").and_then(|g| g.as_array()).is_some_and(|a| !a.is_empty());
                    match entry.content_tag {
                        crate::apdu::crl::ContentTag::TextOnly => has_contents,
                        crate::apdu::crl::ContentTag::GraphicsOnly => has_geometry,
                        crate::apdu::crl::ContentTag::TextAndGraphics => has_contents && has_geometry,
                    }
                }
                None => false,
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn repeated_identical_upsert_is_skipped() {
        let mut store = MemoryStore::new();
        let mut harvester = Harvester::new();
        let record = Record::ServiceStatus {
            unique_name: "1,2".to_string(),
            insert_time: "2024-06-11T05:00:00Z".to_string(),
            expiration_time: "2024-06-11T05:00:40Z".to_string(),
            station: "1,2".to_string(),
            traffic: vec![0xABCDEF],
        };
        assert!(harvester.upsert(&mut store, &record).unwrap());
        assert!(!harvester.upsert(&mut store, &record).unwrap());
    }

    #[test]
    fn expire_removes_past_due_records() {
        let mut store = MemoryStore::new();
        store
            .upsert("MSG", "METAR-KIND", json!({"expiration_time": "2024-06-11T00:00:00Z"}))
            .unwrap();
        let mut harvester = Harvester::new();
        let now = chrono::Utc.with_ymd_and_hms(2024, 6, 11, 5, 0, 0).unwrap();
        let removed = harvester.expire(&mut store, now).unwrap();
        assert_eq!(removed, 1);
    }
}
