//! Store interface (spec §6): a keyed document collection the harvester
//! upserts into. `fisb-core` ships a default in-memory implementation so
//! the CLI and tests run without an external service, the way the teacher
//! gates a real backend behind a trait and a feature flag (`rtlsdr`,
//! `redis`) while a default always-available `Source` covers local use.

use std::collections::HashMap;

use crate::error::StoreError;

pub trait Store {
    fn upsert(&mut self, collection: &str, key: &str, doc: serde_json::Value) -> Result<(), StoreError>;
    fn delete(&mut self, collection: &str, key: &str) -> Result<(), StoreError>;
    fn find_one(&self, collection: &str, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    fn find_many(
        &self,
        collection: &str,
        filter: &dyn Fn(&serde_json::Value) -> bool,
    ) -> Result<Vec<serde_json::Value>, StoreError>;
    fn delete_many(
        &mut self,
        collection: &str,
        filter: &dyn Fn(&serde_json::Value) -> bool,
    ) -> Result<usize, StoreError>;
}

/// `HashMap`-backed default `Store` (spec §6 "persisted state layout",
/// collection `MSG`).
#[derive(Default)]
pub struct MemoryStore {
    collections: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn upsert(&mut self, collection: &str, key: &str, doc: serde_json::Value) -> Result<(), StoreError> {
        self.collections.entry(collection.to_string()).or_default().insert(key.to_string(), doc);
        Ok(())
    }

    fn delete(&mut self, collection: &str, key: &str) -> Result<(), StoreError> {
        if let Some(coll) = self.collections.get_mut(collection) {
            coll.remove(key);
        }
        Ok(())
    }

    fn find_one(&self, collection: &str, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.collections.get(collection).and_then(|coll| coll.get(key).cloned()))
    }

    fn find_many(
        &self,
        collection: &str,
        filter: &dyn Fn(&serde_json::Value) -> bool,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .map(|coll| coll.values().filter(|v| filter(v)).cloned().collect())
            .unwrap_or_default())
    }

    fn delete_many(
        &mut self,
        collection: &str,
        filter: &dyn Fn(&serde_json::Value) -> bool,
    ) -> Result<usize, StoreError> {
        let Some(coll) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let keys: Vec<String> = coll.iter().filter(|(_, v)| filter(v)).map(|(k, _)| k.clone()).collect();
        for key in &keys {
            coll.remove(key);
        }
        Ok(keys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upsert_then_find_one() {
        let mut store = MemoryStore::new();
        store.upsert("MSG", "METAR-KIND", json!({"type": "METAR"})).unwrap();
        let found = store.find_one("MSG", "METAR-KIND").unwrap();
        assert_eq!(found, Some(json!({"type": "METAR"})));
    }

    #[test]
    fn delete_many_matches_filter() {
        let mut store = MemoryStore::new();
        store.upsert("MSG", "A", json!({"expire": 1})).unwrap();
        store.upsert("MSG", "B", json!({"expire": 2})).unwrap();
        let removed = store.delete_many("MSG", &|v| v["expire"] == 1).unwrap();
        assert_eq!(removed, 1);
        assert!(store.find_one("MSG", "A").unwrap().is_none());
        assert!(store.find_one("MSG", "B").unwrap().is_some());
    }
}
