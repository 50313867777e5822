//! In-memory substrate backend.
//!
//! A `BTreeMap` behind a mutex: ordered prefix scans for free, no
//! persistence. Used by tests and by in-memory-only objects.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::store::KvStore;

/// Ephemeral in-memory substrate.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KvStore for MemoryStore {
    fn create_raw(&self, path: &str, value: &Value) -> StoreResult<bool> {
        let encoded =
            serde_json::to_string(value).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let mut records = self.records();
        if records.contains_key(path) {
            return Ok(false);
        }
        records.insert(path.to_string(), encoded);
        Ok(true)
    }

    fn get_raw(&self, path: &str) -> StoreResult<Option<Value>> {
        match self.records().get(path) {
            Some(encoded) => {
                let value = serde_json::from_str(encoded)
                    .map_err(|e| StoreError::Deserialize(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn put_raw(&self, path: &str, value: &Value) -> StoreResult<()> {
        let encoded =
            serde_json::to_string(value).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.records().insert(path.to_string(), encoded);
        Ok(())
    }

    fn delete_raw(&self, path: &str) -> StoreResult<()> {
        self.records().remove(path);
        Ok(())
    }

    fn get_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>> {
        let records = self.records();
        let mut results = Vec::new();
        for (key, encoded) in records.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            let value = serde_json::from_str(encoded)
                .map_err(|e| StoreError::Deserialize(e.to_string()))?;
            results.push((key.clone(), value));
        }
        Ok(results)
    }

    fn delete_prefix(&self, prefix: &str) -> StoreResult<()> {
        let mut records = self.records();
        let keys: Vec<String> = records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in keys {
            records.remove(&key);
        }
        Ok(())
    }
}
