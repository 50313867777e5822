//! The `KvStore` contract.
//!
//! Backends implement the six raw path primitives; the typed helpers route
//! through [`record_path`](crate::path::record_path) and are shared by all
//! backends. Values are JSON documents throughout.

use serde_json::Value;

use crate::error::StoreResult;
use crate::path::record_path;

/// The substrate contract every CinderGrid component persists through.
///
/// `create_raw` is the exactly-once primitive: it returns false and writes
/// nothing when the key already exists. Uniqueness races (object creation,
/// lock acquisition) all reduce to it.
pub trait KvStore: Send + Sync {
    /// Write `value` at `path` only if the key does not exist yet.
    /// Returns true when the write happened.
    fn create_raw(&self, path: &str, value: &Value) -> StoreResult<bool>;

    fn get_raw(&self, path: &str) -> StoreResult<Option<Value>>;

    fn put_raw(&self, path: &str, value: &Value) -> StoreResult<()>;

    fn delete_raw(&self, path: &str) -> StoreResult<()>;

    /// All records whose key starts with `prefix`, ordered by key ascending.
    fn get_prefix(&self, prefix: &str) -> StoreResult<Vec<(String, Value)>>;

    fn delete_prefix(&self, prefix: &str) -> StoreResult<()>;

    // ── Typed helpers over the path scheme ─────────────────────────

    /// Exactly-once creation of a typed record.
    fn create(
        &self,
        object_type: &str,
        subtype: Option<&str>,
        name: &str,
        value: &Value,
    ) -> StoreResult<bool> {
        self.create_raw(&record_path(object_type, subtype, Some(name)), value)
    }

    fn get(&self, object_type: &str, subtype: Option<&str>, name: &str) -> StoreResult<Option<Value>> {
        self.get_raw(&record_path(object_type, subtype, Some(name)))
    }

    fn put(
        &self,
        object_type: &str,
        subtype: Option<&str>,
        name: &str,
        value: &Value,
    ) -> StoreResult<()> {
        self.put_raw(&record_path(object_type, subtype, Some(name)), value)
    }

    fn delete(&self, object_type: &str, subtype: Option<&str>, name: &str) -> StoreResult<()> {
        self.delete_raw(&record_path(object_type, subtype, Some(name)))
    }

    /// Ordered scan of all records of a type, optionally narrowed to a
    /// key prefix within it.
    fn get_all(
        &self,
        object_type: &str,
        subtype: Option<&str>,
        prefix: Option<&str>,
    ) -> StoreResult<Vec<(String, Value)>> {
        self.get_prefix(&record_path(object_type, subtype, prefix))
    }

    fn delete_all(&self, object_type: &str, subtype: Option<&str>) -> StoreResult<()> {
        self.delete_prefix(&record_path(object_type, subtype, None))
    }
}
