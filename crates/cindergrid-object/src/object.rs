//! The distributed object: identity, attributes, lifecycle.
//!
//! Every cluster entity is an [`Object`]: an immutable static record keyed
//! by uuid, a set of independently-lockable mutable attributes, a validated
//! state machine, and an append-only event log. All persistence goes through
//! the substrate; all mutual exclusion goes through its lease locks. Nothing
//! here retries: the first failure is the caller's to handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use cinder_core::CinderConfig;
use cindergrid_store::{KvStore, LockGuard, acquire_lock};

use crate::error::{ObjectError, ObjectResult};
use crate::events::ObjectEvent;
use crate::schema::TypeSpec;
use crate::state::{STATE_DELETED, State};

/// Attributes whose writes never emit a change event because they carry
/// their own event semantics.
const FRAMEWORK_EXEMPT_ATTRIBUTES: &[&str] = &["state", "error"];

/// A handle to one distributed object.
///
/// Cheap to clone; the static record is cached in the handle, everything
/// mutable is read through the substrate on demand.
#[derive(Clone)]
pub struct Object {
    uuid: Uuid,
    spec: &'static TypeSpec,
    store: Arc<dyn KvStore>,
    config: CinderConfig,
    static_values: Value,
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("uuid", &self.uuid)
            .field("config", &self.config)
            .field("static_values", &self.static_values)
            .finish_non_exhaustive()
    }
}

impl Object {
    /// Write the immutable record exactly once and emit a creation event.
    ///
    /// The payload gains `uuid` and `version` fields; everything else in it
    /// is the concrete type's business.
    pub fn create(
        store: Arc<dyn KvStore>,
        config: CinderConfig,
        spec: &'static TypeSpec,
        uuid: Uuid,
        mut static_payload: Value,
    ) -> ObjectResult<Object> {
        let map = static_payload
            .as_object_mut()
            .ok_or_else(|| ObjectError::Malformed("static payload must be a JSON object".into()))?;
        map.insert("uuid".to_string(), json!(uuid.to_string()));
        map.insert("version".to_string(), json!(spec.current_version));

        let created = store.create(spec.object_type, None, &uuid.to_string(), &static_payload)?;
        if !created {
            return Err(ObjectError::DuplicateObject {
                object_type: spec.object_type.to_string(),
                uuid: uuid.to_string(),
            });
        }

        let object = Object {
            uuid,
            spec,
            store,
            config,
            static_values: static_payload,
        };
        debug!(object_type = spec.object_type, %uuid, "object created");
        object.add_event("object created", None)?;
        Ok(object)
    }

    /// Fetch an object, upgrading its record through the type's chain when
    /// the stored schema version is behind.
    ///
    /// Returns `Ok(None)` when no record exists. A stored version the chain
    /// cannot reach is a fatal schema error.
    pub fn load(
        store: Arc<dyn KvStore>,
        config: CinderConfig,
        spec: &'static TypeSpec,
        uuid: Uuid,
    ) -> ObjectResult<Option<Object>> {
        let Some(record) = store.get(spec.object_type, None, &uuid.to_string())? else {
            return Ok(None);
        };
        Ok(Some(Object::from_record(store, config, spec, record)?))
    }

    /// Build a handle from an already-fetched static record, applying the
    /// upgrade chain if needed. Used by `load` and by filtered iteration.
    pub(crate) fn from_record(
        store: Arc<dyn KvStore>,
        config: CinderConfig,
        spec: &'static TypeSpec,
        mut record: Value,
    ) -> ObjectResult<Object> {
        let uuid_str = record
            .get("uuid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ObjectError::Malformed("static record has no uuid".into()))?;
        let uuid = Uuid::parse_str(uuid_str)
            .map_err(|e| ObjectError::Malformed(format!("bad uuid in static record: {e}")))?;

        let mut version = record_version(&record);
        if version != spec.current_version {
            while version != spec.current_version {
                let step = spec
                    .upgrade_chain
                    .iter()
                    .find(|s| s.from_version == version)
                    .ok_or(ObjectError::UnsupportedVersion {
                        object_type: spec.object_type.to_string(),
                        uuid: uuid.to_string(),
                        version,
                    })?;
                (step.apply)(&mut record, store.as_ref())?;

                let reached = record_version(&record);
                if reached == version {
                    // The step failed to advance the version field; treat as
                    // an unreachable schema rather than looping forever.
                    return Err(ObjectError::UnsupportedVersion {
                        object_type: spec.object_type.to_string(),
                        uuid: uuid.to_string(),
                        version,
                    });
                }
                version = reached;
            }
            store.put(spec.object_type, None, &uuid.to_string(), &record)?;
            debug!(
                object_type = spec.object_type,
                %uuid,
                version,
                "upgraded object record"
            );
        }

        Ok(Object {
            uuid,
            spec,
            store,
            config,
            static_values: record,
        })
    }

    // ── Identity and static values ─────────────────────────────────

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn object_type(&self) -> &'static str {
        self.spec.object_type
    }

    pub fn version(&self) -> u32 {
        record_version(&self.static_values)
    }

    pub fn static_values(&self) -> &Value {
        &self.static_values
    }

    /// A string field of the static record, if present.
    pub fn static_str(&self, field: &str) -> Option<&str> {
        self.static_values.get(field).and_then(|v| v.as_str())
    }

    // ── Attributes ─────────────────────────────────────────────────

    fn attribute_type(&self) -> String {
        format!("attribute/{}", self.spec.object_type)
    }

    /// Read an attribute. Never fails on absence: missing attributes read
    /// as an empty JSON object.
    pub fn attribute(&self, name: &str) -> ObjectResult<Value> {
        let value = self
            .store
            .get(&self.attribute_type(), Some(&self.uuid.to_string()), name)?;
        Ok(value.unwrap_or_else(|| Value::Object(Default::default())))
    }

    /// Replace an attribute sub-record.
    ///
    /// Emits a redacted "attribute changed" event (the name, never the
    /// value) unless the attribute is in the type's high-churn exemption
    /// set.
    pub fn set_attribute(&self, name: &str, value: &Value) -> ObjectResult<()> {
        self.store
            .put(&self.attribute_type(), Some(&self.uuid.to_string()), name, value)?;
        if !self.spec.event_exempt_attributes.contains(&name)
            && !FRAMEWORK_EXEMPT_ATTRIBUTES.contains(&name)
        {
            self.add_event("attribute changed", Some(json!({ "attribute": name })))?;
        }
        Ok(())
    }

    pub fn delete_attribute(&self, name: &str) -> ObjectResult<()> {
        self.store
            .delete(&self.attribute_type(), Some(&self.uuid.to_string()), name)?;
        Ok(())
    }

    /// Append an item to a list attribute under its lock. Idempotent:
    /// returns false without writing when the item is already present.
    pub fn add_to_list_attribute(&self, name: &str, item: &Value) -> ObjectResult<bool> {
        let _guard = self.lock_attr(name, "add to list attribute")?;
        let mut items = self.list_attribute(name)?;
        if items.contains(item) {
            return Ok(false);
        }
        items.push(item.clone());
        self.set_attribute(name, &Value::Array(items))?;
        Ok(true)
    }

    /// Remove an item from a list attribute under its lock. Idempotent:
    /// returns false without writing when the item is absent.
    pub fn remove_from_list_attribute(&self, name: &str, item: &Value) -> ObjectResult<bool> {
        let _guard = self.lock_attr(name, "remove from list attribute")?;
        let mut items = self.list_attribute(name)?;
        let before = items.len();
        items.retain(|i| i != item);
        if items.len() == before {
            return Ok(false);
        }
        self.set_attribute(name, &Value::Array(items))?;
        Ok(true)
    }

    /// A list attribute's items; absent or non-list reads as empty.
    pub fn list_attribute(&self, name: &str) -> ObjectResult<Vec<Value>> {
        match self.attribute(name)? {
            Value::Array(items) => Ok(items),
            _ => Ok(Vec::new()),
        }
    }

    // ── State ──────────────────────────────────────────────────────

    /// The current state, synthesizing the zero value when none was set.
    pub fn state(&self) -> ObjectResult<State> {
        let value = self.attribute("state")?;
        if value.as_object().is_some_and(|m| m.is_empty()) {
            return Ok(State::zero());
        }
        serde_json::from_value(value)
            .map_err(|e| ObjectError::Malformed(format!("bad state record: {e}")))
    }

    /// Move the object to a new state.
    ///
    /// Re-reads the current state inside the state lock (closing the
    /// lost-update window), no-ops when the value is unchanged, refuses any
    /// transition out of `deleted`, and validates the edge against the
    /// type's table. A successful transition clears the error message.
    pub fn set_state(&self, new_value: &str) -> ObjectResult<()> {
        let _guard = self.lock_attr("state", "state update")?;
        let orig = self.state()?;

        if orig.value.as_deref() == Some(new_value) {
            return Ok(());
        }

        if orig.value.as_deref() == Some(STATE_DELETED) {
            warn!(
                object_type = self.spec.object_type,
                uuid = %self.uuid,
                new_state = new_value,
                "objects do not undelete"
            );
            return Err(self.invalid_transition(&orig, new_value));
        }

        let table = self
            .spec
            .state_targets
            .as_ref()
            .ok_or_else(|| ObjectError::NoTransitionsDefined(self.spec.object_type.to_string()))?;
        if !table.allows(orig.value.as_deref(), new_value) {
            return Err(self.invalid_transition(&orig, new_value));
        }

        let new_state = State::new(new_value, epoch_secs());
        let encoded = serde_json::to_value(&new_state)
            .map_err(|e| ObjectError::Malformed(e.to_string()))?;
        self.set_attribute("state", &encoded)?;
        self.add_event(
            "state changed",
            Some(json!({ "from": orig.value, "to": new_value })),
        )?;
        self.set_error(None)?;
        Ok(())
    }

    fn invalid_transition(&self, from: &State, to: &str) -> ObjectError {
        ObjectError::InvalidTransition {
            object_type: self.spec.object_type.to_string(),
            uuid: self.uuid.to_string(),
            from: from.value.clone(),
            to: to.to_string(),
        }
    }

    // ── Error message ──────────────────────────────────────────────

    pub fn error_message(&self) -> ObjectResult<Option<String>> {
        let value = self.attribute("error")?;
        Ok(value
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from))
    }

    /// Record an error message.
    ///
    /// A non-empty message is only permitted while the current state
    /// denotes an error condition; this pairs error text to error state so
    /// a recovery transition cannot leave a stale message behind. Clearing
    /// (`None`) is always allowed.
    pub fn set_error(&self, message: Option<&str>) -> ObjectResult<()> {
        if message.is_some() {
            let state = self.state()?;
            if !state.denotes_error() {
                return Err(ObjectError::NotInErrorState {
                    object_type: self.spec.object_type.to_string(),
                    state: state.value,
                });
            }
        }
        self.set_attribute("error", &json!({ "message": message }))?;
        Ok(())
    }

    // ── Events ─────────────────────────────────────────────────────

    fn event_type(&self) -> String {
        format!("event/{}", self.spec.object_type)
    }

    /// Append `{timestamp, message, extra}` to this object's event log.
    pub fn add_event(&self, message: &str, extra: Option<Value>) -> ObjectResult<()> {
        let event = ObjectEvent {
            timestamp: epoch_secs(),
            message: message.to_string(),
            extra,
        };
        let encoded =
            serde_json::to_value(&event).map_err(|e| ObjectError::Malformed(e.to_string()))?;
        self.store.put(
            &self.event_type(),
            Some(&self.uuid.to_string()),
            &event_key(),
            &encoded,
        )?;
        Ok(())
    }

    /// This object's event log, oldest first.
    pub fn events(&self) -> ObjectResult<Vec<ObjectEvent>> {
        let mut events = Vec::new();
        for (_, value) in self
            .store
            .get_all(&self.event_type(), Some(&self.uuid.to_string()), None)?
        {
            let event: ObjectEvent = serde_json::from_value(value)
                .map_err(|e| ObjectError::Malformed(format!("bad event record: {e}")))?;
            events.push(event);
        }
        Ok(events)
    }

    // ── Locks ──────────────────────────────────────────────────────

    /// The whole-object lock.
    pub fn lock(&self, operation: &str) -> ObjectResult<LockGuard> {
        Ok(acquire_lock(
            self.store.clone(),
            self.spec.object_type,
            None,
            &self.uuid.to_string(),
            &self.config.node_name,
            operation,
            Duration::from_secs(self.config.lock_ttl_secs),
            Duration::from_secs(self.config.lock_attempt_timeout_secs),
        )?)
    }

    /// A named sub-lock of this object (for example a reservation table).
    pub fn lock_sub(&self, subtype: &str, operation: &str) -> ObjectResult<LockGuard> {
        Ok(acquire_lock(
            self.store.clone(),
            self.spec.object_type,
            Some(subtype),
            &self.uuid.to_string(),
            &self.config.node_name,
            operation,
            Duration::from_secs(self.config.lock_ttl_secs),
            Duration::from_secs(self.config.lock_attempt_timeout_secs),
        )?)
    }

    /// The lock for a single attribute. Scope is (object, attribute name)
    /// so unrelated attributes of one object mutate concurrently.
    pub fn lock_attr(&self, name: &str, operation: &str) -> ObjectResult<LockGuard> {
        Ok(acquire_lock(
            self.store.clone(),
            &self.attribute_type(),
            Some(&self.uuid.to_string()),
            name,
            &self.config.node_name,
            operation,
            Duration::from_secs(self.config.lock_ttl_secs),
            Duration::from_secs(self.config.lock_attempt_timeout_secs),
        )?)
    }

    // ── Deletion ───────────────────────────────────────────────────

    /// Physically remove the record, attributes, lock records, and events.
    ///
    /// Distinct from the soft `deleted` transition; intended for cluster
    /// maintenance reaping well after the object left service.
    pub fn hard_delete(self) -> ObjectResult<()> {
        let uuid = self.uuid.to_string();
        self.store.delete(self.spec.object_type, None, &uuid)?;
        self.store.delete_all(&self.attribute_type(), Some(&uuid))?;
        self.store.delete_all(&self.event_type(), Some(&uuid))?;

        // Lock records: the attribute locks live under one prefix, the
        // object and sub-locks end with this uuid under the type prefix.
        let lock_prefix = cindergrid_store::LOCK_PREFIX;
        self.store.delete_prefix(&format!(
            "{lock_prefix}{}",
            cindergrid_store::record_path(&self.attribute_type(), Some(&uuid), None)
        ))?;
        let type_locks = format!(
            "{lock_prefix}{}",
            cindergrid_store::record_path(self.spec.object_type, None, None)
        );
        for (path, _) in self.store.get_prefix(&type_locks)? {
            if path.ends_with(&format!("/{uuid}")) {
                self.store.delete_raw(&path)?;
            }
        }

        debug!(
            object_type = self.spec.object_type,
            %uuid,
            "object hard deleted"
        );
        Ok(())
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.spec.object_type, self.uuid)
    }
}

fn record_version(record: &Value) -> u32 {
    record.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Event log keys must sort chronologically; a process-local sequence
/// breaks ties within one microsecond.
fn event_key() -> String {
    static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64;
    format!(
        "{micros:016}-{:06}",
        EVENT_SEQ.fetch_add(1, Ordering::Relaxed) % 1_000_000
    )
}
