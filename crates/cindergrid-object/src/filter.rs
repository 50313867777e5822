//! Filtered iteration over objects of a type.
//!
//! Per-type query behavior is expressed as small composable filter values
//! combined by conjunction, not by subclassing the object itself. A filter
//! is a single-capability `matches` check; iteration loads every record of
//! the type and yields the objects passing every filter.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use cinder_core::CinderConfig;
use cindergrid_store::KvStore;

use crate::error::ObjectResult;
use crate::object::Object;
use crate::schema::TypeSpec;
use crate::state::ACTIVE_STATES;

/// A predicate over one object.
pub trait Filter {
    fn matches(&self, object: &Object) -> ObjectResult<bool>;
}

/// Matches objects whose state value is in a fixed set.
pub struct StateFilter {
    states: HashSet<String>,
}

impl StateFilter {
    pub fn new(states: &[&str]) -> Self {
        Self {
            states: states.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Filter for StateFilter {
    fn matches(&self, object: &Object) -> ObjectResult<bool> {
        let state = object.state()?;
        Ok(state
            .value
            .as_deref()
            .is_some_and(|v| self.states.contains(v)))
    }
}

/// The usual cost prefilter: everything not yet deleted.
pub fn active_states_filter() -> StateFilter {
    StateFilter::new(ACTIVE_STATES)
}

/// Matches objects in a namespace. The `system` namespace sees everything.
pub struct NamespaceFilter {
    namespace: String,
}

impl NamespaceFilter {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
        }
    }
}

impl Filter for NamespaceFilter {
    fn matches(&self, object: &Object) -> ObjectResult<bool> {
        if self.namespace == "system" {
            return Ok(true);
        }
        Ok(object.static_str("namespace") == Some(self.namespace.as_str()))
    }
}

/// Matches objects whose state was last set more than `min_age_secs` ago.
pub struct StateAgeFilter {
    min_age_secs: u64,
}

impl StateAgeFilter {
    pub fn new(min_age_secs: u64) -> Self {
        Self { min_age_secs }
    }
}

impl Filter for StateAgeFilter {
    fn matches(&self, object: &Object) -> ObjectResult<bool> {
        let state = object.state()?;
        Ok(state.age_secs(epoch_secs()) > self.min_age_secs)
    }
}

/// Scan all records of a type and return the objects passing every filter.
///
/// Records are upgraded through the type's chain as they are touched, the
/// same as a point load.
pub fn iterate(
    store: &Arc<dyn KvStore>,
    config: &CinderConfig,
    spec: &'static TypeSpec,
    filters: &[&dyn Filter],
) -> ObjectResult<Vec<Object>> {
    let mut objects = Vec::new();
    for (_, record) in store.get_all(spec.object_type, None, None)? {
        let object = Object::from_record(store.clone(), config.clone(), spec, record)?;
        let mut keep = true;
        for filter in filters {
            if !filter.matches(&object)? {
                keep = false;
                break;
            }
        }
        if keep {
            objects.push(object);
        }
    }
    Ok(objects)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
