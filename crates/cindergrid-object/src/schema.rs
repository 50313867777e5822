//! Per-type schema: transition tables and upgrade chains.
//!
//! Concrete entity types describe themselves with a [`TypeSpec`]; behavioral
//! differences between types are expressed here and in iteration filters,
//! never by overriding the mutation logic itself.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use cindergrid_store::KvStore;

use crate::error::ObjectResult;

/// Allowed state transitions for a concrete type.
///
/// The key `None` covers an object that has never had a state set. Absence
/// of an edge forbids the transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    edges: HashMap<Option<String>, HashSet<String>>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the allowed targets for a source state (builder style).
    pub fn edge(mut self, from: Option<&str>, targets: &[&str]) -> Self {
        self.edges
            .entry(from.map(String::from))
            .or_default()
            .extend(targets.iter().map(|t| t.to_string()));
        self
    }

    pub fn allows(&self, from: Option<&str>, to: &str) -> bool {
        self.edges
            .get(&from.map(String::from))
            .is_some_and(|targets| targets.contains(to))
    }
}

/// One step of a type's upgrade chain.
///
/// `apply` rewrites the static record in place and must advance its
/// `version` field. Steps are pure transforms except where a schema change
/// also requires patching dependent records through the store.
pub struct UpgradeStep {
    pub from_version: u32,
    pub apply: fn(&mut Value, &dyn KvStore) -> ObjectResult<()>,
}

/// Everything the object model needs to know about a concrete type.
pub struct TypeSpec {
    pub object_type: &'static str,
    pub current_version: u32,
    /// A type with no table can never change state. This is deliberate:
    /// an incompletely-wired type fails loudly instead of drifting.
    pub state_targets: Option<TransitionTable>,
    /// Ordered by source version; applied repeatedly at load time.
    pub upgrade_chain: Vec<UpgradeStep>,
    /// High-churn attributes whose writes do not emit change events.
    pub event_exempt_attributes: &'static [&'static str],
}
