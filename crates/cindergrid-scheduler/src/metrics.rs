//! Externally-published per-node metrics.
//!
//! A publisher on every node periodically writes a snapshot under
//! `metrics/{node}`. The scheduler only reads; it never owns the numbers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use cindergrid_store::KvStore;

use crate::error::SchedulerResult;

/// Record type the metrics publisher writes under.
pub const METRICS_TYPE: &str = "metrics";

/// One node's resource snapshot.
///
/// Memory quantities are MiB, disk is bytes. Unknown fields in a snapshot
/// are ignored; missing fields read as zero, which fails closed (a node
/// reporting nothing schedules nothing).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct NodeMetrics {
    /// Schedulable physical cores on the node.
    pub cpu_available: u64,
    /// Hard vCPU ceiling for a single workload.
    pub cpu_max_per_instance: u64,
    /// vCPUs already claimed by workloads on the node.
    pub cpu_total_instance_vcpus: u64,
    /// Free RAM, MiB.
    pub memory_available: u64,
    /// Total RAM, MiB.
    pub memory_max: u64,
    /// RAM actually consumed by workloads, MiB.
    pub memory_total_instance_actual: u64,
    /// Free space on the workload disk pool, bytes.
    pub disk_free_instances: u64,
    /// Whether this node runs workloads at all.
    pub is_hypervisor: bool,
}

/// Read the latest snapshot for every node.
///
/// Publishers wrap the snapshot as `{"metrics": {...}}`; nodes with an
/// unparseable record are skipped with a warning rather than failing the
/// whole refresh.
pub fn read_node_metrics(store: &dyn KvStore) -> SchedulerResult<HashMap<String, NodeMetrics>> {
    let mut by_node = HashMap::new();
    for (key, value) in store.get_all(METRICS_TYPE, None, None)? {
        let Some(node) = key.rsplit('/').next().filter(|n| !n.is_empty()) else {
            continue;
        };
        let snapshot = value.get("metrics").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<NodeMetrics>(snapshot) {
            Ok(metrics) => {
                by_node.insert(node.to_string(), metrics);
            }
            Err(e) => warn!(node, error = %e, "skipping unparseable metrics snapshot"),
        }
    }
    Ok(by_node)
}
