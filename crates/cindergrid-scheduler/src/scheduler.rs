//! Placement decisions.
//!
//! Each stage narrows the candidate set; an empty result raises a
//! stage-specific error. The metrics cache is refreshed wholesale on
//! expiry, never mid-computation, so one decision always sees one
//! consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use cinder_core::{CinderConfig, GIB};
use cindergrid_object::{Object, iterate};
use cindergrid_store::KvStore;

use crate::error::{SchedulerError, SchedulerResult};
use crate::metrics::{NodeMetrics, read_node_metrics};
use crate::workload::{AFFINITY_DIMENSION, healthy_states_filter, workload_spec};

/// What a workload asks of a node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkloadRequirement {
    pub cpus: u64,
    pub memory_mb: u64,
    pub disk_gb: u64,
    /// Affinity weights: dimension, then tag, then signed weight. Only the
    /// `cpu` dimension influences placement.
    #[serde(default)]
    pub affinity: HashMap<String, HashMap<String, i64>>,
}

/// Chooses placement nodes for workloads.
///
/// Holds no lock across its decision; placement is advisory and the actual
/// resource claim happens at commit time, so a caller may need to retry
/// against different explicit candidates when a node rejects the workload.
pub struct Scheduler {
    store: Arc<dyn KvStore>,
    config: CinderConfig,
    metrics: HashMap<String, NodeMetrics>,
    metrics_updated: u64,
}

impl Scheduler {
    pub fn new(store: Arc<dyn KvStore>, config: CinderConfig) -> SchedulerResult<Self> {
        let mut scheduler = Self {
            store,
            config,
            metrics: HashMap::new(),
            metrics_updated: 0,
        };
        scheduler.refresh_metrics()?;
        Ok(scheduler)
    }

    /// Re-read every node's snapshot from the substrate.
    pub fn refresh_metrics(&mut self) -> SchedulerResult<()> {
        self.metrics = read_node_metrics(self.store.as_ref())?;
        self.metrics_updated = epoch_secs();
        debug!(nodes = self.metrics.len(), "metrics cache refreshed");
        Ok(())
    }

    /// Choose placement node(s) for a workload.
    ///
    /// With `explicit_candidates`, only those nodes are considered and each
    /// must be known to the metrics cache. Otherwise every hypervisor node
    /// is a candidate; the network-control node is excluded because it is
    /// not one. When `placing` is supplied, each narrowing stage leaves a
    /// breadcrumb event on it for post-hoc placement audit.
    pub fn place(
        &mut self,
        requirement: &WorkloadRequirement,
        explicit_candidates: Option<&[String]>,
        placing: Option<&Object>,
    ) -> SchedulerResult<Vec<String>> {
        let age = epoch_secs().saturating_sub(self.metrics_updated);
        if age > self.config.scheduler_cache_timeout_secs || self.metrics.is_empty() {
            self.refresh_metrics()?;
        }

        let mut candidates: Vec<String> = match explicit_candidates {
            Some(requested) => {
                for node in requested {
                    if !self.metrics.contains_key(node) {
                        return Err(SchedulerError::CandidateNotFound(node.clone()));
                    }
                }
                breadcrumb(placing, "schedule forced candidates", requested)?;
                requested.to_vec()
            }
            None => {
                let mut nodes: Vec<String> = self
                    .metrics
                    .iter()
                    .filter(|(_, m)| m.is_hypervisor)
                    .map(|(node, _)| node.clone())
                    .collect();
                nodes.sort();
                nodes
            }
        };
        breadcrumb(placing, "schedule initial candidates", &candidates)?;
        if candidates.is_empty() {
            return Err(SchedulerError::LowResource("No nodes with metrics".into()));
        }

        // Hard per-workload vCPU ceiling, independent of current load.
        candidates.retain(|node| {
            self.metrics
                .get(node)
                .is_some_and(|m| requirement.cpus <= m.cpu_max_per_instance)
        });
        breadcrumb(placing, "schedule within vcpu limit", &candidates)?;
        if candidates.is_empty() {
            return Err(SchedulerError::LowResource(
                "Requested vCPUs exceeds vCPU limit".into(),
            ));
        }

        candidates.retain(|node| {
            self.metrics
                .get(node)
                .is_some_and(|m| self.has_sufficient_cpu(requirement.cpus, m))
        });
        breadcrumb(placing, "schedule have enough idle cpu", &candidates)?;
        if candidates.is_empty() {
            return Err(SchedulerError::LowResource(
                "No nodes with enough idle CPU".into(),
            ));
        }

        candidates.retain(|node| {
            self.metrics
                .get(node)
                .is_some_and(|m| self.has_sufficient_ram(requirement.memory_mb, m))
        });
        breadcrumb(placing, "schedule have enough idle ram", &candidates)?;
        if candidates.is_empty() {
            return Err(SchedulerError::LowResource(
                "No nodes with enough idle RAM".into(),
            ));
        }

        candidates.retain(|node| {
            self.metrics
                .get(node)
                .is_some_and(|m| self.has_sufficient_disk(requirement.disk_gb, m))
        });
        breadcrumb(placing, "schedule have enough idle disk", &candidates)?;
        if candidates.is_empty() {
            return Err(SchedulerError::LowResource(
                "No nodes with enough disk space".into(),
            ));
        }

        // Affinity is a preference ranking, never an eliminator: only the
        // max-score nodes survive, and a tie keeps them all.
        if let Some(weights) = requirement.affinity.get(AFFINITY_DIMENSION) {
            if !weights.is_empty() {
                let scores = self.affinity_scores(weights, &candidates, placing)?;
                breadcrumb_scores(placing, &scores)?;
                let best = candidates
                    .iter()
                    .map(|node| scores.get(node).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                candidates.retain(|node| scores.get(node).copied().unwrap_or(0) == best);
            }
        }

        candidates.sort();
        breadcrumb(placing, "schedule final candidates", &candidates)?;
        Ok(candidates)
    }

    fn has_sufficient_cpu(&self, cpus: u64, metrics: &NodeMetrics) -> bool {
        let hard_max = metrics.cpu_available as f64 * self.config.cpu_overcommit_ratio;
        (metrics.cpu_total_instance_vcpus + cpus) as f64 <= hard_max
    }

    fn has_sufficient_ram(&self, memory_mb: u64, metrics: &NodeMetrics) -> bool {
        // The system reservation is held back no matter what; metrics are MiB.
        let available =
            metrics.memory_available as f64 - self.config.ram_system_reservation_gb * 1024.0;
        if available - (memory_mb as f64) < 0.0 {
            return false;
        }

        // Overcommitted memory is bounded by what workloads actually consume.
        if metrics.memory_max == 0 {
            return false;
        }
        let projected = (metrics.memory_total_instance_actual + memory_mb) as f64;
        projected / metrics.memory_max as f64 <= self.config.ram_overcommit_ratio
    }

    fn has_sufficient_disk(&self, disk_gb: u64, metrics: &NodeMetrics) -> bool {
        let free_gb =
            (metrics.disk_free_instances / GIB) as i64 - self.config.minimum_free_disk_gb as i64;
        disk_gb as i64 <= free_gb
    }

    /// Sum, per candidate node, of the request's weights for tags shared
    /// with healthy workloads already placed there.
    fn affinity_scores(
        &self,
        weights: &HashMap<String, i64>,
        candidates: &[String],
        placing: Option<&Object>,
    ) -> SchedulerResult<HashMap<String, i64>> {
        let mut scores: HashMap<String, i64> =
            candidates.iter().map(|node| (node.clone(), 0)).collect();
        let placing_uuid = placing.map(|o| o.uuid());

        let filter = healthy_states_filter();
        for workload in iterate(&self.store, &self.config, workload_spec(), &[&filter])? {
            if Some(workload.uuid()) == placing_uuid {
                continue;
            }
            let placement = workload.attribute("placement")?;
            let Some(node) = placement.get("node").and_then(|n| n.as_str()) else {
                continue;
            };
            let Some(score) = scores.get_mut(node) else {
                continue;
            };
            for tag in workload.list_attribute("tags")? {
                if let Some(weight) = tag.as_str().and_then(|t| weights.get(t)) {
                    *score += *weight;
                }
            }
        }
        Ok(scores)
    }
}

fn breadcrumb(placing: Option<&Object>, message: &str, candidates: &[String]) -> SchedulerResult<()> {
    if let Some(object) = placing {
        object.add_event(message, Some(json!({ "candidates": candidates })))?;
    }
    Ok(())
}

fn breadcrumb_scores(
    placing: Option<&Object>,
    scores: &HashMap<String, i64>,
) -> SchedulerResult<()> {
    if let Some(object) = placing {
        object.add_event("schedule affinity scores", Some(json!(scores)))?;
    }
    Ok(())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
