//! cindergrid-scheduler: workload placement decisions.
//!
//! The scheduler reads externally-published per-node metrics and narrows a
//! candidate set through hard resource filters, then ranks the survivors by
//! tag affinity against workloads already placed. It holds no lock: the
//! decision is advisory, and the component that actually claims a resource
//! enforces its own invariant at the point of claim.

pub mod error;
pub mod metrics;
pub mod scheduler;
pub mod workload;

pub use error::{SchedulerError, SchedulerResult};
pub use metrics::{METRICS_TYPE, NodeMetrics, read_node_metrics};
pub use scheduler::{Scheduler, WorkloadRequirement};
pub use workload::{AFFINITY_DIMENSION, HEALTHY_STATES, healthy_states_filter, workload_spec};
