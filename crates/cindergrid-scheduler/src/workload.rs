//! The workload object type as the scheduler sees it.
//!
//! The full workload lifecycle belongs to the entity that owns it; for
//! affinity scoring the scheduler only needs the `placement` and `tags`
//! attributes of workloads in a healthy state.

use std::sync::LazyLock;

use cindergrid_object::{
    STATE_CREATED, STATE_CREATING, STATE_DELETE_WAIT, STATE_DELETED, STATE_ERROR, STATE_INITIAL,
    StateFilter, TransitionTable, TypeSpec,
};

/// The affinity dimension consulted for placement scoring.
pub const AFFINITY_DIMENSION: &str = "cpu";

/// States in which a workload counts toward colocation scoring.
pub const HEALTHY_STATES: &[&str] = &[STATE_INITIAL, STATE_CREATING, STATE_CREATED];

pub fn healthy_states_filter() -> StateFilter {
    StateFilter::new(HEALTHY_STATES)
}

/// Schema of the workload type.
pub fn workload_spec() -> &'static TypeSpec {
    static SPEC: LazyLock<TypeSpec> = LazyLock::new(|| TypeSpec {
        object_type: "workload",
        current_version: 1,
        state_targets: Some(
            TransitionTable::new()
                .edge(None, &[STATE_INITIAL])
                .edge(
                    Some(STATE_INITIAL),
                    &[STATE_CREATING, STATE_CREATED, STATE_DELETE_WAIT, STATE_DELETED, STATE_ERROR],
                )
                .edge(
                    Some(STATE_CREATING),
                    &[STATE_CREATED, STATE_DELETE_WAIT, STATE_DELETED, STATE_ERROR],
                )
                .edge(
                    Some(STATE_CREATED),
                    &[STATE_DELETE_WAIT, STATE_DELETED, STATE_ERROR],
                )
                .edge(Some(STATE_DELETE_WAIT), &[STATE_DELETED])
                .edge(Some(STATE_ERROR), &[STATE_CREATED, STATE_DELETE_WAIT, STATE_DELETED]),
        ),
        upgrade_chain: Vec::new(),
        // Placement and tag churn during scheduling stays out of the log.
        event_exempt_attributes: &["placement", "tags"],
    });
    &SPEC
}
