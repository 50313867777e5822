//! cindergrid-object: the distributed object model.
//!
//! Every cluster entity (instance, network, artifact, blob, node) gets a
//! consistent, lockable, versioned identity here: an immutable static
//! record, a lazily-upgraded schema version, a validated state machine,
//! independently-lockable attributes, and an append-only event log, all
//! over the [`cindergrid_store`] substrate.
//!
//! # Design
//!
//! Per-type differences are data, not code: a [`TypeSpec`] carries the
//! transition table, the upgrade chain, and the event-exemption set, and
//! query behavior composes from [`filter::Filter`] values. The mutation
//! logic itself is shared by every type.

pub mod error;
pub mod events;
pub mod filter;
pub mod object;
pub mod schema;
pub mod state;

pub use error::{ObjectError, ObjectResult};
pub use events::ObjectEvent;
pub use filter::{Filter, NamespaceFilter, StateAgeFilter, StateFilter, active_states_filter, iterate};
pub use object::Object;
pub use schema::{TransitionTable, TypeSpec, UpgradeStep};
pub use state::{
    ACTIVE_STATES, STATE_CREATED, STATE_CREATING, STATE_DELETE_WAIT, STATE_DELETED, STATE_ERROR,
    STATE_INITIAL, State,
};
