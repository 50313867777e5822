//! Lifecycle state values.
//!
//! A concrete type may add its own states (for example staged error states)
//! on top of the well-known set; any value ending in `error` denotes an
//! error condition for the purposes of the error-message gate.

use serde::{Deserialize, Serialize};

pub const STATE_INITIAL: &str = "initial";
pub const STATE_CREATING: &str = "creating";
pub const STATE_CREATED: &str = "created";
pub const STATE_DELETED: &str = "deleted";
pub const STATE_DELETE_WAIT: &str = "delete_wait";
pub const STATE_ERROR: &str = "error";

/// Every well-known state except `deleted`.
pub const ACTIVE_STATES: &[&str] = &[
    STATE_INITIAL,
    STATE_CREATING,
    STATE_CREATED,
    STATE_ERROR,
    STATE_DELETE_WAIT,
];

/// A state value and when it was set.
///
/// Two states are equal iff both value and update time match; the setter
/// uses this to detect genuine no-op writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct State {
    pub value: Option<String>,
    pub update_time: u64,
}

impl State {
    pub fn new(value: &str, update_time: u64) -> Self {
        Self {
            value: Some(value.to_string()),
            update_time,
        }
    }

    /// The synthesized value for an object that has never had a state set.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Whether this state denotes an error condition.
    pub fn denotes_error(&self) -> bool {
        self.value.as_deref().is_some_and(|v| v.ends_with("error"))
    }

    /// Seconds since the state was last set.
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.update_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_needs_value_and_time() {
        assert_eq!(State::new("created", 10), State::new("created", 10));
        assert_ne!(State::new("created", 10), State::new("created", 11));
        assert_ne!(State::new("created", 10), State::new("deleted", 10));
    }

    #[test]
    fn zero_state_has_no_value() {
        let zero = State::zero();
        assert!(zero.value.is_none());
        assert_eq!(zero.update_time, 0);
    }

    #[test]
    fn error_detection_covers_staged_error_states() {
        assert!(State::new("error", 0).denotes_error());
        assert!(State::new("preflight-error", 0).denotes_error());
        assert!(!State::new("created", 0).denotes_error());
        assert!(!State::zero().denotes_error());
    }
}
