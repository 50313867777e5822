//! Per-object append-only event log records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One audit entry in an object's event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectEvent {
    /// Epoch seconds when the event was recorded.
    pub timestamp: u64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}
