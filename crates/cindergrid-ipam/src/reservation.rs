//! Address reservation records.

use serde::{Deserialize, Serialize};

/// Why an address is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationType {
    Network,
    Broadcast,
    Gateway,
    Floating,
    Routed,
    Instance,
    DeletionHalo,
    Unknown,
}

impl ReservationType {
    /// Reservations made at IPAM creation; these are never released.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ReservationType::Network | ReservationType::Broadcast | ReservationType::Gateway
        )
    }
}

/// One address reservation, stored per address under the IPAM's
/// reservation prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub address: String,
    /// Opaque identity of the holder, usually (object type, uuid). Halo
    /// entries have no holder.
    pub owner: Option<(String, String)>,
    /// Epoch seconds when the reservation was made.
    pub when: u64,
    #[serde(rename = "type")]
    pub kind: ReservationType,
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservation_type_serializes_kebab_case() {
        let encoded = serde_json::to_string(&ReservationType::DeletionHalo).unwrap();
        assert_eq!(encoded, "\"deletion-halo\"");
        let encoded = serde_json::to_string(&ReservationType::Network).unwrap();
        assert_eq!(encoded, "\"network\"");
    }

    #[test]
    fn structural_types() {
        assert!(ReservationType::Network.is_structural());
        assert!(ReservationType::Gateway.is_structural());
        assert!(!ReservationType::Instance.is_structural());
        assert!(!ReservationType::DeletionHalo.is_structural());
    }
}
