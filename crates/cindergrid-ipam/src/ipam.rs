//! The IP address manager entity.
//!
//! An IPAM owns one CIDR block for one virtual network and hands out unique
//! addresses from it. Released addresses pass through a deletion halo
//! before returning to the free pool: a just-freed address must not be
//! reused while stale network-fabric state (ARP, DHCP, filtering) for the
//! previous holder is still converging. Allocation is O(1) random probing
//! in the sparse case with a linear-scan and halo-reclamation ladder under
//! congestion.

use std::net::Ipv4Addr;
use std::sync::{Arc, LazyLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use cinder_core::CinderConfig;
use cindergrid_object::{
    Object, ObjectError, ObjectResult, STATE_CREATED, STATE_DELETED, TransitionTable, TypeSpec,
    UpgradeStep,
};
use cindergrid_store::KvStore;

use crate::block::IpBlock;
use crate::error::{IpamError, IpamResult};
use crate::reservation::{Reservation, ReservationType};

/// Object type name of IPAM entities.
pub const IPAM_TYPE: &str = "ipam";

/// Record type holding per-address reservations, subtyped by IPAM uuid.
const RESERVATION_TYPE: &str = "ipam_reservation";

/// Halo grace applied when allocation is congested, much shorter than the
/// configured steady-state duration.
const CONGESTION_HALO_SECS: u64 = 30;

/// Schema of the IPAM type.
pub fn ipam_spec() -> &'static TypeSpec {
    static SPEC: LazyLock<TypeSpec> = LazyLock::new(|| TypeSpec {
        object_type: IPAM_TYPE,
        current_version: 2,
        state_targets: Some(
            TransitionTable::new()
                .edge(None, &[STATE_CREATED])
                .edge(Some(STATE_CREATED), &[STATE_DELETED]),
        ),
        upgrade_chain: vec![UpgradeStep {
            from_version: 1,
            apply: upgrade_ipam_1_to_2,
        }],
        // The halo list churns on every release and reap.
        event_exempt_attributes: &["deletion-halo"],
    });
    &SPEC
}

/// v1 stored reservations without a type field; tag them `unknown`. This
/// step patches dependent reservation records as a side effect.
fn upgrade_ipam_1_to_2(record: &mut Value, store: &dyn KvStore) -> ObjectResult<()> {
    if let Some(uuid) = record.get("uuid").and_then(|u| u.as_str()) {
        for (path, mut value) in store.get_all(RESERVATION_TYPE, Some(uuid), None)? {
            if value.get("type").is_none() {
                value["type"] = json!("unknown");
                store.put_raw(&path, &value)?;
            }
        }
    }
    record["version"] = json!(2);
    Ok(())
}

/// An IP address manager for one network's block.
pub struct Ipam {
    object: Object,
    store: Arc<dyn KvStore>,
    config: CinderConfig,
    block: IpBlock,
}

impl std::fmt::Debug for Ipam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ipam")
            .field("config", &self.config)
            .field("block", &self.block)
            .finish_non_exhaustive()
    }
}

impl Ipam {
    /// Create a new IPAM and pre-reserve its structural addresses.
    ///
    /// The network, broadcast, and first-usable (gateway) addresses are
    /// reserved here and can never be released afterwards.
    pub fn create(
        store: Arc<dyn KvStore>,
        config: CinderConfig,
        uuid: Uuid,
        namespace: &str,
        network_uuid: Uuid,
        ipblock: &str,
    ) -> IpamResult<Ipam> {
        let block: IpBlock = ipblock.parse()?;
        if block.prefix_len() > 30 {
            return Err(IpamError::InvalidBlock(format!(
                "{ipblock}: too small to hold network, gateway and broadcast addresses"
            )));
        }

        let object = Object::create(
            store.clone(),
            config.clone(),
            ipam_spec(),
            uuid,
            json!({
                "namespace": namespace,
                "network_uuid": network_uuid.to_string(),
                "ipblock": ipblock,
            }),
        )?;
        let ipam = Ipam {
            object,
            store,
            config,
            block,
        };
        ipam.object.set_state(STATE_CREATED)?;

        let owner = ("network".to_string(), network_uuid.to_string());
        ipam.reserve(
            block.network_address(),
            &owner,
            ReservationType::Network,
            "",
        )?;
        ipam.reserve(
            block.broadcast_address(),
            &owner,
            ReservationType::Broadcast,
            "",
        )?;
        // The first usable address is the network's gateway.
        if let Some(gateway) = block.address_at_index(1) {
            ipam.reserve(gateway, &owner, ReservationType::Gateway, "")?;
        }
        Ok(ipam)
    }

    /// Load an existing IPAM. Returns `Ok(None)` when no record exists.
    pub fn load(
        store: Arc<dyn KvStore>,
        config: CinderConfig,
        uuid: Uuid,
    ) -> IpamResult<Option<Ipam>> {
        let Some(object) = Object::load(store.clone(), config.clone(), ipam_spec(), uuid)? else {
            return Ok(None);
        };
        let ipblock = object
            .static_str("ipblock")
            .ok_or_else(|| IpamError::InvalidBlock("record has no ipblock".to_string()))?;
        let block: IpBlock = ipblock.parse()?;
        Ok(Some(Ipam {
            object,
            store,
            config,
            block,
        }))
    }

    // ── Identity and geometry ──────────────────────────────────────

    pub fn uuid(&self) -> Uuid {
        self.object.uuid()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.object.static_str("namespace")
    }

    pub fn network_uuid(&self) -> Option<&str> {
        self.object.static_str("network_uuid")
    }

    /// The underlying object, for state transitions and event inspection.
    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn block(&self) -> &IpBlock {
        &self.block
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.block.netmask()
    }

    pub fn num_addresses(&self) -> u64 {
        self.block.num_addresses()
    }

    pub fn is_in_range(&self, address: Ipv4Addr) -> bool {
        self.block.contains(address)
    }

    // ── Reservation table ──────────────────────────────────────────

    fn subtype(&self) -> String {
        self.object.uuid().to_string()
    }

    fn read_reservation(&self, address: Ipv4Addr) -> IpamResult<Option<Reservation>> {
        let value = self
            .store
            .get(RESERVATION_TYPE, Some(&self.subtype()), &address.to_string())?;
        match value {
            Some(value) => {
                let reservation: Reservation = serde_json::from_value(value).map_err(|e| {
                    ObjectError::Malformed(format!("bad reservation record: {e}"))
                })?;
                Ok(Some(reservation))
            }
            None => Ok(None),
        }
    }

    /// Every reserved address, halo entries included, ordered by key.
    pub fn in_use(&self) -> IpamResult<Vec<String>> {
        let mut addresses = Vec::new();
        for (key, _) in self
            .store
            .get_all(RESERVATION_TYPE, Some(&self.subtype()), None)?
        {
            if let Some(address) = key.rsplit('/').next() {
                addresses.push(address.to_string());
            }
        }
        Ok(addresses)
    }

    pub fn in_use_count(&self) -> IpamResult<u64> {
        Ok(self.in_use()?.len() as u64)
    }

    pub fn is_free(&self, address: Ipv4Addr) -> IpamResult<bool> {
        Ok(self.read_reservation(address)?.is_none())
    }

    /// Reserve a specific address.
    ///
    /// Returns false without mutating anything when the address is already
    /// held. Aged-out halo entries are reaped opportunistically first.
    pub fn reserve(
        &self,
        address: Ipv4Addr,
        owner: &(String, String),
        kind: ReservationType,
        comment: &str,
    ) -> IpamResult<bool> {
        if !self.block.contains(address) {
            return Err(IpamError::OutOfRange(address.to_string()));
        }
        self.release_haloed(self.config.ip_deletion_halo_secs)?;

        let _guard = self.object.lock_sub("reservations", "reserve address")?;
        if self.read_reservation(address)?.is_some() {
            return Ok(false);
        }

        let reservation = Reservation {
            address: address.to_string(),
            owner: Some(owner.clone()),
            when: epoch_secs(),
            kind,
            comment: comment.to_string(),
        };
        let encoded = serde_json::to_value(&reservation)
            .map_err(|e| ObjectError::Malformed(e.to_string()))?;
        self.store.put(
            RESERVATION_TYPE,
            Some(&self.subtype()),
            &reservation.address,
            &encoded,
        )?;
        self.object.add_event("reserved address", Some(encoded))?;
        Ok(true)
    }

    /// Release an address into the deletion halo.
    ///
    /// The address stays excluded from allocation until the halo duration
    /// elapses. Returns false when the address is already free; the
    /// structural network, broadcast, and gateway reservations can never be
    /// released.
    pub fn release(&self, address: Ipv4Addr) -> IpamResult<bool> {
        let _guard = self.object.lock_sub("reservations", "release address")?;
        let Some(existing) = self.read_reservation(address)? else {
            return Ok(false);
        };
        if existing.kind.is_structural() {
            return Ok(false);
        }

        let when = epoch_secs();
        let halo = Reservation {
            address: address.to_string(),
            owner: None,
            when,
            kind: ReservationType::DeletionHalo,
            comment: String::new(),
        };
        let encoded =
            serde_json::to_value(&halo).map_err(|e| ObjectError::Malformed(e.to_string()))?;
        self.store
            .put(RESERVATION_TYPE, Some(&self.subtype()), &halo.address, &encoded)?;
        self.object
            .add_to_list_attribute("deletion-halo", &json!([halo.address, when]))?;
        self.object
            .add_event("released address to deletion halo", Some(encoded))?;
        Ok(true)
    }

    /// Reap halo entries older than `duration_secs`, returning their
    /// addresses to the free pool. Returns the number freed.
    pub fn release_haloed(&self, duration_secs: u64) -> IpamResult<u64> {
        let _guard = self
            .object
            .lock_sub("reservations", "release haloed addresses")?;
        let now = epoch_secs();
        let mut freed = 0;
        for entry in self.object.list_attribute("deletion-halo")? {
            let Some((address, when)) = halo_entry(&entry) else {
                continue;
            };
            if now.saturating_sub(when) >= duration_secs {
                self.store
                    .delete(RESERVATION_TYPE, Some(&self.subtype()), &address)?;
                self.object
                    .remove_from_list_attribute("deletion-halo", &entry)?;
                self.object.add_event(
                    "released address to free pool",
                    Some(json!({ "address": address })),
                )?;
                freed += 1;
            }
        }
        Ok(freed)
    }

    /// Addresses currently waiting out the deletion halo.
    pub fn haloed_addresses(&self) -> IpamResult<Vec<String>> {
        let mut addresses = Vec::new();
        for entry in self.object.list_attribute("deletion-halo")? {
            if let Some((address, _)) = halo_entry(&entry) {
                addresses.push(address);
            }
        }
        Ok(addresses)
    }

    // ── Allocation ─────────────────────────────────────────────────

    /// Allocate any free address in the block.
    ///
    /// Fast-fails when the block is fully reserved, probes a handful of
    /// random addresses for the O(1) sparse case, then falls back to a
    /// linear scan. Under congestion the halo grace shrinks to
    /// `CONGESTION_HALO_SECS` and one more scan runs before giving up.
    pub fn reserve_random_free_address(
        &self,
        owner: &(String, String),
        kind: ReservationType,
        comment: &str,
    ) -> IpamResult<String> {
        // Fast path give up, but only when the block is full of live
        // reservations: haloed addresses are reclaimable capacity and must
        // still reach the reap ladder below.
        let reserved = self.in_use_count()?;
        let haloed = self.haloed_addresses()?.len() as u64;
        if reserved.saturating_sub(haloed) >= self.block.num_addresses() {
            return Err(IpamError::CongestedNetwork(self.block.to_string()));
        }

        for _ in 0..5 {
            let address = self.block.random_address();
            if self.reserve(address, owner, kind, comment)? {
                return Ok(address.to_string());
            }
        }

        if let Some(address) = self.linear_scan(owner, kind, comment)? {
            return Ok(address);
        }

        let freed = self.release_haloed(CONGESTION_HALO_SECS)?;
        if freed > 0 {
            warn!(
                freed,
                ipam = %self.object.uuid(),
                "released haloed addresses due to congestion"
            );
            if let Some(address) = self.linear_scan(owner, kind, comment)? {
                return Ok(address);
            }
        }

        Err(IpamError::CongestedNetwork(self.block.to_string()))
    }

    /// Scan from the first usable index looking for a gap.
    fn linear_scan(
        &self,
        owner: &(String, String),
        kind: ReservationType,
        comment: &str,
    ) -> IpamResult<Option<String>> {
        for index in 1..self.block.num_addresses() {
            let Some(address) = self.block.address_at_index(index) else {
                break;
            };
            if self.reserve(address, owner, kind, comment)? {
                return Ok(Some(address.to_string()));
            }
        }
        Ok(None)
    }

    // ── Provenance ─────────────────────────────────────────────────

    pub fn get_reservation(&self, address: Ipv4Addr) -> IpamResult<Option<Reservation>> {
        self.read_reservation(address)
    }

    /// Seconds since the address was reserved, if it is reserved.
    pub fn get_allocation_age(&self, address: Ipv4Addr) -> IpamResult<Option<u64>> {
        Ok(self
            .read_reservation(address)?
            .map(|r| epoch_secs().saturating_sub(r.when)))
    }

    // ── Deletion ───────────────────────────────────────────────────

    /// Physically remove the IPAM, its reservation table, and its object
    /// record.
    pub fn hard_delete(self) -> IpamResult<()> {
        self.store
            .delete_all(RESERVATION_TYPE, Some(&self.subtype()))?;
        self.object.hard_delete()?;
        Ok(())
    }
}

/// Halo list entries are `[address, released_at]` pairs.
fn halo_entry(entry: &Value) -> Option<(String, u64)> {
    let items = entry.as_array()?;
    let address = items.first()?.as_str()?.to_string();
    let when = items.get(1)?.as_u64()?;
    Some((address, when))
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    use cindergrid_object::ObjectError;
    use cindergrid_store::MemoryStore;

    fn test_store() -> Arc<dyn KvStore> {
        Arc::new(MemoryStore::new())
    }

    fn halo_config(halo_secs: u64) -> CinderConfig {
        CinderConfig {
            ip_deletion_halo_secs: halo_secs,
            ..CinderConfig::default()
        }
    }

    fn instance_owner() -> (String, String) {
        ("instance".to_string(), Uuid::new_v4().to_string())
    }

    fn make_ipam(store: &Arc<dyn KvStore>, config: CinderConfig, block: &str) -> Ipam {
        Ipam::create(
            store.clone(),
            config,
            Uuid::new_v4(),
            "testing",
            Uuid::new_v4(),
            block,
        )
        .unwrap()
    }

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    // ── Creation ───────────────────────────────────────────────────

    #[test]
    fn creation_reserves_exactly_three_addresses() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "192.168.1.0/24");

        assert_eq!(
            ipam.in_use().unwrap(),
            vec!["192.168.1.0", "192.168.1.1", "192.168.1.255"]
        );
        assert_eq!(
            ipam.get_reservation(addr("192.168.1.0")).unwrap().unwrap().kind,
            ReservationType::Network
        );
        assert_eq!(
            ipam.get_reservation(addr("192.168.1.1")).unwrap().unwrap().kind,
            ReservationType::Gateway
        );
        assert_eq!(
            ipam.get_reservation(addr("192.168.1.255")).unwrap().unwrap().kind,
            ReservationType::Broadcast
        );
    }

    #[test]
    fn creation_sets_created_state() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        assert_eq!(
            ipam.object().state().unwrap().value.as_deref(),
            Some(STATE_CREATED)
        );
    }

    #[test]
    fn blocks_without_room_for_structural_addresses_are_rejected() {
        let store = test_store();
        let err = Ipam::create(
            store,
            CinderConfig::default(),
            Uuid::new_v4(),
            "testing",
            Uuid::new_v4(),
            "10.0.0.0/31",
        )
        .unwrap_err();
        assert!(matches!(err, IpamError::InvalidBlock(_)));
    }

    #[test]
    fn load_round_trip() {
        let store = test_store();
        let created = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        let uuid = created.uuid();

        let loaded = Ipam::load(store, CinderConfig::default(), uuid)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.uuid(), uuid);
        assert_eq!(loaded.namespace(), Some("testing"));
        assert_eq!(loaded.num_addresses(), 256);
    }

    #[test]
    fn deleted_state_is_terminal() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        ipam.object().set_state(STATE_DELETED).unwrap();

        let err = ipam.object().set_state(STATE_CREATED).unwrap_err();
        assert!(matches!(err, ObjectError::InvalidTransition { .. }));
    }

    // ── Reserve and release ────────────────────────────────────────

    #[test]
    fn reserve_held_address_returns_false_and_keeps_the_record() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        let first = instance_owner();

        assert!(
            ipam.reserve(addr("10.0.0.9"), &first, ReservationType::Instance, "eth0")
                .unwrap()
        );
        assert!(
            !ipam
                .reserve(addr("10.0.0.9"), &instance_owner(), ReservationType::Floating, "")
                .unwrap()
        );

        let kept = ipam.get_reservation(addr("10.0.0.9")).unwrap().unwrap();
        assert_eq!(kept.owner, Some(first));
        assert_eq!(kept.kind, ReservationType::Instance);
        assert_eq!(kept.comment, "eth0");
    }

    #[test]
    fn reserve_outside_the_block_is_an_error() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        let err = ipam
            .reserve(addr("10.0.1.9"), &instance_owner(), ReservationType::Instance, "")
            .unwrap_err();
        assert!(matches!(err, IpamError::OutOfRange(_)));
    }

    #[test]
    fn release_of_a_free_address_is_false() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        assert!(!ipam.release(addr("10.0.0.9")).unwrap());
    }

    #[test]
    fn structural_reservations_never_release() {
        let store = test_store();
        let ipam = make_ipam(&store, halo_config(0), "10.0.0.0/24");

        assert!(!ipam.release(addr("10.0.0.0")).unwrap());
        assert!(!ipam.release(addr("10.0.0.1")).unwrap());
        assert!(!ipam.release(addr("10.0.0.255")).unwrap());
        assert_eq!(ipam.in_use().unwrap().len(), 3);
    }

    #[test]
    fn released_addresses_wait_out_the_halo() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        let owner = instance_owner();

        ipam.reserve(addr("10.0.0.9"), &owner, ReservationType::Instance, "")
            .unwrap();
        assert!(ipam.release(addr("10.0.0.9")).unwrap());
        assert_eq!(ipam.haloed_addresses().unwrap(), vec!["10.0.0.9"]);

        // Still held: the halo has not elapsed.
        assert!(
            !ipam
                .reserve(addr("10.0.0.9"), &owner, ReservationType::Instance, "")
                .unwrap()
        );
        assert_eq!(
            ipam.get_reservation(addr("10.0.0.9")).unwrap().unwrap().kind,
            ReservationType::DeletionHalo
        );
    }

    #[test]
    fn zero_halo_frees_immediately() {
        let store = test_store();
        let ipam = make_ipam(&store, halo_config(0), "10.0.0.0/24");
        let owner = instance_owner();

        ipam.reserve(addr("10.0.0.9"), &owner, ReservationType::Instance, "")
            .unwrap();
        ipam.release(addr("10.0.0.9")).unwrap();

        // The opportunistic reap inside reserve frees the aged-out halo.
        assert!(
            ipam.reserve(addr("10.0.0.9"), &owner, ReservationType::Instance, "")
                .unwrap()
        );
        assert!(ipam.haloed_addresses().unwrap().is_empty());
    }

    #[test]
    fn explicit_reap_frees_haloed_addresses() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        let owner = instance_owner();

        ipam.reserve(addr("10.0.0.9"), &owner, ReservationType::Instance, "")
            .unwrap();
        ipam.release(addr("10.0.0.9")).unwrap();

        assert_eq!(ipam.release_haloed(0).unwrap(), 1);
        assert!(ipam.is_free(addr("10.0.0.9")).unwrap());
        assert!(ipam.haloed_addresses().unwrap().is_empty());
    }

    // ── Random allocation ──────────────────────────────────────────

    #[test]
    fn full_block_fast_fails_allocation() {
        let store = test_store();
        // A /30 has only one non-structural address.
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/30");
        ipam.reserve(addr("10.0.0.2"), &instance_owner(), ReservationType::Instance, "")
            .unwrap();

        let err = ipam
            .reserve_random_free_address(&instance_owner(), ReservationType::Instance, "")
            .unwrap_err();
        assert!(matches!(err, IpamError::CongestedNetwork(_)));
    }

    #[test]
    fn allocation_finds_the_single_gap() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/30");

        let allocated = ipam
            .reserve_random_free_address(&instance_owner(), ReservationType::Instance, "")
            .unwrap();
        assert_eq!(allocated, "10.0.0.2");
    }

    #[test]
    fn allocation_stays_unique_until_exhaustion() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/28");
        let owner = instance_owner();

        // 16 addresses minus 3 structural leaves 13 allocations.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..13 {
            let allocated = ipam
                .reserve_random_free_address(&owner, ReservationType::Instance, "")
                .unwrap();
            assert!(seen.insert(allocated), "allocated an address twice");
        }
        let err = ipam
            .reserve_random_free_address(&owner, ReservationType::Instance, "")
            .unwrap_err();
        assert!(matches!(err, IpamError::CongestedNetwork(_)));
    }

    #[test]
    fn congestion_reaps_aged_halo_entries() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/30");
        let owner = instance_owner();

        ipam.reserve(addr("10.0.0.2"), &owner, ReservationType::Instance, "")
            .unwrap();
        ipam.release(addr("10.0.0.2")).unwrap();

        // A fresh halo entry survives even the aggressive reap.
        let err = ipam
            .reserve_random_free_address(&owner, ReservationType::Instance, "")
            .unwrap_err();
        assert!(matches!(err, IpamError::CongestedNetwork(_)));

        // Backdate the halo entry past the congestion grace but inside the
        // configured steady-state duration: only the aggressive reap in the
        // allocation ladder can free it.
        ipam.object()
            .set_attribute("deletion-halo", &json!([["10.0.0.2", epoch_secs() - 60]]))
            .unwrap();
        let allocated = ipam
            .reserve_random_free_address(&owner, ReservationType::Instance, "")
            .unwrap();
        assert_eq!(allocated, "10.0.0.2");
    }

    // ── Provenance ─────────────────────────────────────────────────

    #[test]
    fn allocation_age_reflects_reservation_time() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        ipam.reserve(addr("10.0.0.9"), &instance_owner(), ReservationType::Instance, "")
            .unwrap();

        let age = ipam.get_allocation_age(addr("10.0.0.9")).unwrap().unwrap();
        assert!(age <= 2);
        assert!(ipam.get_allocation_age(addr("10.0.0.10")).unwrap().is_none());
    }

    #[test]
    fn geometry_accessors() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "192.168.1.0/24");
        assert_eq!(ipam.netmask(), addr("255.255.255.0"));
        assert_eq!(ipam.num_addresses(), 256);
        assert!(ipam.is_in_range(addr("192.168.1.77")));
        assert!(!ipam.is_in_range(addr("192.168.2.77")));
    }

    // ── Upgrades ───────────────────────────────────────────────────

    #[test]
    fn v1_records_upgrade_and_tag_untyped_reservations() {
        let store = test_store();
        let uuid = Uuid::new_v4();
        store
            .create(
                IPAM_TYPE,
                None,
                &uuid.to_string(),
                &json!({
                    "uuid": uuid.to_string(),
                    "version": 1,
                    "namespace": "legacy",
                    "network_uuid": Uuid::new_v4().to_string(),
                    "ipblock": "10.0.0.0/24",
                }),
            )
            .unwrap();
        // A v1 reservation record with no type field.
        store
            .put(
                RESERVATION_TYPE,
                Some(&uuid.to_string()),
                "10.0.0.5",
                &json!({
                    "address": "10.0.0.5",
                    "owner": ["instance", Uuid::new_v4().to_string()],
                    "when": 1000,
                    "comment": "",
                }),
            )
            .unwrap();

        let ipam = Ipam::load(store, CinderConfig::default(), uuid)
            .unwrap()
            .unwrap();
        assert_eq!(ipam.object().version(), 2);
        assert_eq!(
            ipam.get_reservation(addr("10.0.0.5")).unwrap().unwrap().kind,
            ReservationType::Unknown
        );
    }

    // ── Hard delete ────────────────────────────────────────────────

    #[test]
    fn hard_delete_clears_the_reservation_table() {
        let store = test_store();
        let ipam = make_ipam(&store, CinderConfig::default(), "10.0.0.0/24");
        let uuid = ipam.uuid();

        ipam.hard_delete().unwrap();

        assert!(
            store
                .get_all(RESERVATION_TYPE, Some(&uuid.to_string()), None)
                .unwrap()
                .is_empty()
        );
        assert!(
            Ipam::load(store, CinderConfig::default(), uuid)
                .unwrap()
                .is_none()
        );
    }
}
