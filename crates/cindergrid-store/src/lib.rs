//! cindergrid-store: the key/value and lock substrate for CinderGrid.
//!
//! Everything in the control plane persists through the [`KvStore`] contract:
//! exactly-once `create`, point `get`/`put`/`delete`, and ordered prefix
//! scans. Two backends are bundled: an in-memory store for tests and
//! in-memory objects, and a redb-backed embedded store for single-node
//! persistence. A distributed deployment substitutes an etcd-class backend
//! behind the same trait; ordering and durability are its problem, not ours.
//!
//! Mutual exclusion is provided by lease-based locks layered over the
//! contract (see [`lock`]): acquisition polls up to a timeout, the lease
//! carries a deadline that the holder must refresh across slow work, and an
//! expired lease is simply broken by the next waiter.

pub mod error;
pub mod lock;
pub mod memory;
pub mod path;
pub mod redb_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use lock::{LOCK_PREFIX, LockGuard, LockHolder, acquire_lock, break_stale_locks, existing_locks};
pub use memory::MemoryStore;
pub use path::record_path;
pub use redb_store::RedbStore;
pub use store::KvStore;
