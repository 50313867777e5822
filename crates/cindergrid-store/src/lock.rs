//! Lease-based locks layered over the substrate contract.
//!
//! A lock is a record under `/cglocks` whose value names the holder and a
//! lease deadline. Acquisition is the substrate's exactly-once `create`;
//! waiters poll until the caller's timeout and may break a lease whose
//! deadline has passed. Holders of long critical sections must call
//! [`LockGuard::refresh`] on the configured interval or the lease expires
//! out from under them. Release happens on guard drop on every exit path.
//!
//! An etcd-class backend enforces lease expiry server-side; the client-side
//! deadline here lets the bundled embedded backends honor the same contract.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::path::record_path;
use crate::store::KvStore;

/// Dedicated prefix so lock records never collide with data records.
pub const LOCK_PREFIX: &str = "/cglocks";

/// How often a waiter re-attempts acquisition.
const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Holder metadata recorded in the lock value, for diagnosability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockHolder {
    pub node: String,
    pub pid: u32,
    /// Unique id of this acquisition; ownership checks compare it.
    pub id: String,
    /// What the holder is doing, for operators reading lock tables.
    pub operation: String,
    /// Lease deadline, epoch milliseconds.
    pub deadline: u64,
}

/// A held lease. Dropping the guard releases the lock.
pub struct LockGuard {
    store: Arc<dyn KvStore>,
    path: String,
    holder: LockHolder,
    ttl: Duration,
    released: bool,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("path", &self.path)
            .field("holder", &self.holder)
            .field("ttl", &self.ttl)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

/// Acquire the lock for `(object_type, subtype, name)`.
///
/// Polls until `timeout`, then fails with `StoreError::Lock`. A lease whose
/// deadline has passed is broken so a dead holder cannot wedge the key.
pub fn acquire_lock(
    store: Arc<dyn KvStore>,
    object_type: &str,
    subtype: Option<&str>,
    name: &str,
    node: &str,
    operation: &str,
    ttl: Duration,
    timeout: Duration,
) -> StoreResult<LockGuard> {
    let path = format!(
        "{LOCK_PREFIX}{}",
        record_path(object_type, subtype, Some(name))
    );
    let id = Uuid::new_v4().to_string();
    let started = Instant::now();

    loop {
        let holder = LockHolder {
            node: node.to_string(),
            pid: std::process::id(),
            id: id.clone(),
            operation: operation.to_string(),
            deadline: epoch_millis() + ttl.as_millis() as u64,
        };
        let encoded =
            serde_json::to_value(&holder).map_err(|e| StoreError::Serialize(e.to_string()))?;

        if store.create_raw(&path, &encoded)? {
            debug!(lock = %path, operation, "acquired lock");
            return Ok(LockGuard {
                store,
                path,
                holder,
                ttl,
                released: false,
            });
        }

        if let Some(current) = store.get_raw(&path)? {
            match serde_json::from_value::<LockHolder>(current) {
                Ok(current) if current.deadline < epoch_millis() => {
                    warn!(
                        lock = %path,
                        holder = %current.node,
                        holder_pid = current.pid,
                        "breaking expired lease"
                    );
                    store.delete_raw(&path)?;
                    // Retry the create immediately; another waiter may win.
                    continue;
                }
                Ok(_) => {}
                Err(_) => {
                    // Unparseable holder record; treat as expired.
                    warn!(lock = %path, "breaking malformed lock record");
                    store.delete_raw(&path)?;
                    continue;
                }
            }
        }

        if started.elapsed() >= timeout {
            return Err(StoreError::Lock(format!(
                "cannot acquire {path}, timed out after {:.02}s",
                started.elapsed().as_secs_f64()
            )));
        }
        std::thread::sleep(ACQUIRE_POLL_INTERVAL);
    }
}

impl LockGuard {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn holder(&self) -> &LockHolder {
        &self.holder
    }

    /// Extend the lease by another TTL.
    ///
    /// Fails if the lease already expired and was taken by someone else;
    /// the caller must not continue its critical section in that case.
    pub fn refresh(&mut self) -> StoreResult<()> {
        let current = self
            .store
            .get_raw(&self.path)?
            .and_then(|v| serde_json::from_value::<LockHolder>(v).ok());
        match current {
            Some(current) if current.id == self.holder.id => {
                self.holder.deadline = epoch_millis() + self.ttl.as_millis() as u64;
                let encoded = serde_json::to_value(&self.holder)
                    .map_err(|e| StoreError::Serialize(e.to_string()))?;
                self.store.put_raw(&self.path, &encoded)?;
                debug!(lock = %self.path, "refreshed lease");
                Ok(())
            }
            _ => Err(StoreError::Lock(format!(
                "lease on {} expired or lost, cannot refresh",
                self.path
            ))),
        }
    }

    /// Release the lock. Idempotent; also called on drop.
    pub fn release(&mut self) -> StoreResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let current = self
            .store
            .get_raw(&self.path)?
            .and_then(|v| serde_json::from_value::<LockHolder>(v).ok());
        if let Some(current) = current {
            if current.id == self.holder.id {
                self.store.delete_raw(&self.path)?;
                debug!(lock = %self.path, "released lock");
            } else {
                warn!(lock = %self.path, "lease was lost before release");
            }
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(lock = %self.path, error = %e, "failed to release lock on drop");
        }
    }
}

/// Remove lock records written by `node` whose lease deadline has passed.
///
/// Run after an unclean restart so a crashed process's locks do not have to
/// time out one by one. Returns the number of locks removed.
pub fn break_stale_locks(store: &dyn KvStore, node: &str) -> StoreResult<u64> {
    let now = epoch_millis();
    let mut removed = 0;
    for (path, value) in store.get_prefix(&format!("{LOCK_PREFIX}/"))? {
        let Ok(holder) = serde_json::from_value::<LockHolder>(value) else {
            continue;
        };
        if holder.node == node && holder.deadline < now {
            store.delete_raw(&path)?;
            warn!(lock = %path, old_pid = holder.pid, "removed stale lock");
            removed += 1;
        }
    }
    Ok(removed)
}

/// All currently-recorded locks with their holder metadata.
pub fn existing_locks(store: &dyn KvStore) -> StoreResult<Vec<(String, LockHolder)>> {
    let mut locks = Vec::new();
    for (path, value) in store.get_prefix(&format!("{LOCK_PREFIX}/"))? {
        if let Ok(holder) = serde_json::from_value::<LockHolder>(value) {
            locks.push((path, holder));
        }
    }
    Ok(locks)
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
