use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Returned by [`LockManager::acquire`] when another holder owns the shop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("shop is locked by {holder_id}")]
pub struct LockHeld {
    pub holder_id: String,
}

/// Returned by [`LockManager::release`] when the caller no longer owns the
/// lock, e.g. because its lease expired and someone else took over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lock is not owned by the caller")]
pub struct LockNotOwned;

/// A granted per-shop lease.
#[derive(Debug, Clone)]
pub struct ShopLock {
    pub shop_id: String,
    pub holder_id: String,
    /// What the holder is doing, e.g. the job type.
    pub reason: String,
    pub acquired_at: DateTime<Utc>,
    pub lease_expiry: DateTime<Utc>,
}

/// In-process per-shop locks with a lease.
///
/// There is no background sweeper. An expired lease is evicted by whichever
/// call touches the shop next, so a crashed holder blocks its shop for at
/// most one lease.
pub struct LockManager {
    locks: Mutex<HashMap<String, ShopLock>>,
    lease: Duration,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    pub fn new(lease_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            lease: Duration::seconds(lease_secs),
            clock,
        }
    }

    /// Try to take the shop lock with the default lease. Returns the
    /// generated holder id on success.
    pub fn acquire(&self, shop_id: &str, reason: &str) -> Result<String, LockHeld> {
        self.acquire_with_lease(shop_id, reason, self.lease)
    }

    pub fn acquire_with_lease(
        &self,
        shop_id: &str,
        reason: &str,
        lease: Duration,
    ) -> Result<String, LockHeld> {
        let now = self.clock.now();
        let mut locks = self.locks.lock().unwrap();

        if let Some(existing) = locks.get(shop_id) {
            if existing.lease_expiry > now {
                return Err(LockHeld {
                    holder_id: existing.holder_id.clone(),
                });
            }
            warn!(
                "Evicting expired lock on shop {} held by {} ({})",
                shop_id, existing.holder_id, existing.reason
            );
        }

        let holder_id = uuid::Uuid::new_v4().to_string();
        locks.insert(
            shop_id.to_string(),
            ShopLock {
                shop_id: shop_id.to_string(),
                holder_id: holder_id.clone(),
                reason: reason.to_string(),
                acquired_at: now,
                lease_expiry: now + lease,
            },
        );
        debug!("Shop {} locked by {} ({})", shop_id, holder_id, reason);
        Ok(holder_id)
    }

    /// Release the lock if `holder_id` still owns it.
    pub fn release(&self, shop_id: &str, holder_id: &str) -> Result<(), LockNotOwned> {
        let mut locks = self.locks.lock().unwrap();
        match locks.get(shop_id) {
            Some(lock) if lock.holder_id == holder_id => {
                locks.remove(shop_id);
                debug!("Shop {} unlocked by {}", shop_id, holder_id);
                Ok(())
            }
            _ => Err(LockNotOwned),
        }
    }

    /// Current holder, if the lease has not expired. Touching an expired
    /// lease evicts it.
    pub fn holder_for(&self, shop_id: &str) -> Option<ShopLock> {
        let now = self.clock.now();
        let mut locks = self.locks.lock().unwrap();
        if let Some(lock) = locks.get(shop_id) {
            if lock.lease_expiry > now {
                return Some(lock.clone());
            }
            warn!(
                "Evicting expired lock on shop {} held by {} ({})",
                shop_id, lock.holder_id, lock.reason
            );
            locks.remove(shop_id);
        }
        None
    }

    pub fn is_locked(&self, shop_id: &str) -> bool {
        self.holder_for(shop_id).is_some()
    }
}
