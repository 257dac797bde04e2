//! Per-site reader/writer locks separating batch re-optimization (exclusive)
//! from placement and LOD work (shared).

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// What a request does when its site lock is held on the other side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteBusyPolicy {
    /// Block until the lock is free.
    #[default]
    Queue,
    /// Fail immediately with `SiteBusy`.
    Reject,
}

/// Returned under [`SiteBusyPolicy::Reject`] when the lock is contended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteBusy;

#[derive(Default)]
pub struct SiteLocks {
    locks: DashMap<String, Arc<RwLock<()>>>,
}

impl SiteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `site_id`, created on first use.
    pub fn handle(&self, site_id: &str) -> Arc<RwLock<()>> {
        if let Some(lock) = self.locks.get(site_id) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.locks
                .entry(site_id.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(())))
                .value(),
        )
    }
}

/// Take the shared side of a site lock.
///
/// A poisoned lock is recovered; it guards no data.
pub fn read(lock: &RwLock<()>, policy: SiteBusyPolicy) -> Result<RwLockReadGuard<'_, ()>, SiteBusy> {
    match policy {
        SiteBusyPolicy::Queue => Ok(lock.read().unwrap_or_else(PoisonError::into_inner)),
        SiteBusyPolicy::Reject => match lock.try_read() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(p)) => Ok(p.into_inner()),
            Err(TryLockError::WouldBlock) => Err(SiteBusy),
        },
    }
}

/// Take the exclusive side of a site lock.
pub fn write(
    lock: &RwLock<()>,
    policy: SiteBusyPolicy,
) -> Result<RwLockWriteGuard<'_, ()>, SiteBusy> {
    match policy {
        SiteBusyPolicy::Queue => Ok(lock.write().unwrap_or_else(PoisonError::into_inner)),
        SiteBusyPolicy::Reject => match lock.try_write() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(p)) => Ok(p.into_inner()),
            Err(TryLockError::WouldBlock) => Err(SiteBusy),
        },
    }
}
