//! Per-service serialization of state transitions.

use std::collections::HashMap;
use std::sync::Arc;

use admiral_core::ServiceId;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

/// One async lock per service, created on first use and removed once the
/// last holder or waiter lets go.
///
/// Transitions on the same service queue behind each other; different
/// services never contend.
#[derive(Debug, Default)]
pub struct ServiceLocks {
    locks: Mutex<HashMap<ServiceId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ServiceLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a service.
    pub async fn acquire(&self, service: ServiceId) -> ServiceGuard<'_> {
        let lock = Arc::clone(self.locks.lock().entry(service).or_default());
        let guard = lock.lock_owned().await;
        ServiceGuard {
            locks: self,
            service,
            guard: Some(guard),
        }
    }

    /// Number of services with a lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns true if no service has a lock entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

/// Exclusive access to one service. Dropping it releases the lock and
/// removes the table entry when nobody else is queued on it.
#[derive(Debug)]
pub struct ServiceGuard<'a> {
    locks: &'a ServiceLocks,
    service: ServiceId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ServiceGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.locks.lock();
        if locks
            .get(&self.service)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.service);
        }
    }
}
