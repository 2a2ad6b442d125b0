use crate::core::{PortalError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Bounded pool serving one scheduler level.
///
/// Capacity changes take effect immediately for idle permits. Permits held by
/// running jobs cannot be revoked, so a shrink that outruns the idle permits is
/// recorded as `debt` and repaid by retiring permits as those jobs finish.
#[derive(Debug)]
pub(crate) struct DepthPool {
    level: usize,
    semaphore: Arc<Semaphore>,
    capacity: AtomicUsize,
    debt: AtomicUsize,
}

impl DepthPool {
    pub(crate) fn new(level: usize) -> Self {
        Self {
            level,
            semaphore: Arc::new(Semaphore::new(0)),
            capacity: AtomicUsize::new(0),
            debt: AtomicUsize::new(0),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Idle permits, i.e. jobs that could start right now.
    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Resize the pool. Callers serialize tuning.
    pub(crate) fn tune(&self, capacity: usize) {
        let previous = self.capacity.swap(capacity, Ordering::AcqRel);
        if capacity > previous {
            let mut grow = capacity - previous;
            let owed = self
                .debt
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |debt| {
                    Some(debt.saturating_sub(grow))
                })
                .unwrap_or_default();
            grow -= owed.min(grow);
            self.semaphore.add_permits(grow);
        } else if capacity < previous {
            let shrink = previous - capacity;
            let forgotten = self.semaphore.forget_permits(shrink);
            self.debt.fetch_add(shrink - forgotten, Ordering::AcqRel);
        }
        debug!(
            target: "portal::scheduler",
            "tuned pool level {} from {} to {} permits",
            self.level,
            previous,
            capacity
        );
    }

    pub(crate) async fn acquire(self: &Arc<Self>) -> Result<PoolSlot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PortalError::SchedulerClosed)?;
        Ok(PoolSlot {
            permit: Some(permit),
            pool: Arc::clone(self),
        })
    }

    pub(crate) fn close(&self) {
        self.semaphore.close();
    }
}

/// A running job's hold on its pool.
pub(crate) struct PoolSlot {
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<DepthPool>,
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        let repaid = self
            .pool
            .debt
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |debt| debt.checked_sub(1))
            .is_ok();
        if repaid {
            if let Some(permit) = self.permit.take() {
                permit.forget();
            }
        }
    }
}
