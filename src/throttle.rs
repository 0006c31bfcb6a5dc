//! Bounded-concurrency gate for units of work.
//!
//! A `Throttle` hands out at most `capacity` permits at a time. Units of work
//! hold a permit for the duration of the throttled step and give it back with
//! [`ThrottlePermit::release`] (dropping the permit has the same effect), which
//! wakes one waiter. Waiters are served in FIFO order.

use crate::error::{ReleaseError, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting semaphore with a fixed capacity. Cloning shares the permits.
#[derive(Debug, Clone)]
pub struct Throttle {
    name: &'static str,
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

/// A held permit; returned to its throttle on release or drop
#[derive(Debug)]
#[must_use = "dropping a permit releases it immediately"]
pub struct ThrottlePermit {
    _permit: OwnedSemaphorePermit,
}

impl Throttle {
    /// Create a throttle. A capacity of zero is raised to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Wait until a permit is available and take it
    pub async fn acquire(&self) -> Result<ThrottlePermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ReleaseError::ThrottleClosed { name: self.name })?;
        Ok(ThrottlePermit { _permit: permit })
    }

    /// Name used in log output
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum number of concurrently held permits
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

impl ThrottlePermit {
    /// Return the permit to its throttle
    pub fn release(self) {}
}
