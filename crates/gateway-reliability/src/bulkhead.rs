//! Bulkhead isolation: caps the number of concurrent in-flight calls to a
//! single downstream service so one slow service can't starve the Tokio
//! worker pool for every other route.

use std::sync::Arc;

use gateway_types::error::{GatewayError, Result as GatewayResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Per-service concurrency limiter.
pub struct Bulkhead {
    name: String,
    semaphore: Arc<Semaphore>,
}

impl Bulkhead {
    pub fn new(name: impl Into<String>, max_concurrent: usize) -> Self {
        Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Acquire a permit, rejecting immediately if the bulkhead is saturated
    /// (never queues — a caller should fail fast rather than pile up).
    pub fn try_acquire(&self) -> GatewayResult<OwnedSemaphorePermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| GatewayError::ServiceUnavailable(format!("{} bulkhead saturated", self.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_saturated() {
        let bh = Bulkhead::new("svc", 1);
        let permit = bh.try_acquire().unwrap();
        assert!(bh.try_acquire().is_err());
        drop(permit);
        assert!(bh.try_acquire().is_ok());
    }
}
