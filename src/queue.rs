//! Admission queue bounding concurrent EWS requests.
//!
//! Exchange throttles per mailbox, so requests from every client sharing a
//! [`JobQueue`] are admitted FIFO up to `max_in_flight`. Each admitted job runs
//! on its own task holding the permit: a caller that stops waiting drops only
//! the result, while the exchange completes and releases the slot.

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// FIFO admission queue.
#[derive(Debug)]
pub struct JobQueue {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(1)
    }
}

impl JobQueue {
    /// Creates a queue admitting at most `max_in_flight` jobs (minimum 1).
    #[must_use]
    pub fn new(max_in_flight: usize) -> Self {
        let capacity = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Maximum number of jobs in flight.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs that could start right now without waiting.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for admission, then runs `job` on a spawned task.
    pub async fn run<F, T>(&self, operation: &str, job: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::TaskAborted {
                operation: operation.to_string(),
            })?;
        debug!(operation, in_flight = self.capacity - self.available(), "Job admitted");

        let handle = tokio::spawn(async move {
            let result = job.await;
            drop(permit);
            result
        });

        handle.await.map_err(|e| {
            warn!(operation, error = %e, "Job task failed");
            Error::TaskAborted {
                operation: operation.to_string(),
            }
        })?
    }
}
