//! Bounded worker pool for foreground monitoring.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::error;

use super::{MonitorOutcome, ResourceIdentity, ResourceMonitor, StatusSource};

/// Upper bound on concurrent monitor workers.
pub const MAX_MONITOR_WORKERS: usize = 5;

/// Runs monitors on isolated tasks, at most `size` at a time.
#[derive(Clone, Debug)]
pub struct MonitorPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl MonitorPool {
    /// Creates a pool; `workers` is clamped to `1..=MAX_MONITOR_WORKERS`.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let size = workers.clamp(1, MAX_MONITOR_WORKERS);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Number of workers that may run concurrently.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Runs `monitor` on a pooled worker and waits for its outcome.
    ///
    /// A worker that panics yields [`MonitorOutcome::Aborted`].
    pub async fn run<S>(
        &self,
        monitor: ResourceMonitor,
        source: Arc<S>,
        identity: ResourceIdentity,
    ) -> MonitorOutcome
    where
        S: StatusSource + ?Sized + 'static,
    {
        let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
            return MonitorOutcome::Aborted {
                message: String::from("monitor pool is closed"),
            };
        };

        let worker = tokio::spawn(async move {
            let _permit = permit;
            monitor.watch(source.as_ref(), &identity).await
        });

        match worker.await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "monitor worker terminated abnormally");
                MonitorOutcome::Aborted {
                    message: format!("monitor worker failed: {err}"),
                }
            }
        }
    }
}

impl Default for MonitorPool {
    fn default() -> Self {
        Self::new(1)
    }
}
