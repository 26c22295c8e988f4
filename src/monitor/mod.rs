//! Resource state monitoring.
//!
//! [`ResourceMonitor`] polls a [`StatusSource`] until the backend reports a
//! terminal provisioning state or the time budget runs out. The budget is a
//! hard cutoff: an in-flight query is abandoned once the deadline passes and
//! the final sleep is shortened so the loop never overshoots.
//!
//! Foreground monitoring runs on a [`MonitorPool`] worker so that long
//! polling loops stay off the orchestrator's own task.

use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info, warn};

use crate::component::MonitorTiming;

mod pool;
mod status;

pub use pool::{MAX_MONITOR_WORKERS, MonitorPool};
pub use status::{
    AzStatusSource, ProvisioningState, ResourceIdentity, StatusError, StatusFuture, StatusSource,
};

/// Terminal result of monitoring one resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MonitorOutcome {
    /// The backend reported `Succeeded`.
    Succeeded {
        /// Number of status queries issued, including the successful one.
        queries: u32,
    },
    /// The backend reported a failed terminal state.
    Failed {
        /// State reported by the backend.
        state: String,
    },
    /// No terminal state was observed within the budget.
    TimedOut {
        /// Time spent monitoring.
        elapsed: Duration,
    },
    /// Monitoring stopped early because polling again cannot help.
    Aborted {
        /// Description of the structural failure.
        message: String,
    },
}

impl MonitorOutcome {
    /// Returns `true` only for [`MonitorOutcome::Succeeded`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Polls one resource at a fixed interval until it reaches a terminal state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResourceMonitor {
    poll_interval: Duration,
    timeout: Duration,
}

impl ResourceMonitor {
    /// Creates a monitor with the given cadence.
    #[must_use]
    pub const fn new(timing: MonitorTiming) -> Self {
        Self {
            poll_interval: timing.poll_interval,
            timeout: timing.timeout,
        }
    }

    /// Watches `identity` until success, failure, or timeout.
    ///
    /// Transient query failures are treated as "state unknown" and polling
    /// continues. Structural failures end the watch immediately.
    pub async fn watch<S>(&self, source: &S, identity: &ResourceIdentity) -> MonitorOutcome
    where
        S: StatusSource + ?Sized,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut queries: u32 = 0;

        loop {
            if Instant::now() >= deadline {
                break;
            }

            queries = queries.saturating_add(1);
            let Ok(result) = timeout_at(deadline, source.query(identity)).await else {
                break;
            };

            match result {
                Ok(ProvisioningState::Succeeded) => {
                    info!(resource = %identity, queries, "resource provisioned");
                    return MonitorOutcome::Succeeded { queries };
                }
                Ok(state) if state.is_failure() => {
                    warn!(resource = %identity, %state, "resource provisioning failed");
                    return MonitorOutcome::Failed {
                        state: state.to_string(),
                    };
                }
                Ok(state) => {
                    debug!(resource = %identity, %state, "resource still provisioning");
                }
                Err(err) if err.is_structural() => {
                    warn!(resource = %identity, error = %err, "monitoring aborted");
                    return MonitorOutcome::Aborted {
                        message: err.to_string(),
                    };
                }
                Err(err) => {
                    warn!(resource = %identity, error = %err, "status query failed; will retry");
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(self.poll_interval.min(remaining)).await;
        }

        let elapsed = started.elapsed();
        warn!(
            resource = %identity,
            elapsed_secs = elapsed.as_secs(),
            "timed out waiting for a terminal provisioning state"
        );
        MonitorOutcome::TimedOut { elapsed }
    }
}

#[cfg(test)]
mod tests;
