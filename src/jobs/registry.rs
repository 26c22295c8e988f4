//! Process-wide registry of background monitoring jobs.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::component::{ComponentName, ComponentSpec, MonitorTiming};
use crate::monitor::ResourceIdentity;

/// Unique identifier of a background job.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Lifecycle of a background job.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum JobStatus {
    /// Registered but not yet started.
    Pending,
    /// The background unit is invoking or monitoring.
    Running,
    /// The resource reached `Succeeded`.
    Succeeded,
    /// Invocation failed, the backend reported failure, or the unit crashed.
    Failed,
    /// No terminal state was observed within the budget.
    TimedOut,
}

impl JobStatus {
    /// Returns `true` once the job can no longer change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::TimedOut => "TimedOut",
        })
    }
}

/// Snapshot of one background job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MonitoringJob {
    /// Job identifier.
    pub id: JobId,
    /// Human-readable job name.
    pub name: String,
    /// Component being deployed.
    pub component: ComponentName,
    /// Resource being monitored.
    pub identity: ResourceIdentity,
    /// Monitoring cadence used by the background unit.
    pub timing: MonitorTiming,
    /// Registration time.
    pub started_at: DateTime<Utc>,
    /// Time the job reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: JobStatus,
    /// Failure detail for unsuccessful jobs.
    pub detail: Option<String>,
}

impl MonitoringJob {
    /// Creates a pending job for `spec` deployed into `resource_group`.
    #[must_use]
    pub fn pending(spec: &ComponentSpec, resource_group: &str) -> Self {
        Self {
            id: JobId::new(),
            name: format!("monitor-{}", spec.resource_name),
            component: spec.name,
            identity: spec.identity(resource_group),
            timing: spec.timing,
            started_at: Utc::now(),
            finished_at: None,
            status: JobStatus::Pending,
            detail: None,
        }
    }
}

/// Errors raised by registry operations. These indicate misuse of the
/// registry rather than infrastructure failures.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RegistryError {
    /// No job with this id is registered.
    #[error("job {id} not found")]
    NotFound {
        /// Requested id.
        id: JobId,
    },
    /// A job with this id is already registered.
    #[error("job {id} is already registered")]
    Duplicate {
        /// Conflicting id.
        id: JobId,
    },
    /// Another non-terminal job already targets the same resource.
    #[error("resource {identity} is already being deployed by job {job}")]
    ResourceBusy {
        /// Contended resource.
        identity: String,
        /// Job currently holding the resource.
        job: JobId,
    },
    /// The job already reached a terminal status and cannot change.
    #[error("job {id} already finished with status {status}")]
    AlreadyFinished {
        /// Job id.
        id: JobId,
        /// Terminal status on record.
        status: JobStatus,
    },
    /// The requested transition goes backwards.
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Job id.
        id: JobId,
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },
}

/// Shared map from [`JobId`] to [`MonitoringJob`]. Clones share storage.
#[derive(Clone, Debug, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, MonitoringJob>>>,
}

impl JobRegistry {
    /// Creates an empty, unshared registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry, creating it on first use.
    #[must_use]
    pub fn shared() -> Self {
        static SHARED: OnceLock<JobRegistry> = OnceLock::new();
        SHARED.get_or_init(Self::new).clone()
    }

    /// Registers `job`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] for a reused id and
    /// [`RegistryError::ResourceBusy`] when a non-terminal job already
    /// targets the same resource.
    pub async fn insert(&self, job: MonitoringJob) -> Result<(), RegistryError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(RegistryError::Duplicate { id: job.id });
        }
        if let Some(holder) = jobs
            .values()
            .find(|other| other.identity == job.identity && !other.status.is_terminal())
        {
            return Err(RegistryError::ResourceBusy {
                identity: job.identity.to_string(),
                job: holder.id,
            });
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    /// Returns a snapshot of job `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids.
    pub async fn get(&self, id: JobId) -> Result<MonitoringJob, RegistryError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound { id })
    }

    /// Returns snapshots of every job, oldest first.
    pub async fn list(&self) -> Vec<MonitoringJob> {
        let mut jobs: Vec<MonitoringJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// Moves job `id` to `status`, recording `detail` and, for terminal
    /// statuses, the finish time. Returns the updated snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`], [`RegistryError::AlreadyFinished`]
    /// when the job is terminal, or [`RegistryError::InvalidTransition`] when
    /// moving a running job back to pending.
    pub async fn transition(
        &self,
        id: JobId,
        status: JobStatus,
        detail: Option<String>,
    ) -> Result<MonitoringJob, RegistryError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(RegistryError::NotFound { id })?;

        if job.status.is_terminal() {
            return Err(RegistryError::AlreadyFinished {
                id,
                status: job.status,
            });
        }
        if job.status == JobStatus::Running && status == JobStatus::Pending {
            return Err(RegistryError::InvalidTransition {
                id,
                from: job.status,
                to: status,
            });
        }

        job.status = status;
        if detail.is_some() {
            job.detail = detail;
        }
        if status.is_terminal() {
            job.finished_at = Some(Utc::now());
        }
        Ok(job.clone())
    }

    /// Removes every terminal job and returns how many were removed.
    pub async fn clear_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !job.status.is_terminal());
        before - jobs.len()
    }

    /// Number of registered jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Returns `true` when no jobs are registered.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
