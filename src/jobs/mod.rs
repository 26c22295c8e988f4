//! Background deployments tracked in a [`JobRegistry`].
//!
//! [`JobManager::launch`] registers a job, spawns a detached unit that runs
//! invocation followed by monitoring, and returns immediately. The unit only
//! owns its inputs; a supervising task awaits it and is the single writer of
//! the job's terminal status. A unit that panics or is cancelled is recorded
//! as [`JobStatus::Failed`], so no job stays `Running` after its unit ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use camino::Utf8Path;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::component::ComponentSpec;
use crate::monitor::{ResourceMonitor, StatusSource};
use crate::provision::{DeploymentArgs, Provisioner};
use crate::runner::CommandRunner;
use crate::step::{StepFailure, invoke_component};

mod export;
mod registry;

pub use export::{ExportError, render_job, write_job};
pub use registry::{JobId, JobRegistry, JobStatus, MonitoringJob, RegistryError};

/// Launches and tracks background deployments.
#[derive(Debug)]
pub struct JobManager<R, S: ?Sized> {
    provisioner: Arc<Provisioner<R>>,
    source: Arc<S>,
    registry: JobRegistry,
    supervisors: Mutex<HashMap<JobId, JoinHandle<()>>>,
}

impl<R, S> JobManager<R, S>
where
    R: CommandRunner + 'static,
    S: StatusSource + ?Sized + 'static,
{
    /// Creates a manager that records jobs in `registry`.
    #[must_use]
    pub fn new(provisioner: Arc<Provisioner<R>>, source: Arc<S>, registry: JobRegistry) -> Self {
        Self {
            provisioner,
            source,
            registry,
            supervisors: Mutex::new(HashMap::new()),
        }
    }

    /// Registry backing this manager.
    #[must_use]
    pub const fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Starts a background deployment of `spec` and returns its running
    /// job record without waiting for the deployment.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ResourceBusy`] when another job is still
    /// deploying the same resource.
    pub async fn launch(
        &self,
        spec: ComponentSpec,
        args: DeploymentArgs,
    ) -> Result<MonitoringJob, RegistryError> {
        let job = MonitoringJob {
            status: JobStatus::Running,
            ..MonitoringJob::pending(&spec, &args.resource_group)
        };
        self.registry.insert(job.clone()).await?;

        let unit = tokio::spawn(run_unit(
            Arc::clone(&self.provisioner),
            Arc::clone(&self.source),
            spec,
            args,
        ));
        let supervisor = tokio::spawn(supervise(self.registry.clone(), job.id, unit));
        let mut supervisors = self
            .supervisors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        prune_finished(&mut supervisors);
        supervisors.insert(job.id, supervisor);

        info!(job = %job.id, resource = %job.identity, "background deployment launched");
        Ok(job)
    }

    /// Returns the current record of job `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids.
    pub async fn query_status(&self, id: JobId) -> Result<MonitoringJob, RegistryError> {
        prune_finished(
            &mut self
                .supervisors
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        self.registry.get(id).await
    }

    /// Waits until job `id` has a terminal status and returns its record.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown ids.
    pub async fn wait(&self, id: JobId) -> Result<MonitoringJob, RegistryError> {
        let handle = self
            .supervisors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(supervisor) = handle {
            if let Err(err) = supervisor.await {
                error!(job = %id, error = %err, "job supervisor terminated abnormally");
            }
        }
        self.registry.get(id).await
    }

    /// Writes a text dump of job `id` to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Registry`] for unknown ids or
    /// [`ExportError::Io`] when the file cannot be written.
    pub async fn export_job_info(&self, id: JobId, path: &Utf8Path) -> Result<(), ExportError> {
        let job = self.registry.get(id).await?;
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_job(&target, &job))
            .await
            .map_err(|err| ExportError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            })??;
        info!(job = %id, path = %path, "exported job record");
        Ok(())
    }
}

/// Drops handles of supervisors that have already recorded their job.
fn prune_finished(supervisors: &mut HashMap<JobId, JoinHandle<()>>) {
    supervisors.retain(|_, handle| !handle.is_finished());
}

async fn run_unit<R, S>(
    provisioner: Arc<Provisioner<R>>,
    source: Arc<S>,
    spec: ComponentSpec,
    args: DeploymentArgs,
) -> Result<(), StepFailure>
where
    R: CommandRunner,
    S: StatusSource + ?Sized,
{
    invoke_component(&provisioner, &spec, &args).await?;
    let outcome = ResourceMonitor::new(spec.timing)
        .watch(source.as_ref(), &spec.identity(&args.resource_group))
        .await;
    StepFailure::from_monitor(outcome).map_or(Ok(()), Err)
}

async fn supervise(
    registry: JobRegistry,
    id: JobId,
    unit: JoinHandle<Result<(), StepFailure>>,
) {
    let (status, detail) = classify(unit.await);
    match status {
        JobStatus::Succeeded => info!(job = %id, "background deployment succeeded"),
        _ => warn!(
            job = %id,
            %status,
            detail = detail.as_deref().unwrap_or_default(),
            "background deployment did not succeed"
        ),
    }
    if let Err(err) = registry.transition(id, status, detail).await {
        error!(job = %id, error = %err, "failed to record background job result");
    }
}

fn classify(result: Result<Result<(), StepFailure>, JoinError>) -> (JobStatus, Option<String>) {
    match result {
        Ok(Ok(())) => (JobStatus::Succeeded, None),
        Ok(Err(failure @ StepFailure::MonitorTimeout { .. })) => {
            (JobStatus::TimedOut, Some(failure.to_string()))
        }
        Ok(Err(failure)) => (JobStatus::Failed, Some(failure.to_string())),
        Err(err) => (
            JobStatus::Failed,
            Some(format!("background unit crashed: {err}")),
        ),
    }
}
