//! Sequences component deployments.
//!
//! A full deployment applies Network, VpnGateway and NatGateway strictly in
//! that order, one step at a time. The failure policy decides whether a
//! failed optional component stops the sequence; a failed network always
//! does, since both gateways attach to it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::component::{ComponentCatalog, ComponentName, ComponentSpec};
use crate::jobs::{JobManager, JobRegistry, JobStatus, MonitoringJob, RegistryError};
use crate::monitor::{MonitorPool, StatusSource};
use crate::provision::{DeploymentArgs, Provisioner};
use crate::runner::CommandRunner;
use crate::step::{DeploymentOutcome, StepRunner};

/// How a step waits for its resource.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MonitorMode {
    /// Rely on the provisioning command's exit code.
    None,
    /// Poll the resource state on a pooled worker and wait for it.
    #[default]
    Foreground,
    /// Hand the step to a background job and return immediately.
    Background,
}

/// What a full deployment does after a component fails.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Stop at the first failed component.
    #[default]
    FailFast,
    /// Record VPN or NAT gateway failures as warnings and carry on.
    ContinueOnOptionalFailure,
}

/// Per-call deployment options.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeployOptions {
    /// Monitoring mode for each step.
    pub monitor: MonitorMode,
    /// Failure handling for full deployments.
    pub policy: FailurePolicy,
}

/// Result of one component within a deployment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepReport {
    /// The step ran to a terminal state in the foreground.
    Completed(DeploymentOutcome),
    /// The step was handed to a background job. Within a full deployment
    /// the record is terminal; a single-component launch returns it while
    /// still running.
    Launched(MonitoringJob),
}

impl StepReport {
    /// Component this report covers.
    #[must_use]
    pub const fn component(&self) -> ComponentName {
        match self {
            Self::Completed(outcome) => outcome.component(),
            Self::Launched(job) => job.component,
        }
    }

    /// A launched job counts as successful until its record reaches a
    /// terminal status other than [`JobStatus::Succeeded`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        match self {
            Self::Completed(outcome) => outcome.is_success(),
            Self::Launched(job) => !matches!(job.status, JobStatus::Failed | JobStatus::TimedOut),
        }
    }
}

/// Outcome of a full or single-component deployment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeploymentReport {
    steps: Vec<StepReport>,
    warnings: Vec<String>,
    skipped: Vec<ComponentName>,
}

impl DeploymentReport {
    /// Returns `true` only when every attempted step succeeded and nothing
    /// was skipped. Tolerated optional failures still make this `false`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.steps.iter().all(StepReport::is_success)
    }

    /// Steps in the order they ran.
    #[must_use]
    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    /// Failures tolerated under [`FailurePolicy::ContinueOnOptionalFailure`].
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Components never attempted because the sequence stopped early.
    #[must_use]
    pub fn skipped(&self) -> &[ComponentName] {
        &self.skipped
    }

    /// Background jobs launched by this deployment.
    pub fn launched_jobs(&self) -> impl Iterator<Item = &MonitoringJob> {
        self.steps.iter().filter_map(|step| match step {
            StepReport::Launched(job) => Some(job),
            StepReport::Completed(_) => None,
        })
    }
}

/// Errors that escape the orchestrator. Deployment failures are reported
/// through [`DeploymentReport`]; only registry misuse is raised.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OrchestratorError {
    /// A background launch was rejected by the job registry.
    #[error("background job registry rejected the launch: {0}")]
    Registry(#[from] RegistryError),
}

/// Deploys components in order using a [`StepRunner`] and [`JobManager`].
#[derive(Debug)]
pub struct DeploymentOrchestrator<R, S: ?Sized> {
    catalog: ComponentCatalog,
    steps: StepRunner<R, S>,
    jobs: JobManager<R, S>,
}

impl<R, S> DeploymentOrchestrator<R, S>
where
    R: CommandRunner + 'static,
    S: StatusSource + ?Sized + 'static,
{
    /// Creates an orchestrator. Foreground monitoring uses `pool`;
    /// background jobs are recorded in `registry`.
    #[must_use]
    pub fn new(
        catalog: ComponentCatalog,
        provisioner: Arc<Provisioner<R>>,
        source: Arc<S>,
        pool: MonitorPool,
        registry: JobRegistry,
    ) -> Self {
        Self {
            catalog,
            steps: StepRunner::new(Arc::clone(&provisioner), Arc::clone(&source), pool),
            jobs: JobManager::new(provisioner, source, registry),
        }
    }

    /// Component catalog in use.
    #[must_use]
    pub const fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    /// Background job manager, for status queries and exports.
    #[must_use]
    pub const fn jobs(&self) -> &JobManager<R, S> {
        &self.jobs
    }

    /// Deploys every component in order.
    ///
    /// In background mode the network is still monitored in the foreground
    /// so that both gateways start against a provisioned network. Each
    /// gateway job is awaited before the next component starts, and its
    /// terminal status is subject to the failure policy.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Registry`] when a background launch is
    /// rejected.
    pub async fn deploy_full(
        &self,
        args: &DeploymentArgs,
        options: DeployOptions,
    ) -> Result<DeploymentReport, OrchestratorError> {
        let mut report = DeploymentReport::default();
        let specs = self.catalog.specs();
        let mut remaining = specs.iter();

        info!(resource_group = %args.resource_group, "starting full deployment");
        for spec in remaining.by_ref() {
            let mode = if spec.name == ComponentName::Network
                && options.monitor == MonitorMode::Background
            {
                MonitorMode::Foreground
            } else {
                options.monitor
            };

            let step = match self.run_step(spec, args, mode).await? {
                StepReport::Launched(job) => StepReport::Launched(self.jobs.wait(job.id).await?),
                completed @ StepReport::Completed(_) => completed,
            };
            let succeeded = step.is_success();
            let detail = failure_detail(&step);
            report.steps.push(step);
            if succeeded {
                continue;
            }

            if spec.name.is_optional() && options.policy == FailurePolicy::ContinueOnOptionalFailure
            {
                warn!(component = %spec.name, detail = %detail, "continuing after optional component failure");
                report.warnings.push(format!("{} failed: {detail}", spec.name));
                continue;
            }

            warn!(component = %spec.name, "stopping full deployment");
            break;
        }
        report.skipped = remaining.map(|spec| spec.name).collect();
        Ok(report)
    }

    /// Deploys exactly one component with no sequencing.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Registry`] when a background launch is
    /// rejected.
    pub async fn deploy_component(
        &self,
        component: ComponentName,
        args: &DeploymentArgs,
        options: DeployOptions,
    ) -> Result<DeploymentReport, OrchestratorError> {
        let spec = self.catalog.spec(component);
        let step = self.run_step(&spec, args, options.monitor).await?;
        Ok(DeploymentReport {
            steps: vec![step],
            ..DeploymentReport::default()
        })
    }

    async fn run_step(
        &self,
        spec: &ComponentSpec,
        args: &DeploymentArgs,
        mode: MonitorMode,
    ) -> Result<StepReport, OrchestratorError> {
        match mode {
            MonitorMode::Background => {
                let job = self.jobs.launch(spec.clone(), args.clone()).await?;
                Ok(StepReport::Launched(job))
            }
            MonitorMode::Foreground => Ok(StepReport::Completed(
                self.steps.run(spec, args, true).await,
            )),
            MonitorMode::None => Ok(StepReport::Completed(
                self.steps.run(spec, args, false).await,
            )),
        }
    }
}

fn failure_detail(step: &StepReport) -> String {
    match step {
        StepReport::Completed(outcome) => outcome
            .failure()
            .map_or_else(|| String::from("unknown failure"), ToString::to_string),
        StepReport::Launched(job) => job
            .detail
            .clone()
            .unwrap_or_else(|| format!("job {} ended {}", job.id, job.status)),
    }
}
