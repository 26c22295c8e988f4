//! Step runner: one component deployment from invocation to terminal state.
//!
//! A step walks `NotStarted -> Invoking -> (MonitoringForeground | Skipped)`
//! and ends in `Succeeded` or `Failed`. The visited states are kept on the
//! resulting [`DeploymentOutcome`] so callers and tests can see which path a
//! step took.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::component::{ComponentName, ComponentSpec};
use crate::monitor::{MonitorOutcome, MonitorPool, ResourceMonitor, StatusSource};
use crate::provision::{DeploymentArgs, ProvisionError, Provisioner};
use crate::runner::CommandRunner;

/// Template parameter carrying the derived resource name.
pub const RESOURCE_NAME_PARAMETER: &str = "resourceName";

/// States visited by a step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepState {
    /// The step has not begun.
    NotStarted,
    /// The provisioning command is running.
    Invoking,
    /// A pooled worker is polling the resource state.
    MonitoringForeground,
    /// Monitoring was not requested; the exit code decides.
    Skipped,
    /// Terminal success.
    Succeeded,
    /// Terminal failure.
    Failed,
}

/// Reasons a step ended in failure.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StepFailure {
    /// The provisioning command could not be started.
    #[error("could not start provisioning command: {message}")]
    Spawn {
        /// Underlying spawn error.
        message: String,
    },
    /// The provisioning command exited unsuccessfully.
    #[error("provisioning command exited with status {status}: {stderr}")]
    ExitCode {
        /// Exit status, or `signal` when terminated by a signal.
        status: String,
        /// Trimmed standard error of the command.
        stderr: String,
    },
    /// The backend reported a failed provisioning state.
    #[error("resource reached provisioning state {state}")]
    MonitorFailed {
        /// Reported terminal state.
        state: String,
    },
    /// No terminal state was observed within the monitoring budget.
    #[error("no terminal provisioning state after {}s", .elapsed.as_secs())]
    MonitorTimeout {
        /// Time spent monitoring.
        elapsed: Duration,
    },
    /// Monitoring stopped on a structural error or a crashed worker.
    #[error("monitoring aborted: {message}")]
    MonitorAborted {
        /// Description of the abort.
        message: String,
    },
}

impl StepFailure {
    /// Maps a monitor outcome to a failure; success maps to `None`.
    #[must_use]
    pub fn from_monitor(outcome: MonitorOutcome) -> Option<Self> {
        match outcome {
            MonitorOutcome::Succeeded { .. } => None,
            MonitorOutcome::Failed { state } => Some(Self::MonitorFailed { state }),
            MonitorOutcome::TimedOut { elapsed } => Some(Self::MonitorTimeout { elapsed }),
            MonitorOutcome::Aborted { message } => Some(Self::MonitorAborted { message }),
        }
    }
}

impl From<ProvisionError> for StepFailure {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::Spawn(source) => Self::Spawn {
                message: source.to_string(),
            },
        }
    }
}

/// Immutable result of one step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeploymentOutcome {
    component: ComponentName,
    failure: Option<StepFailure>,
    path: Vec<StepState>,
}

impl DeploymentOutcome {
    /// Component the step deployed.
    #[must_use]
    pub const fn component(&self) -> ComponentName {
        self.component
    }

    /// Returns `true` when the step reached [`StepState::Succeeded`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Failure detail, when the step failed.
    #[must_use]
    pub const fn failure(&self) -> Option<&StepFailure> {
        self.failure.as_ref()
    }

    /// States visited, starting with [`StepState::NotStarted`].
    #[must_use]
    pub fn path(&self) -> &[StepState] {
        &self.path
    }
}

/// Tracks the visited states while a step runs.
struct StepTrace {
    component: ComponentName,
    path: Vec<StepState>,
}

impl StepTrace {
    fn start(component: ComponentName) -> Self {
        Self {
            component,
            path: vec![StepState::NotStarted, StepState::Invoking],
        }
    }

    fn enter(&mut self, state: StepState) {
        self.path.push(state);
    }

    fn finish(mut self, failure: Option<StepFailure>) -> DeploymentOutcome {
        match &failure {
            None => {
                self.path.push(StepState::Succeeded);
                info!(component = %self.component, "component deployed");
            }
            Some(err) => {
                self.path.push(StepState::Failed);
                warn!(component = %self.component, error = %err, "component deployment failed");
            }
        }
        DeploymentOutcome {
            component: self.component,
            failure,
            path: self.path,
        }
    }
}

/// Arguments for one component: the shared arguments plus its resource name.
#[must_use]
pub fn component_args(spec: &ComponentSpec, args: &DeploymentArgs) -> DeploymentArgs {
    args.clone()
        .parameter(RESOURCE_NAME_PARAMETER, spec.resource_name.clone())
}

/// Invokes the provisioning command for `spec`, mapping failures.
///
/// # Errors
///
/// Returns [`StepFailure::Spawn`] or [`StepFailure::ExitCode`].
pub async fn invoke_component<R: CommandRunner>(
    provisioner: &Provisioner<R>,
    spec: &ComponentSpec,
    args: &DeploymentArgs,
) -> Result<(), StepFailure> {
    info!(
        component = %spec.name,
        resource = %spec.resource_name,
        template = %spec.template,
        "invoking provisioning backend"
    );
    let output = provisioner
        .invoke(&spec.template, spec.name.label(), &component_args(spec, args))
        .await?;
    if output.is_success() {
        return Ok(());
    }
    Err(StepFailure::ExitCode {
        status: output
            .exit_code
            .map_or_else(|| String::from("signal"), |code| code.to_string()),
        stderr: output.stderr.trim().to_owned(),
    })
}

/// Runs single component steps with optional foreground monitoring.
#[derive(Debug)]
pub struct StepRunner<R, S: ?Sized> {
    provisioner: Arc<Provisioner<R>>,
    source: Arc<S>,
    pool: MonitorPool,
}

impl<R, S: ?Sized> Clone for StepRunner<R, S> {
    fn clone(&self) -> Self {
        Self {
            provisioner: Arc::clone(&self.provisioner),
            source: Arc::clone(&self.source),
            pool: self.pool.clone(),
        }
    }
}

impl<R, S> StepRunner<R, S>
where
    R: CommandRunner + 'static,
    S: StatusSource + ?Sized + 'static,
{
    /// Creates a runner over shared collaborators.
    #[must_use]
    pub const fn new(provisioner: Arc<Provisioner<R>>, source: Arc<S>, pool: MonitorPool) -> Self {
        Self {
            provisioner,
            source,
            pool,
        }
    }

    /// Deploys `spec` and, when `monitor` is set, waits for a terminal
    /// provisioning state on a pooled worker.
    ///
    /// A spawn failure or non-zero exit fails the step without monitoring.
    pub async fn run(
        &self,
        spec: &ComponentSpec,
        args: &DeploymentArgs,
        monitor: bool,
    ) -> DeploymentOutcome {
        let mut trace = StepTrace::start(spec.name);

        if let Err(failure) = invoke_component(&self.provisioner, spec, args).await {
            return trace.finish(Some(failure));
        }

        if !monitor {
            trace.enter(StepState::Skipped);
            return trace.finish(None);
        }

        trace.enter(StepState::MonitoringForeground);
        let outcome = self
            .pool
            .run(
                ResourceMonitor::new(spec.timing),
                Arc::clone(&self.source),
                spec.identity(&args.resource_group),
            )
            .await;
        trace.finish(StepFailure::from_monitor(outcome))
    }
}
