//! Core library for the hubnet deployment tool.
//!
//! The crate sequences deployments of a small Azure hub network (virtual
//! network, VPN gateway, NAT gateway) through the `az` CLI and follows each
//! resource to a terminal provisioning state, either in the foreground or
//! from a background job tracked in a process-wide registry.

pub mod component;
pub mod config;
pub mod jobs;
pub mod monitor;
pub mod orchestrator;
pub mod provision;
pub mod runner;
pub mod step;
pub mod test_support;

pub use component::{
    ComponentCatalog, ComponentError, ComponentName, ComponentSpec, MonitorTiming, Naming,
};
pub use config::{ConfigError, DeployConfig};
pub use jobs::{
    ExportError, JobId, JobManager, JobRegistry, JobStatus, MonitoringJob, RegistryError,
};
pub use monitor::{
    AzStatusSource, MonitorOutcome, MonitorPool, ProvisioningState, ResourceIdentity,
    ResourceMonitor, StatusError, StatusSource,
};
pub use orchestrator::{
    DeployOptions, DeploymentOrchestrator, DeploymentReport, FailurePolicy, MonitorMode,
    OrchestratorError, StepReport,
};
pub use provision::{DeploymentArgs, InvocationOutput, ProvisionError, Provisioner};
pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner, RunnerError};
pub use step::{DeploymentOutcome, StepFailure, StepRunner, StepState};
