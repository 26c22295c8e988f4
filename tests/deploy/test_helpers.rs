//! Shared fixtures for deployment BDD scenarios.

use std::sync::Arc;

use hubnet::test_support::{ScriptedRunner, ScriptedStatusSource};
use hubnet::{
    ComponentCatalog, ComponentName, DeployOptions, DeploymentArgs, DeploymentOrchestrator,
    DeploymentReport, JobRegistry, MonitorPool, MonitoringJob, Naming, Provisioner,
};
use rstest::fixture;
use thiserror::Error;
use tokio::runtime::{Builder, Runtime};

use crate::test_constants::{ENV, LOCATION_CODE, PROJECT, RESOURCE_GROUP};

#[derive(Clone, Debug)]
pub struct DeployContext {
    pub runner: ScriptedRunner,
    pub source: Arc<ScriptedStatusSource>,
    pub catalog: ComponentCatalog,
    pub options: DeployOptions,
    pub report: Option<DeploymentReport>,
    pub launched: Option<MonitoringJob>,
    pub finished: Option<MonitoringJob>,
}

#[derive(Debug, Error)]
pub enum DeployTestError {
    #[error("failed to build runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("deployment error: {0}")]
    Deploy(String),
}

#[fixture]
pub fn deploy_context() -> DeployContext {
    let runner = ScriptedRunner::new();
    for _ in ComponentName::ALL {
        runner.push_success();
    }
    DeployContext {
        runner,
        source: Arc::new(ScriptedStatusSource::default()),
        catalog: ComponentCatalog::new(Naming::new(ENV, LOCATION_CODE, PROJECT), "templates"),
        options: DeployOptions::default(),
        report: None,
        launched: None,
        finished: None,
    }
}

impl DeployContext {
    pub fn orchestrator(&self) -> DeploymentOrchestrator<ScriptedRunner, ScriptedStatusSource> {
        DeploymentOrchestrator::new(
            self.catalog.clone(),
            Arc::new(Provisioner::new("az", self.runner.clone())),
            Arc::clone(&self.source),
            MonitorPool::new(2),
            JobRegistry::new(),
        )
    }

    pub fn args() -> DeploymentArgs {
        DeploymentArgs::new(RESOURCE_GROUP)
    }

    /// Number of status queries issued for `component`.
    pub fn queries_for(&self, component: ComponentName) -> usize {
        let name = self.catalog.spec(component).resource_name;
        self.source
            .queried()
            .iter()
            .filter(|identity| identity.resource_name == name)
            .count()
    }

    /// Returns `true` when a deployment was issued for `component`.
    pub fn was_deployed(&self, component: ComponentName) -> bool {
        let deployment_name = format!("hubnet-{}", component.label());
        self.runner
            .deployments()
            .iter()
            .any(|call| call.has_arg(&deployment_name))
    }
}

/// Paused-clock runtime so monitor intervals elapse instantly.
pub fn paused_runtime() -> Result<Runtime, DeployTestError> {
    Ok(Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()?)
}

pub fn parse_component(raw: &str) -> Result<ComponentName, DeployTestError> {
    raw.parse()
        .map_err(|err: hubnet::ComponentError| DeployTestError::Deploy(err.to_string()))
}
