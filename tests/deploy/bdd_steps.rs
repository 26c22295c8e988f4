//! BDD step definitions for hub network deployments.

use hubnet::test_support::ScriptedRunner;
use hubnet::{ComponentName, DeployOptions, FailurePolicy, MonitorMode, ProvisioningState};
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{DeployContext, DeployTestError, paused_runtime, parse_component};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Setup(#[from] DeployTestError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a hub network deployment")]
fn hub_network_deployment(deploy_context: DeployContext) -> DeployContext {
    deploy_context
}

#[given("optional component failures are tolerated")]
fn optional_failures_tolerated(mut deploy_context: DeployContext) -> DeployContext {
    deploy_context.options.policy = FailurePolicy::ContinueOnOptionalFailure;
    deploy_context
}

#[given("the {component} reports \"{states}\"")]
fn component_reports(
    deploy_context: DeployContext,
    component: String,
    states: String,
) -> Result<DeployContext, StepError> {
    let resource_name = deploy_context
        .catalog
        .spec(parse_component(&component)?)
        .resource_name;
    for state in states.split(',') {
        deploy_context
            .source
            .push_for(&resource_name, Ok(ProvisioningState::parse(state.trim())));
    }
    Ok(deploy_context)
}

#[given("the vpn gateway deployment command fails")]
fn vpn_gateway_command_fails(mut deploy_context: DeployContext) -> DeployContext {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_failure(1);
    runner.push_success();
    deploy_context.runner = runner;
    deploy_context
}

#[when("I deploy every component")]
fn deploy_every_component(deploy_context: DeployContext) -> Result<DeployContext, StepError> {
    let options = deploy_context.options;
    deploy_full_with(deploy_context, options)
}

#[when("I deploy every component in the background")]
fn deploy_every_component_in_background(
    deploy_context: DeployContext,
) -> Result<DeployContext, StepError> {
    let options = DeployOptions {
        monitor: MonitorMode::Background,
        ..deploy_context.options
    };
    deploy_full_with(deploy_context, options)
}

fn deploy_full_with(
    mut deploy_context: DeployContext,
    options: DeployOptions,
) -> Result<DeployContext, StepError> {
    let orchestrator = deploy_context.orchestrator();
    let report = paused_runtime()?
        .block_on(async move { orchestrator.deploy_full(&DeployContext::args(), options).await })
        .map_err(|err| DeployTestError::Deploy(err.to_string()))?;
    deploy_context.report = Some(report);
    Ok(deploy_context)
}

#[when("I deploy only the nat gateway")]
fn deploy_nat_gateway(mut deploy_context: DeployContext) -> Result<DeployContext, StepError> {
    let orchestrator = deploy_context.orchestrator();
    let options = deploy_context.options;
    let report = paused_runtime()?
        .block_on(async move {
            orchestrator
                .deploy_component(ComponentName::NatGateway, &DeployContext::args(), options)
                .await
        })
        .map_err(|err| DeployTestError::Deploy(err.to_string()))?;
    deploy_context.report = Some(report);
    Ok(deploy_context)
}

#[when("I deploy only the vpn gateway in the background")]
fn deploy_vpn_gateway_in_background(
    mut deploy_context: DeployContext,
) -> Result<DeployContext, StepError> {
    let orchestrator = deploy_context.orchestrator();
    let options = DeployOptions {
        monitor: MonitorMode::Background,
        ..deploy_context.options
    };
    let (report, finished) = paused_runtime()?.block_on(async move {
        let report = orchestrator
            .deploy_component(ComponentName::VpnGateway, &DeployContext::args(), options)
            .await
            .map_err(|err| DeployTestError::Deploy(err.to_string()))?;
        let Some(launched) = report.launched_jobs().next() else {
            return Err(DeployTestError::Deploy(String::from(
                "no background job was launched",
            )));
        };
        let finished = orchestrator
            .jobs()
            .wait(launched.id)
            .await
            .map_err(|err| DeployTestError::Deploy(err.to_string()))?;
        Ok((report, finished))
    })?;

    deploy_context.launched = report.launched_jobs().next().cloned();
    deploy_context.finished = Some(finished);
    deploy_context.report = Some(report);
    Ok(deploy_context)
}

#[then("the deployment result is success")]
fn deployment_succeeds(deploy_context: &DeployContext) -> Result<(), StepError> {
    let report = report(deploy_context)?;
    if report.is_success() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected success, got {report:?}"
        )))
    }
}

#[then("the deployment result is failure")]
fn deployment_fails(deploy_context: &DeployContext) -> Result<(), StepError> {
    let report = report(deploy_context)?;
    if report.is_success() {
        Err(StepError::Assertion(String::from(
            "expected the deployment to fail",
        )))
    } else {
        Ok(())
    }
}

#[then("the {component} was queried {count} times")]
fn component_queried(
    deploy_context: &DeployContext,
    component: String,
    count: usize,
) -> Result<(), StepError> {
    let queries = deploy_context.queries_for(parse_component(&component)?);
    if queries == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} status queries for {component}, got {queries}"
        )))
    }
}

#[then("the {component} deployment is never invoked")]
fn deployment_never_invoked(
    deploy_context: &DeployContext,
    component: String,
) -> Result<(), StepError> {
    if deploy_context.was_deployed(parse_component(&component)?) {
        Err(StepError::Assertion(format!(
            "{component} should not have been deployed"
        )))
    } else {
        Ok(())
    }
}

#[then("a warning mentions \"{text}\"")]
fn warning_mentions(deploy_context: &DeployContext, text: String) -> Result<(), StepError> {
    let warnings = report(deploy_context)?.warnings();
    if warnings.iter().any(|warning| warning.contains(&text)) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "no warning mentions {text}: {warnings:?}"
        )))
    }
}

#[then("the launched job is reported as \"{status}\"")]
fn launched_job_status(deploy_context: &DeployContext, status: String) -> Result<(), StepError> {
    let job = deploy_context
        .launched
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing launched job")))?;
    expect_status(&job.status.to_string(), &status)
}

#[then("the finished job is reported as \"{status}\"")]
fn finished_job_status(deploy_context: &DeployContext, status: String) -> Result<(), StepError> {
    let job = deploy_context
        .finished
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing finished job")))?;
    expect_status(&job.status.to_string(), &status)
}

fn report(deploy_context: &DeployContext) -> Result<&hubnet::DeploymentReport, StepError> {
    deploy_context
        .report
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing deployment report")))
}

fn expect_status(actual: &str, expected: &str) -> Result<(), StepError> {
    if actual == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected job status {expected}, got {actual}"
        )))
    }
}
