//! BDD scenarios for hub network deployments.

use rstest_bdd_macros::scenario;

use super::test_helpers::{DeployContext, deploy_context};

#[scenario(
    path = "tests/features/deploy.feature",
    name = "A failed VPN gateway stops a fail-fast deployment"
)]
fn scenario_fail_fast(deploy_context: DeployContext) {
    drop(deploy_context);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "A failed network stops the sequence even when continuing"
)]
fn scenario_network_failure_is_fatal(deploy_context: DeployContext) {
    drop(deploy_context);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Optional gateway failures become warnings when continuing"
)]
fn scenario_optional_failures_warn(deploy_context: DeployContext) {
    drop(deploy_context);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "A failed background gateway stops a fail-fast deployment"
)]
fn scenario_background_fail_fast(deploy_context: DeployContext) {
    drop(deploy_context);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "A single component deployment touches nothing else"
)]
fn scenario_single_component(deploy_context: DeployContext) {
    drop(deploy_context);
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "A background job settles on a terminal status"
)]
fn scenario_background_job(deploy_context: DeployContext) {
    drop(deploy_context);
}
