//! Provisioning invoker for `az deployment group create`.

use std::ffi::OsString;

use camino::Utf8Path;
use thiserror::Error;
use tracing::debug;

use crate::runner::{CommandRunner, RunnerError, render_command};

/// Prefix applied to ARM deployment names.
pub const DEPLOYMENT_NAME_PREFIX: &str = "hubnet-";

/// Arguments shared by every component deployment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeploymentArgs {
    /// Resource group receiving the deployment.
    pub resource_group: String,
    /// Template parameters passed as `key=value` pairs, in order.
    pub parameters: Vec<(String, String)>,
    /// Ask the backend to preview changes and confirm before applying.
    pub what_if: bool,
    /// Return as soon as the backend accepts the deployment.
    pub no_wait: bool,
}

impl DeploymentArgs {
    /// Creates arguments targeting `resource_group` with no parameters.
    #[must_use]
    pub fn new(resource_group: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            ..Self::default()
        }
    }

    /// Appends a template parameter.
    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    /// Enables or disables the what-if confirmation flag.
    #[must_use]
    pub const fn what_if(mut self, enabled: bool) -> Self {
        self.what_if = enabled;
        self
    }

    /// Enables or disables the no-wait flag.
    #[must_use]
    pub const fn no_wait(mut self, enabled: bool) -> Self {
        self.no_wait = enabled;
        self
    }
}

/// Exit status and raw output of one provisioning command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvocationOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Raw standard output, passed through uninterpreted.
    pub output: String,
    /// Raw standard error.
    pub stderr: String,
}

impl InvocationOutput {
    /// Returns `true` when the command exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Errors raised while invoking the provisioning backend.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// The provisioning command could not be started at all.
    #[error("failed to start provisioning command: {0}")]
    Spawn(#[from] RunnerError),
}

/// Builds and runs provisioning commands through a [`CommandRunner`].
#[derive(Clone, Debug)]
pub struct Provisioner<R> {
    az_bin: String,
    runner: R,
}

impl<R: CommandRunner> Provisioner<R> {
    /// Creates a provisioner that calls `az_bin` through `runner`.
    #[must_use]
    pub fn new(az_bin: impl Into<String>, runner: R) -> Self {
        Self {
            az_bin: az_bin.into(),
            runner,
        }
    }

    /// Deploys `template` into the configured resource group.
    ///
    /// Spawns exactly one process. A non-zero exit is reported through
    /// [`InvocationOutput::is_success`], never retried.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Spawn`] when the command cannot be started.
    pub async fn invoke(
        &self,
        template: &Utf8Path,
        label: &str,
        args: &DeploymentArgs,
    ) -> Result<InvocationOutput, ProvisionError> {
        let argv = build_deployment_args(template, label, args);
        debug!(command = %render_command(&self.az_bin, &argv), "invoking provisioning backend");

        let output = self.runner.run(&self.az_bin, &argv).await?;
        Ok(InvocationOutput {
            exit_code: output.code,
            output: output.stdout,
            stderr: output.stderr,
        })
    }
}

fn build_deployment_args(template: &Utf8Path, label: &str, args: &DeploymentArgs) -> Vec<OsString> {
    let mut argv: Vec<OsString> = ["deployment", "group", "create", "--name"]
        .into_iter()
        .map(OsString::from)
        .collect();
    argv.push(OsString::from(format!("{DEPLOYMENT_NAME_PREFIX}{label}")));
    argv.push(OsString::from("--resource-group"));
    argv.push(OsString::from(&args.resource_group));
    argv.push(OsString::from("--template-file"));
    argv.push(OsString::from(template.as_str()));

    if !args.parameters.is_empty() {
        argv.push(OsString::from("--parameters"));
        argv.extend(
            args.parameters
                .iter()
                .map(|(key, value)| OsString::from(format!("{key}={value}"))),
        );
    }
    if args.what_if {
        argv.push(OsString::from("--confirm-with-what-if"));
    }
    if args.no_wait {
        argv.push(OsString::from("--no-wait"));
    }

    argv.push(OsString::from("--output"));
    argv.push(OsString::from("json"));
    argv
}
