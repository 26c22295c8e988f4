//! Configuration loading via `ortho-config`.

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::component::{ComponentCatalog, Naming};
use crate::monitor::{MAX_MONITOR_WORKERS, MonitorPool};
use crate::orchestrator::FailurePolicy;
use crate::provision::DeploymentArgs;

/// Default Azure region for deployments.
pub const DEFAULT_LOCATION: &str = "westeurope";

/// Default directory holding the component templates.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

/// Default number of foreground monitor workers.
pub const DEFAULT_MONITOR_WORKERS: usize = 2;

const CONFIG_FILE: &str = "hubnet.toml";

/// Deployment settings derived from environment variables, configuration
/// files, and defaults.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "HUBNET",
    discovery(
        app_name = "hubnet",
        env_var = "HUBNET_CONFIG_PATH",
        config_file_name = "hubnet.toml",
        dotfile_name = ".hubnet.toml",
        project_file_name = "hubnet.toml"
    )
)]
pub struct DeployConfig {
    /// Environment short name, for example `dev` or `prod`.
    #[ortho_config(default = String::new())]
    pub env: String,
    /// Short location code used in resource names, for example `weu`.
    #[ortho_config(default = String::new())]
    pub location_code: String,
    /// Project short name used in resource names.
    #[ortho_config(default = String::new())]
    pub project: String,
    /// Azure region passed to the templates. Defaults to `westeurope`.
    #[ortho_config(default = DEFAULT_LOCATION.to_owned())]
    pub location: String,
    /// Explicit resource group. When absent the group is derived as
    /// `{env}-{location_code}-rg-{project}`.
    pub resource_group: Option<String>,
    /// Directory containing `network.bicep`, `vpn-gateway.bicep` and
    /// `nat-gateway.bicep`.
    #[ortho_config(default = DEFAULT_TEMPLATE_DIR.to_owned())]
    pub template_dir: String,
    /// Path to the Azure CLI executable.
    #[ortho_config(default = "az".to_owned())]
    pub az_bin: String,
    /// Number of concurrent foreground monitor workers (1 to 5).
    #[ortho_config(default = DEFAULT_MONITOR_WORKERS)]
    pub monitor_workers: usize,
    /// Keep deploying after a VPN or NAT gateway failure.
    #[ortho_config(default = false)]
    pub continue_on_optional_failure: bool,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to {CONFIG_FILE}",
            self.env_var, self.toml_key
        )
    }
}

impl DeployConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("hubnet")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and TOML key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidValue`] when a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.env,
            &FieldMetadata::new("environment name", "HUBNET_ENV", "env"),
        )?;
        Self::require_field(
            &self.location_code,
            &FieldMetadata::new("location code", "HUBNET_LOCATION_CODE", "location_code"),
        )?;
        Self::require_field(
            &self.project,
            &FieldMetadata::new("project name", "HUBNET_PROJECT", "project"),
        )?;
        Self::require_field(
            &self.location,
            &FieldMetadata::new("Azure location", "HUBNET_LOCATION", "location"),
        )?;
        Self::require_field(
            &self.template_dir,
            &FieldMetadata::new("template directory", "HUBNET_TEMPLATE_DIR", "template_dir"),
        )?;
        Self::require_field(
            &self.az_bin,
            &FieldMetadata::new("Azure CLI path", "HUBNET_AZ_BIN", "az_bin"),
        )?;

        if self
            .resource_group
            .as_deref()
            .is_some_and(|group| group.trim().is_empty())
        {
            let metadata =
                FieldMetadata::new("resource group", "HUBNET_RESOURCE_GROUP", "resource_group");
            return Err(ConfigError::InvalidValue(format!(
                "resource group must not be blank: {}",
                metadata.hint()
            )));
        }

        if !(1..=MAX_MONITOR_WORKERS).contains(&self.monitor_workers) {
            let metadata =
                FieldMetadata::new("monitor workers", "HUBNET_MONITOR_WORKERS", "monitor_workers");
            return Err(ConfigError::InvalidValue(format!(
                "{} must be between 1 and {MAX_MONITOR_WORKERS}, got {}: {}",
                metadata.description,
                self.monitor_workers,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Naming inputs for resource names.
    #[must_use]
    pub fn naming(&self) -> Naming {
        Naming::new(&self.env, &self.location_code, &self.project)
    }

    /// Explicit resource group, or the derived one when none is configured.
    #[must_use]
    pub fn resource_group_name(&self) -> String {
        self.resource_group
            .as_deref()
            .map(str::trim)
            .filter(|group| !group.is_empty())
            .map_or_else(|| self.naming().resource_group(), str::to_owned)
    }

    /// Component catalog rooted at the configured template directory.
    #[must_use]
    pub fn catalog(&self) -> ComponentCatalog {
        ComponentCatalog::new(self.naming(), Utf8PathBuf::from(self.template_dir.trim()))
    }

    /// Arguments shared by every component deployment.
    #[must_use]
    pub fn deployment_args(&self, what_if: bool, no_wait: bool) -> DeploymentArgs {
        DeploymentArgs::new(self.resource_group_name())
            .parameter("env", self.env.trim())
            .parameter("locationCode", self.location_code.trim())
            .parameter("project", self.project.trim())
            .parameter("location", self.location.trim())
            .what_if(what_if)
            .no_wait(no_wait)
    }

    /// Failure policy selected by `continue_on_optional_failure`.
    #[must_use]
    pub const fn failure_policy(&self) -> FailurePolicy {
        if self.continue_on_optional_failure {
            FailurePolicy::ContinueOnOptionalFailure
        } else {
            FailurePolicy::FailFast
        }
    }

    /// Worker pool sized by `monitor_workers`.
    #[must_use]
    pub fn monitor_pool(&self) -> MonitorPool {
        MonitorPool::new(self.monitor_workers)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is outside its accepted range.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
