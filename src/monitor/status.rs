//! Provisioning-state lookups against the backend.

use std::ffi::OsString;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tracing::debug;

use crate::runner::{CommandRunner, render_command};

const RESOURCE_GROUP_NOT_FOUND: &str = "ResourceGroupNotFound";
const VNET_COMMAND: &[&str] = &["network", "vnet"];
const VNET_GATEWAY_COMMAND: &[&str] = &["network", "vnet-gateway"];
const NAT_GATEWAY_COMMAND: &[&str] = &["network", "nat", "gateway"];

/// Identifies one resource for status lookups.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResourceIdentity {
    /// Resource group that owns the resource.
    pub resource_group: String,
    /// Provider type tag (for example `vnet`).
    pub resource_type: String,
    /// Resource name.
    pub resource_name: String,
}

impl ResourceIdentity {
    /// Builds an identity from its three parts.
    #[must_use]
    pub fn new(resource_group: &str, resource_type: &str, resource_name: &str) -> Self {
        Self {
            resource_group: resource_group.to_owned(),
            resource_type: resource_type.to_owned(),
            resource_name: resource_name.to_owned(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.resource_group, self.resource_type, self.resource_name
        )
    }
}

/// Provisioning state reported by the backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProvisioningState {
    /// The resource finished provisioning.
    Succeeded,
    /// Provisioning failed.
    Failed,
    /// Provisioning was cancelled; treated as a failed terminal state.
    Canceled,
    /// Any non-terminal state such as `Creating`, `Updating` or `Accepted`.
    Transitional(String),
}

impl ProvisioningState {
    /// Classifies a raw state string. Matching is case-insensitive.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Transitional(trimmed.to_owned()),
        }
    }

    /// Returns `true` for states from which no further transition happens.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Transitional(_))
    }

    /// Returns `true` for terminal states other than success.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
            Self::Canceled => f.write_str("Canceled"),
            Self::Transitional(state) => f.write_str(state),
        }
    }
}

/// Errors raised by a status query.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StatusError {
    /// The query failed in a way that may resolve on its own, for example a
    /// network blip or a resource the backend does not list yet.
    #[error("status unknown for {identity}: {message}")]
    Transient {
        /// Resource being queried.
        identity: String,
        /// Description of the failure.
        message: String,
    },
    /// The resource group does not exist, so the resource never will.
    #[error("resource group {resource_group} does not exist")]
    ResourceGroupNotFound {
        /// Missing resource group.
        resource_group: String,
    },
    /// The status lookup does not know how to query this resource type.
    #[error("unsupported resource type {resource_type}")]
    UnsupportedResourceType {
        /// Type tag that has no lookup command.
        resource_type: String,
    },
    /// The status command could not be started.
    #[error("failed to start status query: {message}")]
    Spawn {
        /// Operating system error string.
        message: String,
    },
}

impl StatusError {
    /// Structural errors will not go away by polling again.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        !matches!(self, Self::Transient { .. })
    }
}

/// Future returned by [`StatusSource::query`].
pub type StatusFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ProvisioningState, StatusError>> + Send + 'a>>;

/// Read-only provisioning-state lookup. Queries must be idempotent.
pub trait StatusSource: Send + Sync {
    /// Returns the current provisioning state of `identity`.
    fn query<'a>(&'a self, identity: &'a ResourceIdentity) -> StatusFuture<'a>;
}

/// Status lookup backed by `az network ... show`.
#[derive(Clone, Debug)]
pub struct AzStatusSource<R> {
    az_bin: String,
    runner: R,
}

impl<R: CommandRunner> AzStatusSource<R> {
    /// Creates a status source that calls `az_bin` through `runner`.
    #[must_use]
    pub fn new(az_bin: impl Into<String>, runner: R) -> Self {
        Self {
            az_bin: az_bin.into(),
            runner,
        }
    }

    async fn lookup(&self, identity: &ResourceIdentity) -> Result<ProvisioningState, StatusError> {
        let args = build_show_args(identity)?;
        debug!(command = %render_command(&self.az_bin, &args), "querying provisioning state");

        let output = self
            .runner
            .run(&self.az_bin, &args)
            .await
            .map_err(|err| StatusError::Spawn {
                message: err.to_string(),
            })?;

        if !output.is_success() {
            if output.stderr.contains(RESOURCE_GROUP_NOT_FOUND) {
                return Err(StatusError::ResourceGroupNotFound {
                    resource_group: identity.resource_group.clone(),
                });
            }
            return Err(StatusError::Transient {
                identity: identity.to_string(),
                message: format!(
                    "{} exited with status {}: {}",
                    self.az_bin,
                    output.status_text(),
                    output.stderr.trim()
                ),
            });
        }

        parse_state(&output.stdout).ok_or_else(|| StatusError::Transient {
            identity: identity.to_string(),
            message: format!("no provisioning state in output '{}'", output.stdout.trim()),
        })
    }
}

impl<R: CommandRunner> StatusSource for AzStatusSource<R> {
    fn query<'a>(&'a self, identity: &'a ResourceIdentity) -> StatusFuture<'a> {
        Box::pin(self.lookup(identity))
    }
}

fn subcommand_for(resource_type: &str) -> Option<&'static [&'static str]> {
    match resource_type {
        "vnet" => Some(VNET_COMMAND),
        "vnet-gateway" => Some(VNET_GATEWAY_COMMAND),
        "nat-gateway" => Some(NAT_GATEWAY_COMMAND),
        _ => None,
    }
}

fn build_show_args(identity: &ResourceIdentity) -> Result<Vec<OsString>, StatusError> {
    let subcommand =
        subcommand_for(&identity.resource_type).ok_or_else(|| StatusError::UnsupportedResourceType {
            resource_type: identity.resource_type.clone(),
        })?;

    let mut args: Vec<OsString> = subcommand.iter().map(OsString::from).collect();
    args.extend(
        [
            "show",
            "--resource-group",
            identity.resource_group.as_str(),
            "--name",
            identity.resource_name.as_str(),
            "--query",
            "provisioningState",
            "--output",
            "json",
        ]
        .into_iter()
        .map(OsString::from),
    );
    Ok(args)
}

/// Parses `"Succeeded"` style JSON output. `null` and blank output mean the
/// state is not known yet.
fn parse_state(stdout: &str) -> Option<ProvisioningState> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    let raw = serde_json::from_str::<Option<String>>(trimmed)
        .unwrap_or_else(|_| Some(trimmed.to_owned()))?;
    if raw.trim().is_empty() {
        return None;
    }
    Some(ProvisioningState::parse(&raw))
}
