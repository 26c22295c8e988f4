//! Deployable components of the hub network and their naming rules.
//!
//! Each [`ComponentName`] maps to a fixed resource type, template file and
//! monitoring cadence. Resource names are derived from the environment,
//! location code and project so that a later status lookup reproduces exactly
//! the name the deployment used.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::monitor::ResourceIdentity;

/// One of the three deployable units, listed in deployment order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ComponentName {
    /// The hub virtual network. Every other component depends on it.
    Network,
    /// Point-to-site VPN gateway attached to the hub network.
    VpnGateway,
    /// NAT gateway providing outbound connectivity for the hub subnets.
    NatGateway,
}

impl ComponentName {
    /// All components in the order a full deployment applies them.
    pub const ALL: [Self; 3] = [Self::Network, Self::VpnGateway, Self::NatGateway];

    /// Provider resource type tag used by the status lookup.
    #[must_use]
    pub const fn resource_type(self) -> &'static str {
        match self {
            Self::Network => "vnet",
            Self::VpnGateway => "vnet-gateway",
            Self::NatGateway => "nat-gateway",
        }
    }

    /// Short form embedded in resource names.
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::Network => "vnet",
            Self::VpnGateway => "vpngw",
            Self::NatGateway => "natgw",
        }
    }

    /// Kebab-case label used for deployment names and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::VpnGateway => "vpn-gateway",
            Self::NatGateway => "nat-gateway",
        }
    }

    /// Template file name, relative to the configured template directory.
    #[must_use]
    pub const fn template_file(self) -> &'static str {
        match self {
            Self::Network => "network.bicep",
            Self::VpnGateway => "vpn-gateway.bicep",
            Self::NatGateway => "nat-gateway.bicep",
        }
    }

    /// Returns `true` for components a full deployment may tolerate losing
    /// when configured to continue past optional failures.
    #[must_use]
    pub const fn is_optional(self) -> bool {
        !matches!(self, Self::Network)
    }

    /// Default polling cadence. Gateways take tens of minutes to provision.
    #[must_use]
    pub const fn default_timing(self) -> MonitorTiming {
        match self {
            Self::Network => MonitorTiming::new(Duration::from_secs(10), Duration::from_secs(5 * 60)),
            Self::VpnGateway => {
                MonitorTiming::new(Duration::from_secs(30), Duration::from_secs(60 * 60))
            }
            Self::NatGateway => {
                MonitorTiming::new(Duration::from_secs(15), Duration::from_secs(15 * 60))
            }
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ComponentName {
    type Err = ComponentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalised = value.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match normalised.as_str() {
            "network" | "vnet" => Ok(Self::Network),
            "vpngateway" | "vpngw" | "vnetgateway" => Ok(Self::VpnGateway),
            "natgateway" | "natgw" => Ok(Self::NatGateway),
            _ => Err(ComponentError::Unknown(value.to_owned())),
        }
    }
}

/// Errors raised while resolving components.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ComponentError {
    /// Raised when a component name does not match any known component.
    #[error("unknown component '{0}' (expected network, vpn-gateway or nat-gateway)")]
    Unknown(String),
}

/// Poll interval and overall budget for monitoring one resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MonitorTiming {
    /// Delay between two status queries.
    pub poll_interval: Duration,
    /// Hard cutoff after which monitoring gives up.
    pub timeout: Duration,
}

impl MonitorTiming {
    /// Creates a timing pair.
    #[must_use]
    pub const fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

/// Inputs to resource naming. All names follow
/// `{env}-{location_code}-{abbreviation}-{project}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Naming {
    env: String,
    location_code: String,
    project: String,
}

impl Naming {
    /// Builds naming inputs, trimming surrounding whitespace.
    #[must_use]
    pub fn new(env: &str, location_code: &str, project: &str) -> Self {
        Self {
            env: env.trim().to_owned(),
            location_code: location_code.trim().to_owned(),
            project: project.trim().to_owned(),
        }
    }

    /// Name of the resource deployed for `component`.
    #[must_use]
    pub fn resource_name(&self, component: ComponentName) -> String {
        format!(
            "{}-{}-{}-{}",
            self.env,
            self.location_code,
            component.abbreviation(),
            self.project
        )
    }

    /// Resource group name used when none is configured explicitly.
    #[must_use]
    pub fn resource_group(&self) -> String {
        format!("{}-{}-rg-{}", self.env, self.location_code, self.project)
    }
}

/// Everything needed to deploy and monitor one component.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComponentSpec {
    /// Which component this spec describes.
    pub name: ComponentName,
    /// Resource type tag understood by the status lookup.
    pub resource_type: String,
    /// Deterministic resource name.
    pub resource_name: String,
    /// Template passed to the provisioning command.
    pub template: Utf8PathBuf,
    /// Monitoring cadence for this component.
    pub timing: MonitorTiming,
}

impl ComponentSpec {
    /// Resource identity used for status queries within `resource_group`.
    #[must_use]
    pub fn identity(&self, resource_group: &str) -> ResourceIdentity {
        ResourceIdentity::new(resource_group, &self.resource_type, &self.resource_name)
    }
}

/// Lookup table from [`ComponentName`] to [`ComponentSpec`].
#[derive(Clone, Debug)]
pub struct ComponentCatalog {
    naming: Naming,
    template_dir: Utf8PathBuf,
    timings: [MonitorTiming; 3],
}

impl ComponentCatalog {
    /// Creates a catalog using the default timing for every component.
    #[must_use]
    pub fn new(naming: Naming, template_dir: impl AsRef<Utf8Path>) -> Self {
        Self {
            naming,
            template_dir: template_dir.as_ref().to_path_buf(),
            timings: ComponentName::ALL.map(ComponentName::default_timing),
        }
    }

    /// Overrides the monitoring cadence for one component.
    #[must_use]
    pub fn with_timing(mut self, component: ComponentName, timing: MonitorTiming) -> Self {
        for (slot, name) in self.timings.iter_mut().zip(ComponentName::ALL) {
            if name == component {
                *slot = timing;
            }
        }
        self
    }

    /// Naming inputs backing this catalog.
    #[must_use]
    pub const fn naming(&self) -> &Naming {
        &self.naming
    }

    /// Builds the spec for `component`.
    #[must_use]
    pub fn spec(&self, component: ComponentName) -> ComponentSpec {
        let timing = self
            .timings
            .iter()
            .zip(ComponentName::ALL)
            .find_map(|(timing, name)| (name == component).then_some(*timing))
            .unwrap_or_else(|| component.default_timing());

        ComponentSpec {
            name: component,
            resource_type: component.resource_type().to_owned(),
            resource_name: self.naming.resource_name(component),
            template: self.template_dir.join(component.template_file()),
            timing,
        }
    }

    /// Specs for every component in deployment order.
    #[must_use]
    pub fn specs(&self) -> Vec<ComponentSpec> {
        ComponentName::ALL
            .into_iter()
            .map(|component| self.spec(component))
            .collect()
    }
}
