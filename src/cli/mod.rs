//! Command-line interface definitions for the `hubnet` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, ValueEnum};

/// Top-level CLI for the `hubnet` binary.
#[derive(Debug, Parser)]
#[command(
    name = "hubnet",
    about = "Deploy and monitor an Azure hub network (VNet, VPN gateway, NAT gateway)",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Deploy every component in order, or a single component.
    #[command(name = "deploy", about = "Deploy every component in order, or a single component")]
    Deploy(DeployCommand),
    /// Show resource names, templates and timings without calling Azure.
    #[command(
        name = "plan",
        about = "Show resource names, templates and timings without calling Azure"
    )]
    Plan,
}

/// Components selectable on the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum ComponentArg {
    /// Hub virtual network.
    Network,
    /// VPN gateway.
    VpnGateway,
    /// NAT gateway.
    NatGateway,
}

/// How each step waits for its resource.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum MonitorArg {
    /// Trust the exit code of the deployment command.
    None,
    /// Poll the provisioning state until it is terminal.
    #[default]
    Foreground,
    /// Hand gateway deployments to background jobs.
    Background,
}

/// Arguments for the `hubnet deploy` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DeployCommand {
    /// Deploy only this component instead of the full sequence.
    #[arg(long, value_enum, value_name = "COMPONENT")]
    pub(crate) component: Option<ComponentArg>,
    /// Monitoring mode for each step.
    #[arg(long, value_enum, default_value_t = MonitorArg::Foreground)]
    pub(crate) monitor: MonitorArg,
    /// Preview changes with what-if and ask for confirmation before applying.
    #[arg(long)]
    pub(crate) what_if: bool,
    /// Return as soon as Azure accepts each deployment.
    #[arg(long)]
    pub(crate) no_wait: bool,
    /// Keep going after a VPN or NAT gateway failure.
    ///
    /// The deployment still reports failure; the flag only decides whether
    /// the remaining components are attempted.
    #[arg(long)]
    pub(crate) continue_on_optional_failure: bool,
    /// Write a `<job-id>.txt` record for each background job into this
    /// directory.
    #[arg(long, value_name = "DIR")]
    pub(crate) job_export_dir: Option<String>,
}
