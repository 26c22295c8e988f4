//! Binary entry point for the hubnet CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use hubnet::{
    AzStatusSource, ComponentCatalog, ComponentName, ConfigError, DeployConfig, DeployOptions,
    DeploymentOrchestrator, DeploymentReport, ExportError, FailurePolicy, JobRegistry, JobStatus,
    MonitorMode, OrchestratorError, ProcessCommandRunner, Provisioner, RegistryError, StepReport,
};

mod cli;

use cli::{Cli, ComponentArg, DeployCommand, MonitorArg};

const LOG_ENV_VAR: &str = "HUBNET_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error("background job error: {0}")]
    Registry(#[from] RegistryError),
    #[error("job export failed: {0}")]
    Export(#[from] ExportError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<bool, CliError> {
    let config = DeployConfig::load_without_cli_args()?;
    config.validate()?;

    match cli {
        Cli::Plan => {
            write_lines(&render_plan(&config.catalog(), &config.resource_group_name()))?;
            Ok(true)
        }
        Cli::Deploy(command) => deploy(&config, command).await,
    }
}

async fn deploy(config: &DeployConfig, command: DeployCommand) -> Result<bool, CliError> {
    let options = DeployOptions {
        monitor: monitor_mode(command.monitor),
        policy: if command.continue_on_optional_failure {
            FailurePolicy::ContinueOnOptionalFailure
        } else {
            config.failure_policy()
        },
    };
    let orchestrator = DeploymentOrchestrator::new(
        config.catalog(),
        Arc::new(Provisioner::new(config.az_bin.clone(), ProcessCommandRunner)),
        Arc::new(AzStatusSource::new(config.az_bin.clone(), ProcessCommandRunner)),
        config.monitor_pool(),
        JobRegistry::shared(),
    );
    let args = config.deployment_args(command.what_if, command.no_wait);

    let report = match command.component {
        Some(component) => {
            orchestrator
                .deploy_component(component_name(component), &args, options)
                .await?
        }
        None => orchestrator.deploy_full(&args, options).await?,
    };
    write_lines(&render_report(&report))?;

    let export_dir = command.job_export_dir.map(Utf8PathBuf::from);
    let mut jobs_succeeded = true;
    for launched in report.launched_jobs() {
        let job = orchestrator.jobs().wait(launched.id).await?;
        write_lines(&[format!(
            "job {} ({}): {}",
            job.id, job.component, job.status
        )])?;
        if let Some(dir) = &export_dir {
            orchestrator
                .jobs()
                .export_job_info(job.id, &dir.join(format!("{}.txt", job.id)))
                .await?;
        }
        jobs_succeeded &= job.status == JobStatus::Succeeded;
    }

    let succeeded = report.is_success() && jobs_succeeded;
    write_lines(&[String::from(if succeeded {
        "deployment succeeded"
    } else {
        "deployment failed"
    })])?;
    Ok(succeeded)
}

const fn component_name(arg: ComponentArg) -> ComponentName {
    match arg {
        ComponentArg::Network => ComponentName::Network,
        ComponentArg::VpnGateway => ComponentName::VpnGateway,
        ComponentArg::NatGateway => ComponentName::NatGateway,
    }
}

const fn monitor_mode(arg: MonitorArg) -> MonitorMode {
    match arg {
        MonitorArg::None => MonitorMode::None,
        MonitorArg::Foreground => MonitorMode::Foreground,
        MonitorArg::Background => MonitorMode::Background,
    }
}

fn render_plan(catalog: &ComponentCatalog, resource_group: &str) -> Vec<String> {
    let mut lines = vec![format!("resource group: {resource_group}")];
    lines.extend(catalog.specs().iter().map(|spec| {
        format!(
            "{}: {} {} template={} poll={}s timeout={}s",
            spec.name,
            spec.resource_type,
            spec.resource_name,
            spec.template,
            spec.timing.poll_interval.as_secs(),
            spec.timing.timeout.as_secs()
        )
    }));
    lines
}

fn render_report(report: &DeploymentReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .steps()
        .iter()
        .map(|step| match step {
            StepReport::Completed(outcome) => match outcome.failure() {
                None => format!("{}: succeeded", outcome.component()),
                Some(failure) => format!("{}: failed ({failure})", outcome.component()),
            },
            StepReport::Launched(job) => {
                format!("{}: launched background job {}", job.component, job.id)
            }
        })
        .collect();
    lines.extend(
        report
            .skipped()
            .iter()
            .map(|component| format!("{component}: skipped")),
    );
    lines.extend(
        report
            .warnings()
            .iter()
            .map(|warning| format!("warning: {warning}")),
    );
    lines
}

fn write_lines(lines: &[String]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
