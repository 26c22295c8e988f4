//! Text export of background job records.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use chrono::SecondsFormat;
use thiserror::Error;

use super::registry::{MonitoringJob, RegistryError};

/// Errors raised while exporting a job record.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The job could not be read from the registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The export path has no file name component.
    #[error("export path {path} is missing a filename")]
    InvalidPath {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Writing the export failed.
    #[error("failed to write job export to {path}: {message}")]
    Io {
        /// Path being written.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

/// Renders `job` and its monitoring parameters as `key: value` lines.
#[must_use]
pub fn render_job(job: &MonitoringJob) -> String {
    let finished = job.finished_at.map_or_else(
        || String::from("-"),
        |at| at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    let mut lines = vec![
        format!("job id: {}", job.id),
        format!("job name: {}", job.name),
        format!("component: {}", job.component),
        format!("status: {}", job.status),
        format!("resource group: {}", job.identity.resource_group),
        format!("resource type: {}", job.identity.resource_type),
        format!("resource name: {}", job.identity.resource_name),
        format!(
            "started at: {}",
            job.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        format!("finished at: {finished}"),
        format!(
            "poll interval seconds: {}",
            job.timing.poll_interval.as_secs()
        ),
        format!("timeout seconds: {}", job.timing.timeout.as_secs()),
    ];
    if let Some(detail) = &job.detail {
        lines.push(format!("detail: {detail}"));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Writes the rendered `job` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns [`ExportError::InvalidPath`] or [`ExportError::Io`].
pub fn write_job(path: &Utf8Path, job: &MonitoringJob) -> Result<(), ExportError> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| ExportError::InvalidPath {
        path: path.to_path_buf(),
    })?;

    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| ExportError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| ExportError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;

    dir.write(file_name, render_job(job))
        .map_err(|err| ExportError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}
