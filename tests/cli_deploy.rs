//! End-to-end tests for `hubnet plan` and `hubnet deploy` against a fake `az`.
#![cfg(unix)]

#[path = "common/test_constants.rs"]
mod test_constants;

use std::os::unix::fs::PermissionsExt;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use predicates::str::contains;
use tempfile::TempDir;

use test_constants::{ENV, LOCATION_CODE, PROJECT, RESOURCE_GROUP};

const FAKE_AZ: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/az.log"
case "$1" in
  deployment) echo '{}' ;;
  network) echo '"Succeeded"' ;;
  *) echo "unexpected az call: $*" >&2; exit 2 ;;
esac
"#;

struct Workspace {
    _tmp: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .unwrap_or_else(|path| panic!("temp dir should be utf8: {}", path.display()));
        let dir = Dir::open_ambient_dir(&root, ambient_authority())
            .unwrap_or_else(|err| panic!("open temp dir: {err}"));
        dir.write("az", FAKE_AZ)
            .unwrap_or_else(|err| panic!("write fake az: {err}"));
        std::fs::set_permissions(root.join("az"), std::fs::Permissions::from_mode(0o755))
            .unwrap_or_else(|err| panic!("chmod fake az: {err}"));
        Self { _tmp: tmp, root }
    }

    fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("hubnet");
        cmd.current_dir(&self.root)
            .env_remove("HUBNET_CONFIG_PATH")
            .env_remove("HUBNET_RESOURCE_GROUP")
            .env("HUBNET_ENV", ENV)
            .env("HUBNET_LOCATION_CODE", LOCATION_CODE)
            .env("HUBNET_PROJECT", PROJECT)
            .env("HUBNET_AZ_BIN", self.root.join("az").as_str());
        cmd
    }

    fn az_log(&self) -> String {
        Dir::open_ambient_dir(&self.root, ambient_authority())
            .and_then(|dir| dir.read_to_string("az.log"))
            .unwrap_or_default()
    }

    fn path(&self, relative: &str) -> Utf8PathBuf {
        self.root.join(relative)
    }
}

#[test]
fn plan_prints_resource_names_without_calling_az() {
    let workspace = Workspace::new();

    workspace
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(contains(format!("resource group: {RESOURCE_GROUP}")))
        .stdout(contains("network: vnet dev-weu-vnet-hub"))
        .stdout(contains("vpn-gateway: vnet-gateway dev-weu-vpngw-hub"))
        .stdout(contains("nat-gateway: nat-gateway dev-weu-natgw-hub"));

    assert!(workspace.az_log().is_empty(), "plan must not invoke az");
}

#[test]
fn full_deployment_runs_every_component_in_order() {
    let workspace = Workspace::new();

    workspace
        .command()
        .arg("deploy")
        .assert()
        .success()
        .stdout(contains("network: succeeded"))
        .stdout(contains("vpn-gateway: succeeded"))
        .stdout(contains("nat-gateway: succeeded"))
        .stdout(contains("deployment succeeded"));

    let log = workspace.az_log();
    let deployments: Vec<&str> = log
        .lines()
        .filter(|line| line.starts_with("deployment group create"))
        .collect();
    assert_eq!(deployments.len(), 3, "unexpected az log: {log}");
    let order: Vec<usize> = ["hubnet-network", "hubnet-vpn-gateway", "hubnet-nat-gateway"]
        .iter()
        .map(|name| {
            log.find(name)
                .unwrap_or_else(|| panic!("{name} missing from az log: {log}"))
        })
        .collect();
    assert!(order.is_sorted(), "components deployed out of order: {log}");
}

#[test]
fn background_job_is_awaited_and_exported() {
    let workspace = Workspace::new();
    let export_dir = workspace.path("jobs");

    workspace
        .command()
        .args([
            "deploy",
            "--component",
            "nat-gateway",
            "--monitor",
            "background",
            "--job-export-dir",
            export_dir.as_str(),
        ])
        .assert()
        .success()
        .stdout(contains("nat-gateway: launched background job"))
        .stdout(contains("(nat-gateway): Succeeded"))
        .stdout(contains("deployment succeeded"));

    let exported = exported_files(&export_dir);
    assert_eq!(exported.len(), 1, "expected one exported job: {exported:?}");
    let contents = exported
        .first()
        .map(|name| {
            Dir::open_ambient_dir(&export_dir, ambient_authority())
                .and_then(|dir| dir.read_to_string(name))
                .unwrap_or_else(|err| panic!("read export: {err}"))
        })
        .unwrap_or_default();
    assert!(contents.contains("status: Succeeded"), "{contents}");
    assert!(contents.contains("resource name: dev-weu-natgw-hub"), "{contents}");
}

#[test]
fn failing_az_reports_failure_and_skips_the_rest() {
    let workspace = Workspace::new();

    workspace
        .command()
        .env("HUBNET_AZ_BIN", workspace.path("missing-az").as_str())
        .arg("deploy")
        .assert()
        .failure()
        .code(1)
        .stdout(contains("network: failed"))
        .stdout(contains("vpn-gateway: skipped"))
        .stdout(contains("deployment failed"));
}

fn exported_files(dir: &Utf8Path) -> Vec<String> {
    let handle = Dir::open_ambient_dir(dir, ambient_authority())
        .unwrap_or_else(|err| panic!("open export dir: {err}"));
    let entries = handle
        .entries()
        .unwrap_or_else(|err| panic!("list export dir: {err}"));
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().ok())
        .collect()
}
