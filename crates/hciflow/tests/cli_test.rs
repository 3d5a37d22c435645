#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const MANIFEST: &str = r#"
entities:
  - kind: vpc
    id: vpc-1
    environment_id: env-1
    name: main
    description: Main VPC
    vpc_offering: Default VPC
  - kind: ssh_key
    environment_id: env-1
    name: deploy
    public_key: ssh-ed25519 AAAA deploy@example
"#;

/// hciflow with no ambient configuration, running inside `dir`
fn hciflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hciflow").unwrap();
    cmd.current_dir(dir)
        .env_remove("HCIFLOW_CONFIG_PATH")
        .env_remove("HCIFLOW_MANIFEST")
        .env_remove("HCI_API_URL")
        .env_remove("HCI_API_KEY")
        .env_remove("HCI_INSECURE")
        .env_remove("HCI_ENVIRONMENT_ID")
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("NO_COLOR", "1");
    cmd
}

/// The CLI help lists every command
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("hciflow").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Declarative reconciliation"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("read"))
        .stdout(predicate::str::contains("destroy"));
}

#[test]
fn test_cli_version() {
    let temp_dir = tempfile::tempdir().unwrap();
    hciflow(temp_dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hciflow"));
}

#[test]
fn test_apply_help() {
    let mut cmd = Command::cargo_bin("hciflow").unwrap();
    cmd.arg("apply")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--file"));
}

#[test]
fn test_read_help() {
    let mut cmd = Command::cargo_bin("hciflow").unwrap();
    cmd.arg("read")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("<KIND>"))
        .stdout(predicate::str::contains("--environment-id"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("hciflow").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_read_unknown_kind() {
    let temp_dir = tempfile::tempdir().unwrap();
    hciflow(temp_dir.path())
        .args(["read", "load_balancer", "lb-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown entity kind"));
}

#[test]
fn test_read_requires_environment_id() {
    let temp_dir = tempfile::tempdir().unwrap();
    hciflow(temp_dir.path())
        .env("HCI_API_KEY", "test-key")
        .env("HCI_API_URL", "http://127.0.0.1:9/api/")
        .args(["read", "vpc", "vpc-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("an environment id is required to read a vpc"));
}

/// Without an API key nothing reaches the network
#[test]
fn test_missing_api_key() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join("manifest.yaml"), MANIFEST).unwrap();

    hciflow(temp_dir.path())
        .args(["plan", "-f", "manifest.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key is not configured"));
}

#[test]
fn test_config_file_flag() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = temp_dir.path().join("custom.yaml");
    std::fs::write(&config, "api_url: [broken").unwrap();

    hciflow(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .args(["check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("custom.yaml"));
}

#[test]
fn test_invalid_manifest() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        temp_dir.path().join("manifest.yaml"),
        "entities:\n  - kind: load_balancer\n    name: lb\n",
    )
    .unwrap();

    hciflow(temp_dir.path())
        .env("HCI_API_KEY", "test-key")
        .args(["apply", "-f", "manifest.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid manifest"));
}

#[test]
fn test_missing_manifest() {
    let temp_dir = tempfile::tempdir().unwrap();
    hciflow(temp_dir.path())
        .env("HCI_API_KEY", "test-key")
        .args(["plan", "-f", "absent.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read manifest"));
}

/// Destroy lists its targets and stops unless --yes is given
#[test]
fn test_destroy_requires_confirmation() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join("hciflow.yaml"), "api_key: test-key\n").unwrap();
    std::fs::write(temp_dir.path().join("manifest.yaml"), MANIFEST).unwrap();

    hciflow(temp_dir.path())
        .args(["destroy", "-f", "manifest.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vpc vpc-1"))
        .stdout(predicate::str::contains("ssh_key").not())
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_check_validates_manifest() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join("manifest.yaml"), MANIFEST).unwrap();

    // The API is unreachable; the manifest is reported before the API check
    hciflow(temp_dir.path())
        .env("HCI_API_KEY", "test-key")
        .env("HCI_API_URL", "http://127.0.0.1:9/api/")
        .args(["check", "-f", "manifest.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Manifest is valid"))
        .stdout(predicate::str::contains("ssh_key (new)"))
        .stderr(predicate::str::contains("API check failed"));
}
