#![cfg(unix)]
#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TEST_PASSWORD: &str = "test-password-123";

/// A config dir with one volume whose mount point lives in the same temp dir.
struct TestConfig {
    dir: TempDir,
}

impl TestConfig {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create config dir");
        let config = format!(
            r#"
[defaults]
timeout = 0

[volumes.shared]
address = "files.example.invalid/Share"
mount_point = "{}"
user = "alice"

[files.form]
url = "http://127.0.0.1:9/form.xlsx"
path = "{}"
"#,
            dir.path().join("Share").display(),
            dir.path().join("cache/form.xlsx").display()
        );
        fs::write(dir.path().join("config.toml"), config).unwrap();
        Self { dir }
    }

    fn mount_point(&self) -> PathBuf {
        self.dir.path().join("Share")
    }

    fn netvol(&self) -> Command {
        let mut cmd = Command::cargo_bin("netvol").unwrap();
        cmd.env("NETVOL_CONFIG_DIR", self.dir.path());
        cmd.env_remove("NETVOL_PASSWORD");
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

fn write_marker(root: &Path, holder: &str) {
    fs::write(
        root.join(format!(".{holder}.lock")),
        "2024-01-01T12:00:00+00:00",
    )
    .unwrap();
}

// ============================================================================
// Basic CLI tests
// ============================================================================

#[test]
fn test_help() {
    TestConfig::new()
        .netvol()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mount SMB network volumes"))
        .stdout(predicate::str::contains("mount"))
        .stdout(predicate::str::contains("unmount"))
        .stdout(predicate::str::contains("markers"))
        .stdout(predicate::str::contains("exec"));
}

#[test]
fn test_version() {
    TestConfig::new()
        .netvol()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netvol"));
}

#[test]
fn test_exec_requires_command() {
    TestConfig::new()
        .netvol()
        .args(["exec", "shared"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_completions() {
    TestConfig::new()
        .netvol()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("netvol"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_unknown_volume() {
    TestConfig::new()
        .netvol()
        .args(["status", "@nope"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Unknown volume '@nope'"))
        .stderr(predicate::str::contains("@shared"));
}

#[test]
fn test_invalid_config_file() {
    let config = TestConfig::new();
    fs::write(config.dir.path().join("config.toml"), "[volumes.shared\n").unwrap();

    config
        .netvol()
        .args(["status", "shared"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_explicit_config_file() {
    let config = TestConfig::new();
    let other = TempDir::new().unwrap();
    let file = other.path().join("netvol.toml");
    fs::write(
        &file,
        format!(
            "[volumes.elsewhere]\naddress = \"host/x\"\nmount_point = \"{}\"\n",
            other.path().join("X").display()
        ),
    )
    .unwrap();

    config
        .netvol()
        .arg("--config")
        .arg(&file)
        .args(["status", "elsewhere"])
        .assert()
        .success()
        .stdout(predicate::str::contains("host/x"));
}

#[test]
fn test_missing_explicit_config_file() {
    TestConfig::new()
        .netvol()
        .args(["--config", "/nonexistent/netvol.toml", "status", "shared"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_drive_in_config() {
    let config = TestConfig::new();
    fs::write(
        config.dir.path().join("config.toml"),
        "[volumes.bad]\naddress = \"host/x\"\nmount_point = \"/tmp/x\"\ndrive = \"JK\"\n",
    )
    .unwrap();

    config
        .netvol()
        .args(["status", "bad"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Invalid configuration for volume 'bad'"));
}

// ============================================================================
// Status
// ============================================================================

#[test]
fn test_status_not_mounted() {
    TestConfig::new()
        .netvol()
        .args(["status", "shared"])
        .assert()
        .success()
        .stdout(predicate::str::contains("files.example.invalid/Share"))
        .stdout(predicate::str::contains("State:    not mounted"));
}

#[test]
fn test_status_json() {
    let config = TestConfig::new();
    fs::create_dir(config.mount_point()).unwrap();

    let output = config
        .netvol()
        .args(["status", "@shared", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["volume"], "shared");
    assert_eq!(status["exists"], true);
    assert_eq!(status["mounted"], false);
    assert_eq!(status["markers"], serde_json::json!([]));
}

// ============================================================================
// Mount / unmount error paths (no real share is ever attached)
// ============================================================================

#[test]
fn test_unmount_missing_root() {
    TestConfig::new()
        .netvol()
        .args(["unmount", "shared"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Failed to unmount 'shared'"));
}

#[test]
fn test_unmount_plain_directory() {
    let config = TestConfig::new();
    fs::create_dir(config.mount_point()).unwrap();

    config
        .netvol()
        .args(["unmount", "shared"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("not mounted"));

    assert!(config.mount_point().is_dir());
}

#[test]
fn test_mount_refuses_existing_root() {
    let config = TestConfig::new();
    fs::create_dir(config.mount_point()).unwrap();

    config
        .netvol()
        .env("NETVOL_PASSWORD", TEST_PASSWORD)
        .args(["mount", "shared"])
        .assert()
        .code(9)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_mount_empty_password_from_stdin() {
    let config = TestConfig::new();

    config
        .netvol()
        .args(["--password-stdin", "mount", "shared"])
        .write_stdin("")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("cannot be empty"));

    assert!(!config.mount_point().exists());
}

#[test]
fn test_quiet_suppresses_error_output() {
    TestConfig::new()
        .netvol()
        .args(["-q", "unmount", "shared"])
        .assert()
        .code(7)
        .stderr(predicate::str::is_empty());
}

// ============================================================================
// Markers
// ============================================================================

#[test]
fn test_markers_missing_root() {
    TestConfig::new()
        .netvol()
        .args(["markers", "shared"])
        .assert()
        .code(7);
}

#[test]
fn test_markers_lists_holders() {
    let config = TestConfig::new();
    fs::create_dir(config.mount_point()).unwrap();
    write_marker(&config.mount_point(), "4242@lab-1");
    write_marker(&config.mount_point(), "reporting");
    fs::write(config.mount_point().join("data.csv"), "x").unwrap();

    config
        .netvol()
        .args(["markers", "shared"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4242@lab-1"))
        .stdout(predicate::str::contains("reporting"))
        .stdout(predicate::str::contains("data.csv").not());
}

#[test]
fn test_markers_json() {
    let config = TestConfig::new();
    fs::create_dir(config.mount_point()).unwrap();
    write_marker(&config.mount_point(), "4242@lab-1");

    let output = config
        .netvol()
        .args(["markers", "shared", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let markers: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(markers[0]["holder"], "4242@lab-1");
    assert!(
        markers[0]["created_at"]
            .as_str()
            .unwrap()
            .starts_with("2024-01-01T12:00:00")
    );
    assert_eq!(markers[0]["alive"], serde_json::Value::Null);
    assert_eq!(markers[0]["pruned"], false);
}

#[test]
fn test_markers_prune_dead_only_touches_local_dead_holders() {
    let config = TestConfig::new();
    let root = config.mount_point();
    fs::create_dir(&root).unwrap();

    let host = netvol_mount::local_hostname();
    let dead = format!("999999999@{host}");
    let alive = format!("{}@{host}", std::process::id());
    write_marker(&root, &dead);
    write_marker(&root, &alive);
    write_marker(&root, "1@some-other-host.invalid");

    config
        .netvol()
        .args(["markers", "shared", "--prune-dead"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dead (removed)"))
        .stderr(predicate::str::contains("Removed 1 stale marker(s), 2 remaining"));

    assert!(!root.join(format!(".{dead}.lock")).exists());
    assert!(root.join(format!(".{alive}.lock")).exists());
    assert!(root.join(".1@some-other-host.invalid.lock").exists());
}

#[test]
fn test_markers_without_prune_never_removes() {
    let config = TestConfig::new();
    let root = config.mount_point();
    fs::create_dir(&root).unwrap();
    write_marker(&root, &format!("999999999@{}", netvol_mount::local_hostname()));

    config.netvol().args(["markers", "shared"]).assert().success();

    assert_eq!(fs::read_dir(&root).unwrap().count(), 1);
}

// ============================================================================
// Fetch
// ============================================================================

#[test]
fn test_fetch_unknown_file() {
    TestConfig::new()
        .netvol()
        .args(["fetch", "nope"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Unknown file '@nope'"));
}

#[test]
fn test_fetch_unreachable_leaves_no_file() {
    let config = TestConfig::new();

    config
        .netvol()
        .args(["fetch", "form"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch"));

    assert!(!config.dir.path().join("cache/form.xlsx").exists());
}
