#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn aq(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("aq").unwrap();
    cmd.current_dir(dir.path())
        .env("AQ_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init(dir: &TempDir) {
    aq(dir).arg("init").assert().success();
}

// ---------------------------------------------------------------------------
// aq init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_default_config() {
    let dir = TempDir::new().unwrap();
    aq(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .aq/config.yaml"));

    let config = std::fs::read_to_string(dir.path().join(".aq/config.yaml")).unwrap();
    assert!(config.contains("max_steps: 64"));
    assert!(config.contains("store_path: .aq/queue.db"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    aq(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .aq/config.yaml"));
}

#[test]
fn init_keeps_an_edited_config() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let path = dir.path().join(".aq/config.yaml");
    std::fs::write(&path, "max_steps: 7\n").unwrap();

    init(&dir);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "max_steps: 7\n");
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    aq(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("aq init"));
}

// ---------------------------------------------------------------------------
// aq list / show / prune / recover
// ---------------------------------------------------------------------------

#[test]
fn list_empty_store_as_json() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let out = aq(&dir).args(["list", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value, serde_json::json!([]));
}

#[test]
fn list_empty_store_as_text() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    aq(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No programs."));
}

#[test]
fn show_unknown_program_fails() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    aq(&dir)
        .args(["show", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("program not found: missing"));
}

#[test]
fn cancel_unknown_program_fails() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    aq(&dir)
        .args(["cancel", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("program not found"));
}

#[test]
fn prune_and_recover_on_empty_store() {
    let dir = TempDir::new().unwrap();
    init(&dir);

    let out = aq(&dir).args(["prune", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["removed"], serde_json::json!([]));

    let out = aq(&dir).args(["recover", "--json"]).output().unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(value["recovered"], 0);
}

// ---------------------------------------------------------------------------
// aq sync / config
// ---------------------------------------------------------------------------

#[test]
fn sync_without_device_token_fails() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    aq(&dir)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("device.device_token is not configured"));
}

#[test]
fn default_config_validates() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    aq(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn empty_base_url_fails_validation() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".aq")).unwrap();
    std::fs::write(
        dir.path().join(".aq/config.yaml"),
        "push:\n  base_url: \"\"\n",
    )
    .unwrap();
    aq(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] push.base_url is empty"));
}
