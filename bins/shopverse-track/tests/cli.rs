use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("shopverse.toml");
    let storage = dir.join("data");
    std::fs::write(
        &path,
        format!(
            "[backend]\nurl = \"http://127.0.0.1:9\"\n\n[storage]\ndir = {:?}\n",
            storage.display().to_string()
        ),
    )
    .unwrap();
    path
}

fn cmd(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("shopverse-track").unwrap();
    for var in [
        "SHOPVERSE_API_URL",
        "SUPABASE_URL",
        "SUPABASE_ANON_KEY",
        "SHOPVERSE_DATA_DIR",
        "SHOPVERSE_PASSWORD",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("shopverse-track")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("orders"))
        .stdout(predicate::str::contains("track"));
}

#[test]
fn test_status_when_signed_out() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    cmd(&config)
        .args(["--format", "json", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"signed_in\":false"));

    assert!(dir.path().join("data").join("master.key").exists());
}

#[test]
fn test_track_requires_login() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());
    let replay = dir.path().join("drive.json");
    std::fs::write(&replay, r#"[{"latitude": 37.0, "longitude": -122.0}]"#).unwrap();

    cmd(&config)
        .args(["track", "--to", "37.01,-122.01", "--replay"])
        .arg(&replay)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("login"));
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();

    cmd(&dir.path().join("absent.toml"))
        .arg("status")
        .assert()
        .code(3);
}

#[test]
fn test_rejects_bad_coordinate() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path());

    cmd(&config)
        .args(["route", "--from", "north", "--to", "37.01,-122.01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lat,lng"));
}
