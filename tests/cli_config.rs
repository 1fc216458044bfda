use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper: get a Command for the sftpgate binary, isolated from any user
/// config file.
fn sftpgate(dir: &TempDir) -> Command {
    let config = dir.path().join("config.toml");
    fs::write(&config, "").unwrap();

    let mut cmd = Command::cargo_bin("sftpgate").expect("sftpgate binary not found");
    cmd.env_remove("RUST_LOG")
        .arg("--config")
        .arg(&config)
        .arg("--download-to")
        .arg(dir.path().join("downloads"))
        .arg("--known-hosts")
        .arg(dir.path().join("known_hosts.json"))
        .arg("--listen")
        .arg("127.0.0.1:0");
    cmd
}

// ============================================================================
// Configuration is rejected before any connection attempt
// ============================================================================
#[test]
fn test_missing_credentials_rejected() {
    let dir = TempDir::new().unwrap();
    sftpgate(&dir)
        .args(["--host", "sftp.invalid", "--user", "alice"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("password or a key file"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_both_credentials_rejected() {
    let dir = TempDir::new().unwrap();
    let key = dir.path().join("id_ed25519");
    fs::write(&key, "not really a key").unwrap();

    sftpgate(&dir)
        .args(["--host", "sftp.invalid", "--user", "alice", "--password", "pw"])
        .arg("--key")
        .arg(&key)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not both"))
        .stderr(predicate::str::contains("Connecting").not());
}

#[test]
fn test_missing_host_rejected() {
    let dir = TempDir::new().unwrap();
    sftpgate(&dir)
        .args(["--user", "alice", "--password", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("host is required"));
}

#[test]
fn test_missing_key_file_rejected() {
    let dir = TempDir::new().unwrap();
    sftpgate(&dir)
        .args(["--host", "sftp.invalid", "--user", "alice"])
        .arg("--key")
        .arg(dir.path().join("missing_key"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_pinned_without_fingerprint_rejected() {
    let dir = TempDir::new().unwrap();
    sftpgate(&dir)
        .args([
            "--host", "sftp.invalid", "--user", "alice", "--password", "pw", "--host-key", "pinned",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--fingerprint"));
}

#[test]
fn test_invalid_config_file_rejected() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "port = \"twenty-two\"\n").unwrap();

    Command::cargo_bin("sftpgate")
        .unwrap()
        .args(["--host", "sftp.invalid", "--user", "alice", "--password", "pw"])
        .arg("--config")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

// ============================================================================
// Connection failures surface as connection errors
// ============================================================================
#[test]
fn test_unreachable_host_is_connection_error() {
    let dir = TempDir::new().unwrap();
    sftpgate(&dir)
        .args([
            "--host", "127.0.0.1", "--port", "1", "--user", "alice", "--password", "pw",
        ])
        .timeout(std::time::Duration::from_secs(60))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Connection failed to 127.0.0.1"));
}

#[test]
fn test_help_lists_credentials() {
    let dir = TempDir::new().unwrap();
    sftpgate(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--password"))
        .stdout(predicate::str::contains("--key"))
        .stdout(predicate::str::contains("--host-key"));
}
