use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kbsync_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kbsync"))
}

/// Config pointing at a port nothing listens on, with short timeouts.
fn setup_unreachable_db() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("kbsync.toml");
    fs::write(
        &config_path,
        r#"[db]
user = "kb"
password = "secret"
name = "knowledge"
host = "127.0.0.1"
port = 1
timeout_secs = 2

[memory]
repo = "octo/memories"
"#,
    )
    .unwrap();
    (tmp, config_path)
}

fn run_kbsync(config_path: Option<&Path>, env: &[(&str, &str)], args: &[&str]) -> (String, String, bool) {
    let binary = kbsync_binary();
    let mut cmd = Command::new(&binary);
    cmd.env_clear();
    for (key, value) in env {
        cmd.env(key, value);
    }
    if let Some(path) = config_path {
        cmd.arg("--config").arg(path);
    }
    let output = cmd
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kbsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_version() {
    let (stdout, _, ok) = run_kbsync(None, &[], &["version"]);
    assert!(ok);
    assert_eq!(stdout.trim(), format!("kbsync {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_config_names_every_key() {
    let (_, stderr, ok) = run_kbsync(None, &[("DB_USER", "kb")], &["store", "list"]);
    assert!(!ok);
    for key in ["DB_PASSWORD", "DB_NAME", "DB_HOST", "MEMORY_REPO"] {
        assert!(stderr.contains(key), "stderr should name {}: {}", key, stderr);
    }
    assert!(!stderr.contains("DB_USER,"), "{}", stderr);
}

#[test]
fn test_bad_store_id_fails() {
    let (_tmp, config) = setup_unreachable_db();
    for id in ["abc", "0", "-3"] {
        let (_, _, ok) = run_kbsync(Some(&config), &[], &["sync", "document", id]);
        assert!(!ok, "store id {} should be rejected", id);
    }
}

#[test]
fn test_unreachable_database_fails_without_summary() {
    let (_tmp, config) = setup_unreachable_db();
    let (stdout, stderr, ok) = run_kbsync(
        Some(&config),
        &[("OPENAI_API_KEY", "sk-test"), ("GITHUB_TOKEN", "ghp_test")],
        &["sync", "document", "1"],
    );
    assert!(!ok);
    assert!(stderr.contains("Failed to connect"), "{}", stderr);
    assert!(!stdout.contains("ok"), "{}", stdout);
}

#[test]
fn test_sync_requires_embedding_key() {
    let (_tmp, config) = setup_unreachable_db();
    let (_, stderr, ok) = run_kbsync(Some(&config), &[], &["sync", "document", "1"]);
    assert!(!ok);
    assert!(stderr.contains("OPENAI_API_KEY"), "{}", stderr);
}

#[test]
fn test_memory_sync_requires_github_token() {
    let (_tmp, config) = setup_unreachable_db();
    let (_, stderr, ok) = run_kbsync(
        Some(&config),
        &[("OPENAI_API_KEY", "sk-test")],
        &["sync", "memory"],
    );
    assert!(!ok);
    assert!(stderr.contains("GITHUB_TOKEN"), "{}", stderr);
}

#[test]
fn test_store_create_rejects_malformed_repo() {
    let (_tmp, config) = setup_unreachable_db();
    let (_, stderr, ok) = run_kbsync(Some(&config), &[], &["store", "create", "just-a-name"]);
    assert!(!ok);
    assert!(stderr.contains("owner/repo"), "{}", stderr);
}

#[test]
fn test_env_overrides_config_file() {
    let (_tmp, config) = setup_unreachable_db();
    let (_, stderr, ok) = run_kbsync(Some(&config), &[("MEMORY_REPO", "bad")], &["sync", "memory", "--dry-run"]);
    assert!(!ok);
    assert!(stderr.contains("'bad'"), "{}", stderr);
}
