//! End-to-end tests of the `logsync` binary that need no network.

use assert_cmd::Command;
use logsync::storage::SqliteStorage;
use logsync::sync::CheckpointStore;
use tempfile::TempDir;

/// A command isolated from the user's home directory and environment.
fn logsync(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("logsync").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("LOGSYNC_DB")
        .env_remove("LOGSYNC_BASE_URL")
        .env_remove("LOGSYNC_TIMEOUT_SECS")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{output:?}");
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn version_reports_package_version() {
    let home = TempDir::new().unwrap();
    let out = stdout_of(logsync(&home).args(["version", "--json"]));
    let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn providers_lists_builtin_feeds() {
    let home = TempDir::new().unwrap();
    let out = stdout_of(logsync(&home).args(["providers", "--json"]));
    let rows: Vec<serde_json::Value> = serde_json::from_str(out.trim()).unwrap();

    let tags: Vec<&str> = rows.iter().filter_map(|r| r["tag"].as_str()).collect();
    assert_eq!(tags, vec!["a", "b"]);
    assert_eq!(rows[0]["has_lobby"], true);
    assert_eq!(rows[1]["has_lobby"], false);
}

#[test]
fn providers_include_config_file_entries() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".logsync");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.json"),
        r#"{"providers": [{"tag": "c", "format": "table",
            "live_path": "dat/scc{hour}.log.gz", "archive_path": "dat/{year}/scc{date}.log.gz"}]}"#,
    )
    .unwrap();

    let out = stdout_of(logsync(&home).args(["providers", "--json"]));
    assert!(out.contains(r#""tag":"c""#));
}

#[test]
fn status_without_database_is_not_initialized() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("missing.db");

    let output = logsync(&home)
        .args(["status", "--json", "--db"])
        .arg(&db)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("NOT_INITIALIZED"));
    assert!(!db.exists());
}

#[test]
fn status_shows_latest_checkpoint() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("logsync.db");
    {
        let mut storage = SqliteStorage::open(&db).unwrap();
        storage.append("b", 1_704_000_000, 1_704_034_800).unwrap();
        storage.append("b", 1_704_031_200, 1_704_070_000).unwrap();
    }

    let out = stdout_of(logsync(&home).args(["status", "--json", "--db"]).arg(&db));
    let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();

    let checkpoints = value["checkpoints"].as_array().unwrap();
    assert_eq!(checkpoints.len(), 1);
    assert_eq!(checkpoints[0]["provider"], "b");
    assert_eq!(checkpoints[0]["window_end"], 1_704_070_000);
    assert_eq!(value["matches"].as_array().unwrap().len(), 0);
}

#[test]
fn backfill_rejects_inverted_window() {
    let home = TempDir::new().unwrap();
    let output = logsync(&home)
        .args(["backfill", "b", "--from", "2024-01-03", "--to", "2024-01-01", "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INVALID_WINDOW"));
}

#[test]
fn backfill_rejects_unparsable_time() {
    let home = TempDir::new().unwrap();
    let output = logsync(&home)
        .args(["backfill", "b", "--from", "last tuesday", "--to", "2024-01-01", "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INVALID_ARGUMENT"));
}

#[test]
fn unknown_provider_exits_before_fetching() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("logsync.db");

    let output = logsync(&home)
        .args(["sync", "zz", "--json", "--db"])
        .arg(&db)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("UNKNOWN_PROVIDER"));

    let output = logsync(&home)
        .args(["backfill", "zz", "--from", "2024-01-01", "--to", "2024-01-02", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn malformed_timeout_env_is_config_error() {
    let home = TempDir::new().unwrap();
    let output = logsync(&home)
        .env("LOGSYNC_TIMEOUT_SECS", "soon")
        .args(["sync", "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(7));
}

#[test]
fn completions_name_the_binary() {
    let home = TempDir::new().unwrap();
    let out = stdout_of(logsync(&home).args(["completions", "bash"]));
    assert!(out.contains("logsync"));
}
