//! CLI Integration Tests
//!
//! These tests run the actual `kemtree` binary against a temporary data
//! directory, one process per command.
//!
//! Run with:
//! ```bash
//! cargo test --test cli_integration
//! ```

use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Run kemtree and return (stdout, stderr, success)
fn run_kemtree(args: &[&str], data_dir: &Path) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_kemtree"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--config", "/nonexistent/kemtree.json", "-f", "json"])
        .args(args)
        .output()
        .expect("Failed to execute kemtree");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn run_json(args: &[&str], data_dir: &Path) -> serde_json::Value {
    let (stdout, stderr, success) = run_kemtree(args, data_dir);
    assert!(success, "{:?} failed: {}", args, stderr);
    serde_json::from_str(&stdout).expect("stdout should be JSON")
}

fn insert_members(data_dir: &Path, names: &[&str]) {
    for name in names {
        run_json(&["insert", name, &format!("{}_key", name)], data_dir);
    }
}

// ============================================================================
// Initialization
// ============================================================================

#[test]
fn test_cli_init_creates_directory() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("tree");

    let json = run_json(&["init"], &data_dir);

    assert_eq!(json["status"], "ok");
    assert_eq!(json["nodes"], 0);
    assert!(data_dir.is_dir(), "data directory should be created");
}

#[test]
fn test_cli_status_on_empty_tree() {
    let dir = tempdir().unwrap();
    let json = run_json(&["status"], dir.path());

    assert_eq!(json["nodes"], 0);
    assert_eq!(json["leaves"], 0);
    assert!(json["root"].is_null());
}

// ============================================================================
// Structure
// ============================================================================

#[test]
fn test_cli_insert_builds_tree() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob", "charlie"]);

    let json = run_json(&["status"], dir.path());
    assert_eq!(json["nodes"], 5);
    assert_eq!(json["leaves"], 3);
    assert_eq!(json["records"], 5);
    assert_eq!(json["root"], "intermediate_alice_bob");
}

#[test]
fn test_cli_insert_duplicate_fails() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice"]);

    let (_stdout, stderr, success) = run_kemtree(&["insert", "alice", "again"], dir.path());
    assert!(!success, "duplicate insert should fail");
    assert!(stderr.contains("alice"), "error should name the member: {}", stderr);
}

#[test]
fn test_cli_find_and_node() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob"]);

    let bob = run_json(&["find", "bob"], dir.path());
    assert_eq!(bob["kind"], "leaf");
    assert_eq!(bob["index"], 2);
    assert_eq!(bob["payload"], hex::encode("bob_key"));

    let root = run_json(&["node", "0"], dir.path());
    assert_eq!(root["name"], "intermediate_alice_bob");
    assert_eq!(root["kind"], "intermediate");
}

#[test]
fn test_cli_find_missing_fails() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice"]);

    let (stdout, _stderr, success) = run_kemtree(&["find", "ghost"], dir.path());
    assert!(!success);
    assert!(stdout.contains("Not found"));
}

#[test]
fn test_cli_path() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob", "charlie"]);

    let json = run_json(&["path", "alice"], dir.path());
    let names: Vec<&str> = json["path"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["intermediate_alice_bob", "intermediate_alice_charlie", "alice"]
    );
}

#[test]
fn test_cli_structure_and_leaves() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob", "charlie", "david"]);

    let structure = run_json(&["structure"], dir.path());
    assert_eq!(structure["count"], 7);
    let indices: Vec<u64> = structure["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["node_index"].as_u64().unwrap())
        .collect();
    assert_eq!(indices, (0..7).collect::<Vec<u64>>());

    let leaves = run_json(&["leaves"], dir.path());
    let names: Vec<&str> = leaves["leaves"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "charlie", "bob", "david"]);
}

#[test]
fn test_cli_delete() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob", "charlie"]);

    let json = run_json(&["delete", "charlie"], dir.path());
    assert_eq!(json["size"], 3);

    let status = run_json(&["status"], dir.path());
    assert_eq!(status["records"], 3);
    assert_eq!(status["root"], "intermediate_alice_bob");

    let (_stdout, _stderr, success) = run_kemtree(&["find", "charlie"], dir.path());
    assert!(!success);
}

// ============================================================================
// Keys and change tracking
// ============================================================================

#[test]
fn test_cli_set_key_hex() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob"]);

    run_json(
        &["--hex", "set-key", "intermediate_alice_bob", "deadbeef"],
        dir.path(),
    );
    let root = run_json(&["node", "0"], dir.path());
    assert_eq!(root["payload"], "deadbeef");
}

#[test]
fn test_cli_set_key_on_leaf_fails() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob"]);

    let (_stdout, _stderr, success) = run_kemtree(&["set-key", "alice", "x"], dir.path());
    assert!(!success);
    let (_stdout, _stderr, success) =
        run_kemtree(&["update-key", "intermediate_alice_bob", "x"], dir.path());
    assert!(!success);
}

#[test]
fn test_cli_dirty_and_mark_checked() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob"]);

    let dirty = run_json(&["dirty"], dir.path());
    assert_eq!(dirty["count"], 3);

    run_json(&["mark-checked"], dir.path());
    let dirty = run_json(&["dirty"], dir.path());
    assert_eq!(dirty["count"], 0);

    run_json(&["update-key", "bob", "rotated"], dir.path());
    let dirty = run_json(&["dirty"], dir.path());
    assert_eq!(dirty["count"], 1);
    assert_eq!(dirty["nodes"][0]["name"], "bob");

    run_json(&["mark-checked", "bob"], dir.path());
    let dirty = run_json(&["dirty"], dir.path());
    assert_eq!(dirty["count"], 0);
}

#[test]
fn test_cli_changes_since() {
    let dir = tempdir().unwrap();
    insert_members(dir.path(), &["alice", "bob"]);

    let all = run_json(&["changes"], dir.path());
    assert_eq!(all["count"], 3);

    let latest = all["changes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["last_modified"].as_u64().unwrap())
        .max()
        .unwrap();
    let since = latest.to_string();
    let none = run_json(&["changes", "--since", &since], dir.path());
    assert_eq!(none["count"], 0);
}

#[test]
fn test_cli_text_format_is_pretty() {
    let dir = tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_kemtree"))
        .arg("--data-dir")
        .arg(dir.path())
        .args(["--config", "/nonexistent/kemtree.json", "-f", "text", "status"])
        .output()
        .expect("Failed to execute kemtree");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().count() > 1, "text output should span lines");
}
