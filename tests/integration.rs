use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn askd_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("askd");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("notes.txt"),
        "Quarterly review notes.\n\nRevenue grew 40% in Q3 driven by enterprise deals.\n\nHeadcount stayed flat.",
    )
    .unwrap();
    fs::write(
        files_dir.join("infra.txt"),
        "Deployment runbook.\n\nKubernetes clusters run in three regions.\n\nRollbacks use blue-green switches.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/askdocs.db"

[server]
bind = "127.0.0.1:7462"
"#,
        root.display()
    );

    let config_path = config_dir.join("askd.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_askd(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = askd_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        // Force the offline fallback paths so results are deterministic.
        .env_remove("OPENAI_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run askd binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_askd(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_askd(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_askd(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_upload_text_file() {
    let (tmp, config_path) = setup_test_env();

    run_askd(&config_path, &["init"]);
    let notes = tmp.path().join("files/notes.txt");
    let (stdout, stderr, success) =
        run_askd(&config_path, &["upload", notes.to_str().unwrap()]);
    assert!(
        success,
        "upload failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("success"));
    assert!(stdout.contains("notes.txt"));
}

#[test]
fn test_upload_unsupported_extension() {
    let (tmp, config_path) = setup_test_env();

    run_askd(&config_path, &["init"]);
    let bad = tmp.path().join("files/photo.png");
    fs::write(&bad, b"not a document").unwrap();

    let (stdout, _, success) = run_askd(&config_path, &["upload", bad.to_str().unwrap()]);
    assert!(success, "upload command itself should not fail");
    assert!(stdout.contains("error"));
    assert!(stdout.contains("Unsupported"));
}

#[test]
fn test_get_shows_fallback_document() {
    let (tmp, config_path) = setup_test_env();

    run_askd(&config_path, &["init"]);
    let notes = tmp.path().join("files/notes.txt");
    let (stdout, _, _) = run_askd(&config_path, &["upload", notes.to_str().unwrap()]);

    // success  <uuid>  notes.txt
    let id = stdout
        .lines()
        .find(|l| l.starts_with("success"))
        .and_then(|l| l.split_whitespace().nth(1))
        .expect("upload output should contain an id")
        .to_string();

    let (stdout, stderr, success) = run_askd(&config_path, &["get", &id]);
    assert!(success, "get failed: stdout={}, stderr={}", stdout, stderr);
    // Without an API key, the fallback document keeps the filename as
    // title, a single Content section, and a note in the metadata.
    assert!(stdout.contains("title:   notes.txt"));
    assert!(stdout.contains("## Content"));
    assert!(stdout.contains("Revenue grew 40%"));
    assert!(stdout.contains("mock output"));
}

#[test]
fn test_get_unknown_id_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_askd(&config_path, &["init"]);
    let (_, stderr, success) = run_askd(&config_path, &["get", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("No document"));
}

#[test]
fn test_search_ranks_matching_document_first() {
    let (tmp, config_path) = setup_test_env();

    run_askd(&config_path, &["init"]);
    let files = tmp.path().join("files");
    run_askd(
        &config_path,
        &[
            "upload",
            files.join("notes.txt").to_str().unwrap(),
            files.join("infra.txt").to_str().unwrap(),
        ],
    );

    let (stdout, _, success) = run_askd(&config_path, &["search", "revenue"]);
    assert!(success, "search failed");
    let first = stdout.lines().next().unwrap_or_default();
    assert!(
        first.contains("notes.txt"),
        "Expected notes.txt ranked first, got: {}",
        stdout
    );
}

#[test]
fn test_search_deterministic() {
    let (tmp, config_path) = setup_test_env();

    run_askd(&config_path, &["init"]);
    let notes = tmp.path().join("files/notes.txt");
    run_askd(&config_path, &["upload", notes.to_str().unwrap()]);

    let (stdout1, _, _) = run_askd(&config_path, &["search", "enterprise deals"]);
    let (stdout2, _, _) = run_askd(&config_path, &["search", "enterprise deals"]);
    assert_eq!(
        stdout1, stdout2,
        "Search results should be deterministic across runs"
    );
}

#[test]
fn test_search_empty_store() {
    let (_tmp, config_path) = setup_test_env();

    run_askd(&config_path, &["init"]);
    let (stdout, _, success) = run_askd(&config_path, &["search", "anything"]);
    assert!(success, "search on an empty store should not fail");
    assert!(stdout.contains("No results"));
}

#[test]
fn test_stats_counts_uploads() {
    let (tmp, config_path) = setup_test_env();

    run_askd(&config_path, &["init"]);
    let files = tmp.path().join("files");
    run_askd(
        &config_path,
        &[
            "upload",
            files.join("notes.txt").to_str().unwrap(),
            files.join("infra.txt").to_str().unwrap(),
        ],
    );

    let (stdout, stderr, success) = run_askd(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents:    2"));
    assert!(stdout.contains("active chats: 0"));
    assert!(stdout.contains("notes.txt"));
    assert!(stdout.contains("infra.txt"));
}
