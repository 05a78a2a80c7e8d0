use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn noterag_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_noterag"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let notes_dir = root.join("notes");
    fs::create_dir_all(notes_dir.join("work")).unwrap();
    fs::write(
        notes_dir.join("alpha.md"),
        "# Alpha\n\nThe alpha project ships in March.\n\nIt depends on the billing service.",
    )
    .unwrap();
    fs::write(
        notes_dir.join("work/meeting.txt"),
        "Weekly sync moved to Thursday afternoon.",
    )
    .unwrap();
    fs::write(
        notes_dir.join("recipes.html"),
        "<html><body><h1>Pancakes</h1><p>Flour, eggs, milk.</p><script>x()</script></body></html>",
    )
    .unwrap();
    // Not on the extension allow-list
    fs::write(notes_dir.join("image.png"), [0u8, 1, 2, 3]).unwrap();

    let config_content = format!(
        r#"[source]
root = "{root}/notes"

[embedding]
provider = "local"
dims = 256

[store]
backend = "sqlite"

[store.sqlite]
path = "{root}/data/noterag.sqlite"

[llm]
provider = "disabled"

[server]
bind = "127.0.0.1:7341"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("noterag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_noterag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = noterag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run noterag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_noterag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Initialized sqlite store"));
    assert!(tmp.path().join("data/noterag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_noterag(&config_path, &["init"]);
    assert!(first, "First init failed");
    let (_, _, second) = run_noterag(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_index_then_stats() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_noterag(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents:      3"), "got: {}", stdout);
    assert!(stdout.contains("failed batches: 0"));

    let (stdout, _, success) = run_noterag(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Notes:        3"), "got: {}", stdout);
    assert!(stdout.contains(".html"));
    assert!(!stdout.contains(".png"));
    assert!(stdout.contains("sqlite (healthy)"));
}

#[test]
fn test_reindex_does_not_duplicate() {
    let (_tmp, config_path) = setup_test_env();

    run_noterag(&config_path, &["index"]);
    let (first, _, _) = run_noterag(&config_path, &["stats"]);
    run_noterag(&config_path, &["index"]);
    let (second, _, _) = run_noterag(&config_path, &["stats"]);

    let chunks = |s: &str| {
        s.lines()
            .find(|l| l.starts_with("Chunks:"))
            .map(|l| l.to_string())
    };
    assert!(chunks(&first).is_some());
    assert_eq!(chunks(&first), chunks(&second));
}

#[test]
fn test_clear_resets_chunks() {
    let (_tmp, config_path) = setup_test_env();

    run_noterag(&config_path, &["index"]);
    let (stdout, stderr, success) = run_noterag(&config_path, &["clear"]);
    assert!(success, "clear failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Index cleared."));

    let (stdout, _, _) = run_noterag(&config_path, &["stats"]);
    assert!(stdout.contains("Chunks:       0"), "got: {}", stdout);
}

#[test]
fn test_ask_on_empty_index_needs_no_llm() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_noterag(&config_path, &["ask", "When does alpha ship?"]);
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("could not find anything relevant"));
}

#[test]
fn test_ask_with_disabled_llm_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_noterag(&config_path, &["index"]);
    let (_, stderr, success) = run_noterag(&config_path, &["ask", "When does alpha ship?"]);
    assert!(!success);
    assert!(stderr.contains("unavailable"), "got: {}", stderr);
}

#[test]
fn test_health_reports_disabled_llm() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_noterag(&config_path, &["health"]);
    assert!(success, "health failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Status: degraded"));
    assert!(stdout.contains("llm:   FAIL"));
    assert!(stdout.contains("files: OK"));
}

#[test]
fn test_missing_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_noterag(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[store]\nbackend = \"redis\"\n").unwrap();

    let (_, stderr, success) = run_noterag(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Unknown store backend"));
}
