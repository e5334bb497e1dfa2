//! Integration tests driving the compiled `folio` binary end to end
//! against a temporary corpus and database.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn folio_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("folio");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let knowledge_dir = root.join("knowledge");
    fs::create_dir_all(&knowledge_dir).unwrap();
    fs::write(
        knowledge_dir.join("cv.md"),
        "# Education\n\nMSc Data Science, University of Example, graduated 2023.\n\n\
         # Projects\n\nBuilt an enterprise AI knowledge assistant with vector search \
         and retrieval augmented generation.\n\n\
         # Contact\n\nEmail: person@example.com. Based in Berlin.",
    )
    .unwrap();
    fs::write(
        knowledge_dir.join("skills.txt"),
        "TECHNICAL SKILLS\n\nPython, Rust, SQL, machine learning, deep learning, \
         data engineering, cloud deployment.",
    )
    .unwrap();

    let config_content = format!(
        r#"[knowledge]
dir = "{}/knowledge"

[db]
path = "{}/data/folio.sqlite"

[chunking]
chunk_size = 200
chunk_overlap = 20

[retrieval]
top_k = 3
min_confidence = 0.05
"#,
        root.display(),
        root.display()
    );

    let config_path = root.join("folio.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_folio(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = folio_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run folio binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_folio(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_folio(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_folio(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_index_builds_then_reports_up_to_date() {
    let (_tmp, config_path) = setup_test_env();

    run_folio(&config_path, &["init"]);

    let (stdout, stderr, success) = run_folio(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rebuilt"), "expected rebuild, got: {}", stdout);

    // Unchanged corpus: second run loads the persisted index
    let (stdout, _, success) = run_folio(&config_path, &["index"]);
    assert!(success);
    assert!(
        stdout.contains("up to date"),
        "expected up-to-date index, got: {}",
        stdout
    );
}

#[test]
fn test_index_force_rebuilds() {
    let (_tmp, config_path) = setup_test_env();

    run_folio(&config_path, &["init"]);
    run_folio(&config_path, &["index"]);

    let (stdout, _, success) = run_folio(&config_path, &["index", "--force"]);
    assert!(success);
    assert!(stdout.contains("rebuilt"), "expected rebuild, got: {}", stdout);
}

#[test]
fn test_index_rebuilds_after_corpus_edit() {
    let (tmp, config_path) = setup_test_env();

    run_folio(&config_path, &["init"]);
    run_folio(&config_path, &["index"]);

    fs::write(
        tmp.path().join("knowledge").join("certs.txt"),
        "CERTIFICATIONS\n\nAWS Certified Machine Learning Specialist.",
    )
    .unwrap();

    let (stdout, _, success) = run_folio(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("rebuilt"), "expected rebuild, got: {}", stdout);
}

#[test]
fn test_search_prints_ranked_results() {
    let (_tmp, config_path) = setup_test_env();

    run_folio(&config_path, &["init"]);
    run_folio(&config_path, &["index"]);

    let (stdout, stderr, success) =
        run_folio(&config_path, &["search", "machine learning skills"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1. ["), "expected ranked output, got: {}", stdout);
    assert!(stdout.contains("skills.txt"), "expected source path, got: {}", stdout);
}

#[test]
fn test_search_respects_limit() {
    let (_tmp, config_path) = setup_test_env();

    run_folio(&config_path, &["init"]);
    run_folio(&config_path, &["index"]);

    let (stdout, _, success) = run_folio(
        &config_path,
        &["search", "data science university", "--limit", "1"],
    );
    assert!(success);
    assert!(stdout.contains("1. ["));
    assert!(!stdout.contains("2. ["), "expected one result, got: {}", stdout);
}

#[test]
fn test_search_empty_query_prints_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_folio(&config_path, &["init"]);
    run_folio(&config_path, &["index"]);

    let (stdout, _, success) = run_folio(&config_path, &["search", "   "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_suggest_prints_example_questions() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_folio(&config_path, &["suggest"]);
    assert!(success);
    assert!(stdout.lines().filter(|l| l.starts_with("- ")).count() >= 3);
}

#[test]
fn test_ask_without_generation_prints_apology() {
    let (_tmp, config_path) = setup_test_env();

    run_folio(&config_path, &["init"]);
    run_folio(&config_path, &["index"]);

    // Default config has generation disabled; the chain degrades to the
    // apology instead of erroring out
    let (stdout, stderr, success) = run_folio(
        &config_path,
        &["ask", "Tell me about the enterprise AI knowledge assistant"],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("I apologize"),
        "expected apology with generation disabled, got: {}",
        stdout
    );
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();

    let bad = tmp.path().join("bad.toml");
    fs::write(
        &bad,
        r#"[knowledge]
dir = "./knowledge"

[db]
path = "./folio.sqlite"

[chunking]
chunk_size = 100
chunk_overlap = 100
"#,
    )
    .unwrap();

    let (_, stderr, success) = run_folio(&bad, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}
