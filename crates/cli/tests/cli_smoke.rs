use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Config pointing storage at `dir` with the language model switched off.
fn write_config(dir: &Path) -> String {
    let path = dir.join("jobseek.config.toml");
    let content = format!(
        "[llm]\nenabled = false\n\n[storage]\npath = {:?}\n",
        dir.join("data").to_string_lossy()
    );
    fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

fn jobseek() -> Command {
    Command::cargo_bin("jobseek").unwrap()
}

#[test]
fn prints_help() {
    jobseek().arg("--help").assert().success().stdout(contains("natural-language job search"));
}

#[test]
fn search_help() {
    jobseek().args(["search", "--help"]).assert().success().stdout(contains("Search for job postings"));
}

#[test]
fn filter_help() {
    jobseek().args(["filter", "--help"]).assert().success().stdout(contains("metadata filter"));
}

#[test]
fn invalid_command_fails() {
    jobseek().arg("foo").assert().failure();
}

#[test]
fn invalid_mode_fails() {
    jobseek().args(["search", "rust", "--mode", "hybrid"]).assert().failure();
}

#[test]
fn config_init_writes_template_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conf").join("jobseek.config.toml");
    let path_str = path.to_string_lossy().to_string();

    jobseek().args(["config", "init", "--path", &path_str]).assert().success().stdout(contains("wrote"));
    assert!(fs::read_to_string(&path).unwrap().contains("[search]"));

    jobseek().args(["config", "init", "--path", &path_str]).assert().failure().stderr(contains("already exists"));
    jobseek().args(["config", "init", "--path", &path_str, "--force"]).assert().success();
}

#[test]
fn config_show_output_loads_back() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let shown = jobseek().args(["--config", &config, "config", "show"]).assert().success().get_output().stdout.clone();
    let shown = String::from_utf8(shown).unwrap();
    assert!(shown.contains("enabled = false"));

    let copy = dir.path().join("shown.toml");
    fs::write(&copy, &shown).unwrap();
    jobseek()
        .args(["--config", &copy.to_string_lossy(), "config", "show"])
        .assert()
        .success()
        .stdout(shown);
}

#[test]
fn filter_uses_salary_regex_without_model() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    jobseek()
        .args(["--config", &config, "filter", "5200만원 받는 백엔드"])
        .assert()
        .success()
        .stdout(contains("salary_bucket_2m_label = '5,200만~5,400만'"));
}

#[test]
fn status_on_empty_storage() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());

    jobseek()
        .args(["--config", &config, "status"])
        .assert()
        .success()
        .stdout(contains("chunks:   0"))
        .stdout(contains("postings: 0"));
}

#[test]
fn import_then_keyword_search() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let postings = dir.path().join("postings.jsonl");
    fs::write(
        &postings,
        concat!(
            r#"{"_id": "p1", "company": "Acme", "title": "Backend Engineer", "detail": "rust services", "status": "active", "due_time": "2025-06-30", "sourceData": "<html>"}"#, "\n",
            r#"{"_id": "p2", "company": "Globex", "title": "Platform Engineer", "detail": "rust tooling", "status": "active", "due_time": "2025-04-01"}"#, "\n",
            r#"{"_id": "p3", "company": "Initech", "title": "Rust Lead", "detail": "rust", "status": "closed"}"#, "\n",
        ),
    )
    .unwrap();

    jobseek()
        .args(["--config", &config, "import", "postings", &postings.to_string_lossy()])
        .assert()
        .success()
        .stdout(contains("done: 3 postings imported"));

    jobseek()
        .args(["--config", &config, "search", "rust", "--mode", "keyword"])
        .assert()
        .success()
        .stdout(contains("search: 2 results"))
        .stdout(contains("1. [p2] Globex"))
        .stdout(contains("2. [p1] Acme"));

    jobseek()
        .args(["--config", &config, "search", "rust", "--mode", "keyword", "--json"])
        .assert()
        .success()
        .stdout(contains("\"total\": 2"))
        .stdout(contains("sourceData").not());
}
