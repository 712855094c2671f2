use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn shopc_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("shopc");
    path
}

/// Writes a config with both retailers disabled so nothing leaves the
/// machine.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = r#"
[server]
bind = "127.0.0.1:7340"

[search]
max_query_length = 200

[adapters.amazon]
enabled = false
base_url = "https://www.amazon.ca"
affiliate_tag = "shopc-20"

[adapters.nike]
enabled = false
base_url = "https://www.nike.com"
"#;

    let config_path = config_dir.join("shopc.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_shopc(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = shopc_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run shopc binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_interpret_prints_facets() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_shopc(&config_path, &["interpret", "Nike running shoes"]);
    assert!(success, "interpret failed: {}", stderr);

    assert!(stdout.contains("brands:      nike"), "stdout: {}", stdout);
    assert!(stdout.contains("nike:        true"));
    assert!(stdout.contains("clothing:    true"));
    assert!(stdout.contains("electronics: false"));
    assert!(stdout.contains(&format!(
        "vocabulary:  {}",
        shop_compare::vocab::VOCABULARY_VERSION
    )));
}

#[test]
fn test_sources_lists_both_adapters() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_shopc(&config_path, &["sources"]);
    assert!(success, "sources failed: {}", stderr);

    let amazon = stdout.lines().find(|l| l.starts_with("amazon")).unwrap();
    assert!(amazon.contains("primary"));
    assert!(amazon.contains("DISABLED"));
    let nike = stdout.lines().find(|l| l.starts_with("nike")).unwrap();
    assert!(nike.contains("secondary"));
    assert!(stdout.contains("assistant:  disabled"));
}

#[test]
fn test_search_with_disabled_sources_reports_errors() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_shopc(&config_path, &["search", "running shoes"]);
    assert!(success, "search failed: {}", stderr);

    assert!(stdout.contains("! amazon failed: amazon adapter is disabled"));
    assert!(stdout.contains("! nike failed: nike adapter is disabled"));
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_json_output() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) =
        run_shopc(&config_path, &["search", "gaming laptop", "--json"]);
    assert!(success, "search --json failed: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["products"], serde_json::json!([]));
    assert_eq!(json["hasMoreProducts"], false);
    assert_eq!(json["facets"]["isElectronics"], true);
    assert!(json["errors"]["amazon"].is_string());
}

#[test]
fn test_search_rejects_long_query() {
    let (_tmp, config_path) = setup_test_env();
    let long = "a".repeat(201);
    let (_stdout, stderr, success) = run_shopc(&config_path, &["search", &long]);
    assert!(!success);
    assert!(stderr.contains("at most 200 characters"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        "[rate_limit]\nmax_requests = 0\n",
    )
    .unwrap();

    let (_stdout, stderr, success) = run_shopc(&config_path, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("rate_limit.max_requests"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("absent.toml");

    let (stdout, stderr, success) = run_shopc(&config_path, &["sources"]);
    assert!(success, "sources failed: {}", stderr);
    assert!(stdout.contains("https://www.amazon.ca"));
    assert!(stderr.contains("using defaults"));
}
