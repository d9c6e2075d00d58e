//! CLI smoke tests for the tenancy-server binary
//!
//! These tests drive the compiled binary: help output, configuration
//! validation and the migrate command against a throwaway SQLite file.

use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Helper to run the tenancy-server binary with given arguments
fn run_tenancy_server(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_tenancy-server"))
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute tenancy-server")
}

/// Config rooted in `home` so logs and databases stay inside the temp dir.
fn write_config(dir: &Path, name: &str, body: &str) -> String {
    let home = dir.join("home");
    let content = format!(
        r#"
server:
  home_dir: "{}"
  host: "127.0.0.1"
  port: 0

logging:
  default:
    console_level: error
    file: "logs/tenancy.log"
    file_level: info
    max_backups: 1
    max_size_mb: 1
{body}"#,
        home.display()
    );
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write config file");
    path.to_str().unwrap().to_string()
}

#[test]
fn test_cli_help_command() {
    let output = run_tenancy_server(&["--help"]);

    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tenancy-server"), "Should contain binary name");
    assert!(stdout.contains("Usage:"), "Should contain usage information");
    assert!(stdout.contains("run"), "Should contain 'run' subcommand");
    assert!(stdout.contains("check"), "Should contain 'check' subcommand");
    assert!(stdout.contains("migrate"), "Should contain 'migrate' subcommand");
    assert!(stdout.contains("--config"), "Should mention config option");
    assert!(stdout.contains("--mock"), "Should mention mock option");
}

#[test]
fn test_cli_version_command() {
    let output = run_tenancy_server(&["--version"]);

    assert!(output.status.success(), "Version command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tenancy-server"), "Should contain binary name");
    assert!(stdout.contains("0.1.0"), "Should contain version number");
}

#[test]
fn test_cli_invalid_command() {
    let output = run_tenancy_server(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error"),
        "Should contain error message about invalid command: {stderr}"
    );
}

#[test]
fn test_cli_config_validation_missing_file() {
    for flag in ["--config", "-c"] {
        let output = run_tenancy_server(&[flag, "/nonexistent/config.yaml", "check"]);

        assert!(!output.status.success(), "Should fail with missing config");

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(
            stderr.contains("config file not found"),
            "Should mention config file issue: {stderr}"
        );
    }
}

#[test]
fn test_cli_config_validation_invalid_yaml() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("invalid.yaml");

    std::fs::write(&config_path, "invalid: yaml: content: [unclosed")
        .expect("Failed to write file");

    let output = run_tenancy_server(&["--config", config_path.to_str().unwrap(), "check"]);

    assert!(!output.status.success(), "Should fail with invalid YAML");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("config"),
        "Should mention the configuration: {stderr}"
    );
}

#[test]
fn test_cli_config_validation_valid_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(
        temp_dir.path(),
        "valid.yaml",
        r#"
database:
  url: "sqlite://database/tenancy.db?mode=rwc"

api:
  default_page_size: 20
"#,
    );

    let output = run_tenancy_server(&["--config", &config, "check"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "Should succeed with valid config: {stderr}"
    );
    assert!(stdout.contains("Configuration check passed"), "{stdout}");
    assert!(stdout.contains("default_page_size: 20"), "{stdout}");
}

#[test]
fn test_cli_rejects_unsupported_database() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(
        temp_dir.path(),
        "mysql.yaml",
        r#"
database:
  url: "mysql://localhost/tenancy"
"#,
    );

    let output = run_tenancy_server(&["--config", &config, "check"]);

    assert!(!output.status.success(), "Unsupported backend should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unsupported database type"), "{stderr}");
}

#[test]
fn test_cli_mock_flag() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(
        temp_dir.path(),
        "mock.yaml",
        r#"
database:
  url: "mysql://localhost/nonexistent"
"#,
    );

    // --mock swaps in an in-memory database before validation
    let output = run_tenancy_server(&["--config", &config, "--mock", "check"]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "Should succeed with mock database: {stderr}"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sqlite::memory:"), "{stdout}");
}

#[test]
fn test_cli_print_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), "print.yaml", "");

    let output = run_tenancy_server(&["--config", &config, "--port", "9123", "--print-config"]);

    assert!(output.status.success(), "Print config should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("port: 9123"), "CLI port should win: {stdout}");
}

#[test]
fn test_cli_migrate_creates_database() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(
        temp_dir.path(),
        "migrate.yaml",
        r#"
database:
  url: "sqlite://database/tenancy.db?mode=rwc"
"#,
    );

    let output = run_tenancy_server(&["--config", &config, "migrate"]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "Migrate should succeed: {stderr}");
    assert!(temp_dir
        .path()
        .join("home")
        .join("database")
        .join("tenancy.db")
        .is_file());

    // Applying twice is a no-op
    let output = run_tenancy_server(&["--config", &config, "migrate"]);
    assert!(output.status.success(), "Second migrate should succeed");
}

#[test]
fn test_cli_verbose_flag() {
    let output = run_tenancy_server(&["--verbose", "--help"]);

    assert!(output.status.success(), "Verbose help should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"), "Should still contain usage information");
}

#[test]
fn test_cli_subcommand_help() {
    for (sub, needle) in [("run", "server"), ("check", "configuration"), ("migrate", "migrations")] {
        let output = run_tenancy_server(&[sub, "--help"]);

        assert!(output.status.success(), "{sub} help should succeed");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            stdout.to_lowercase().contains(needle),
            "{sub} help should describe the command: {stdout}"
        );
    }
}
