//! End-to-end CLI runs. Everything here stays offline: builtin math needs no
//! network and the model endpoint points at a closed port.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `relay` command isolated from the host's config files and credentials.
fn relay(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("relay").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("TOOLRELAY_CONFIG")
        .env_remove("GROQ_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("TOOLRELAY_API_KEY")
        .env_remove("WEATHER_API_KEY");
    cmd
}

const MATH_ONLY: &str = r#"
[model]
base_url = "http://127.0.0.1:9/v1"
timeout_ms = 2000

[telemetry]
log_level = "warn"

[[backends]]
name = "math"
transport = "builtin"
toolkit = "math"
"#;

#[test]
fn test_config_prints_effective_settings() {
    let home = TempDir::new().unwrap();
    relay(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[model]"))
        .stdout(predicate::str::contains("max_turns = 8"))
        .stdout(predicate::str::contains("toolkit = \"weather\""));
}

#[test]
fn test_config_hides_api_key() {
    let home = TempDir::new().unwrap();
    relay(&home)
        .arg("config")
        .env("GROQ_API_KEY", "gsk_secret_value")
        .assert()
        .success()
        .stdout(predicate::str::contains("# api_key is set"))
        .stdout(predicate::str::contains("gsk_secret_value").not());
}

#[test]
fn test_tools_lists_default_builtins() {
    let home = TempDir::new().unwrap();
    relay(&home)
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("add [math]"))
        .stdout(predicate::str::contains("get_weather [weather]"))
        .stdout(predicate::str::contains("- location: string, required"))
        .stdout(predicate::str::contains("6 tools"));
}

#[test]
fn test_tools_respects_config_file() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("math.toml");
    std::fs::write(&config, MATH_ONLY).unwrap();

    relay(&home)
        .args(["--config", config.to_str().unwrap(), "tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("multiple [math]"))
        .stdout(predicate::str::contains("get_weather").not());
}

#[test]
fn test_local_config_file_is_discovered() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("toolrelay.toml"), MATH_ONLY).unwrap();

    relay(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("# Loaded from:"))
        .stdout(predicate::str::contains("toolkit = \"weather\"").not());
}

#[test]
fn test_missing_config_file_fails() {
    let home = TempDir::new().unwrap();
    relay(&home)
        .args(["--config", "does-not-exist.toml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.toml"));
}

#[test]
fn test_unreachable_backend_fails_startup() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("remote.toml");
    std::fs::write(
        &config,
        r#"
[agent]
discovery_timeout_ms = 2000

[[backends]]
name = "remote"
transport = "http"
url = "http://127.0.0.1:9/mcp"
"#,
    )
    .unwrap();

    relay(&home)
        .args(["--config", config.to_str().unwrap(), "tools"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote"));
}

#[test]
fn test_unreachable_model_still_answers() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("math.toml");
    std::fs::write(&config, MATH_ONLY).unwrap();

    relay(&home)
        .args(["--config", config.to_str().unwrap(), "ask", "what is 2 + 2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Message 1 response: Sorry, I had trouble answering that.",
        ));
}

#[test]
fn test_batch_reads_stdin_and_skips_blank_lines() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("math.toml");
    std::fs::write(&config, MATH_ONLY).unwrap();

    relay(&home)
        .args(["--config", config.to_str().unwrap(), "batch"])
        .write_stdin("what is 2 + 2\n\n   \nwhat is 3 + 3\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Message 1 response:"))
        .stdout(predicate::str::contains("Message 2 response:"))
        .stdout(predicate::str::contains("Message 3 response:").not());
}
