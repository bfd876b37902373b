use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn temp_dir_with_file() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("config"), "hello\n").unwrap();
    temp
}

#[test]
fn update_without_flags_respects_rust_log_info() {
    let temp = temp_dir_with_file();

    cargo_bin_cmd!("dotdee")
        .env("RUST_LOG", "info")
        .arg("--no-config")
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::contains("Generated"))
        .stderr(predicate::str::contains("Moving"));
}

#[test]
fn update_without_flags_respects_rust_log_warn() {
    let temp = temp_dir_with_file();

    cargo_bin_cmd!("dotdee")
        .env("RUST_LOG", "warn")
        .arg("--no-config")
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn verbose_overrides_rust_log_warn() {
    let temp = temp_dir_with_file();

    cargo_bin_cmd!("dotdee")
        .env("RUST_LOG", "warn")
        .arg("--no-config")
        .arg("-v")
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::contains("Generated"));
}

#[test]
fn verbose_debug_overrides_rust_log_warn() {
    let temp = temp_dir_with_file();

    cargo_bin_cmd!("dotdee")
        .env("RUST_LOG", "warn")
        .arg("--no-config")
        .arg("-vv")
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::contains("SHA-256 of"));
}

#[test]
fn log_level_overrides_rust_log_warn() {
    let temp = temp_dir_with_file();

    cargo_bin_cmd!("dotdee")
        .env("RUST_LOG", "warn")
        .arg("--no-config")
        .arg("--log-level")
        .arg("info")
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::contains("Generated"));
}

#[test]
fn trace_log_level_emits_debug_messages() {
    let temp = temp_dir_with_file();

    cargo_bin_cmd!("dotdee")
        .env("RUST_LOG", "warn")
        .arg("--no-config")
        .arg("--log-level")
        .arg("trace")
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::contains("SHA-256 of"));
}

fn forced_update(temp: &TempDir, quiet: bool) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("dotdee");
    cmd.env_remove("RUST_LOG").arg("--no-config");
    if quiet {
        cmd.arg("-q");
    }
    cmd.arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("--force")
        .arg("config")
        .assert()
        .success()
}

#[test]
fn forced_overwrite_warns_by_default() {
    let temp = temp_dir_with_file();
    forced_update(&temp, false);
    fs::write(temp.path().join("config"), "edited\n").unwrap();

    forced_update(&temp, false).stderr(predicate::str::contains("WARN:"));
}

#[test]
fn quiet_suppresses_warnings() {
    let temp = temp_dir_with_file();
    forced_update(&temp, false);
    fs::write(temp.path().join("config"), "edited\n").unwrap();

    forced_update(&temp, true).stderr(predicate::str::is_empty());
}

#[test]
fn config_file_sets_log_level() {
    let temp = temp_dir_with_file();
    let config = temp.path().join("dotdee.toml");
    fs::write(&config, "log_level = \"info\"\n").unwrap();

    cargo_bin_cmd!("dotdee")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&config)
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::contains("Generated"));
}

#[test]
fn rust_log_overrides_config_file() {
    let temp = temp_dir_with_file();
    let config = temp.path().join("dotdee.toml");
    fs::write(&config, "log_level = \"info\"\n").unwrap();

    cargo_bin_cmd!("dotdee")
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(&config)
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn invalid_config_file_is_reported() {
    let temp = temp_dir_with_file();
    let config = temp.path().join("dotdee.toml");
    fs::write(&config, "hots = \"typo\"\n").unwrap();

    cargo_bin_cmd!("dotdee")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&config)
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .code(255)
        .stderr(predicate::str::contains("Invalid configuration file"));

    assert_eq!(fs::read(temp.path().join("config")).unwrap(), b"hello\n");
    assert!(!temp.path().join("config.d").exists());
}

#[test]
fn log_level_conflicts_with_verbose() {
    cargo_bin_cmd!("dotdee")
        .arg("--log-level")
        .arg("info")
        .arg("-v")
        .arg("status")
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--log-level <LEVEL>"))
        .stderr(predicate::str::contains("--verbose"));
}

#[test]
fn help_mentions_rust_log_precedence_for_logging_flags() {
    cargo_bin_cmd!("dotdee")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("-v, --verbose"))
        .stdout(predicate::str::contains("--log-level <LEVEL>"))
        .stdout(predicate::str::contains("Takes precedence over RUST_LOG."));
}

#[test]
fn errors_go_to_stderr_without_emoji_when_not_tty() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("config")).unwrap();

    // capture() makes stdout/stderr non-tty
    let output = cargo_bin_cmd!("dotdee")
        .env_remove("RUST_LOG")
        .arg("--no-config")
        .arg("-C")
        .arg(temp.path())
        .arg("update")
        .arg("config")
        .assert()
        .failure()
        .get_output()
        .clone();

    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);

    // Should not include emoji prefixes when not a TTY
    for ch in stderr.chars() {
        assert!(
            ch.is_ascii(),
            "stderr unexpectedly contains non-ASCII character: {ch:?}"
        );
    }
    assert!(
        stderr.contains("ERROR:"),
        "stderr should include the error prefix"
    );
}
