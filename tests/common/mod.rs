use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::path::Path;
use std::process::Output;

/// A `dotdee` command running in `cwd`, isolated from the user's
/// configuration files and `RUST_LOG`.
pub fn dotdee_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("dotdee");
    cmd.env_remove("RUST_LOG")
        .arg("--no-config")
        .arg("-C")
        .arg(cwd);
    cmd
}

// Each integration test file is compiled as its own crate, so helpers that a
// given file does not use would otherwise warn.
#[allow(dead_code)]
pub fn status_output(cwd: &Path, file: &str) -> Output {
    let mut cmd = dotdee_cmd(cwd);
    cmd.arg("status").arg(file);
    cmd.output().expect("failed to run `dotdee status`")
}

#[allow(dead_code)]
pub fn extract_fingerprint(stdout: &[u8]) -> String {
    let output = std::str::from_utf8(stdout).expect("status stdout should be UTF-8");
    output
        .lines()
        .find_map(|line| line.strip_prefix("Fingerprint: "))
        .expect("fingerprint not found in output")
        .to_string()
}

#[allow(dead_code)]
pub fn status_fingerprint(cwd: &Path, file: &str) -> (Output, String) {
    let output = status_output(cwd, file);
    let fingerprint = extract_fingerprint(&output.stdout);
    (output, fingerprint)
}

#[cfg(unix)]
#[allow(dead_code)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
