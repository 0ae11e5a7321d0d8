//! CLI command builders for tests

use assert_cmd::Command;

/// Get a Command for the `wrench` binary with clean environment
///
/// `RUST_LOG=error` keeps tracing output out of asserted stderr.
///
/// # Example
///
/// ```rust,no_run
/// use wrench_test_helpers::cli::wrench_command;
///
/// wrench_command().arg("--version").assert().success();
/// ```
#[allow(deprecated)]
pub fn wrench_command() -> Command {
    let mut cmd = Command::cargo_bin("wrench").expect("Failed to find wrench binary");
    cmd.env("RUST_LOG", "error");
    cmd
}
