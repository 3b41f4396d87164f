mod common;

use assert_cmd::prelude::*;
use common::write_matrix;
use predicates::prelude::*;
use std::process::Command;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("run-matrix").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

fn run_matrix() -> Command {
    let mut cmd = bin();
    cmd.arg("--lang").arg("en");
    cmd
}

fn init() -> Command {
    let mut cmd = bin();
    cmd.arg("init").arg("--lang").arg("en");
    cmd
}

/// A configuration error is reported before any job runs, with exit code 2.
///
/// 配置错误在任何作业运行之前报告，退出码为 2。
#[test]
fn test_missing_override_exits_with_config_error() {
    let (_dir, path) = write_matrix(
        r#"
[[axis]]
name = "build"
values = ["stable", "windows"]

[overrides.stable]
toolchain = "stable"
"#,
    );

    run_matrix()
        .arg("--config")
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("`windows` has no override entry"))
        .stdout(predicate::str::contains("Starting").not());
}

#[test]
fn test_missing_document_exits_with_config_error() {
    run_matrix()
        .arg("--config")
        .arg("does/not/exist/Matrix.toml")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read matrix document"));
}

#[test]
fn test_unknown_filter_exits_with_config_error() {
    let (_dir, path) = write_matrix(
        r#"
command = "true"

[[axis]]
name = "build"
values = ["a"]

[overrides.a]
"#,
    );

    run_matrix()
        .arg("--config")
        .arg(&path)
        .arg("--filter")
        .arg("b")
        .assert()
        .code(2);
}

#[cfg(unix)]
mod unix {
    use super::*;

    const TWO_OS_MATRIX: &str = r#"
command = "sh -c 'test $MATRIX_OS = linux'"

[[axis]]
name = "build"
values = ["stable", "macos"]

[overrides.stable]
os = "linux"

[overrides.macos]
os = "macos"
"#;

    #[test]
    fn test_passing_matrix_exits_zero() {
        let (_dir, path) = write_matrix(
            r#"
command = "true"

[[axis]]
name = "build"
values = ["a", "b"]

[overrides.a]
[overrides.b]
"#,
        );

        run_matrix()
            .arg("--config")
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("2 passed, 0 failed, 0 cancelled"))
            .stdout(predicate::str::contains("All variants passed."));
    }

    /// The macOS variant fails its OS check while the linux one passes; the
    /// run exits 1 and the failure details name the failing variant.
    #[test]
    fn test_one_failing_variant_exits_one() {
        let (_dir, path) = write_matrix(TWO_OS_MATRIX);

        run_matrix()
            .arg("--config")
            .arg(&path)
            .arg("-j")
            .arg("1")
            .assert()
            .code(1)
            .stdout(predicate::str::contains("1 passed, 1 failed, 0 cancelled"))
            .stdout(predicate::str::contains("'macos'"));
    }

    #[test]
    fn test_filter_restricts_the_run() {
        let (_dir, path) = write_matrix(TWO_OS_MATRIX);

        run_matrix()
            .arg("--config")
            .arg(&path)
            .arg("--filter")
            .arg("stable")
            .assert()
            .success()
            .stdout(predicate::str::contains("1 passed, 0 failed, 0 cancelled"));
    }

    #[test]
    fn test_filter_takes_several_values_at_once() {
        let (_dir, path) = write_matrix(
            r#"
command = "true"

[[axis]]
name = "build"
values = ["a", "b", "c"]

[overrides.a]
[overrides.b]
[overrides.c]
"#,
        );

        run_matrix()
            .arg("--config")
            .arg(&path)
            .args(["--filter", "a", "c"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2 passed, 0 failed, 0 cancelled"));
    }

    /// The time limit lets the running job finish and cancels the rest.
    #[test]
    fn test_timeout_cancels_pending_jobs() {
        let (_dir, path) = write_matrix(
            r#"
command = "sleep 2"

[[axis]]
name = "build"
values = ["first", "second"]

[overrides.first]
[overrides.second]
"#,
        );

        run_matrix()
            .arg("--config")
            .arg(&path)
            .args(["-j", "1", "--timeout", "1"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Time limit of 1s reached"))
            .stdout(predicate::str::contains("1 passed, 0 failed, 1 cancelled"));
    }

    #[test]
    fn test_json_and_html_reports_are_written() {
        let (dir, path) = write_matrix(TWO_OS_MATRIX);
        let json = dir.path().join("report.json");
        let html = dir.path().join("report.html");

        run_matrix()
            .arg("--config")
            .arg(&path)
            .arg("--report")
            .arg(&json)
            .arg("--html")
            .arg(&html)
            .assert()
            .code(1);

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(report["status"], "failed");
        assert_eq!(report["results"][1]["id"], "macos");
        assert!(std::fs::read_to_string(&html).unwrap().contains("macos"));
    }

    /// Caching without the lock artifact fails the variant, not the run setup.
    #[test]
    fn test_cache_without_lockfile_fails_variant() {
        let (dir, path) = write_matrix(
            r#"
command = "true"
lockfile = "Cargo.lock"

[[axis]]
name = "build"
values = ["a"]

[overrides.a]

[cache]
path = "deps.tar"
"#,
        );

        run_matrix()
            .arg("--config")
            .arg(&path)
            .arg("--cache-dir")
            .arg(dir.path().join("cache"))
            .assert()
            .code(1)
            .stdout(predicate::str::contains("no lock content is available"));
    }
}

#[test]
fn test_init_non_interactive_writes_loadable_document() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("Matrix.toml");

    init()
        .arg("--non-interactive")
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let document = run_matrix::core::config::load_matrix(&output).unwrap();
    assert_eq!(document.axes[0].name, "toolchain");
    assert_eq!(document.axes[0].values, vec!["stable", "beta", "nightly"]);
}

#[test]
fn test_init_does_not_overwrite_without_force() {
    let (_dir, path) = write_matrix("# hand written\n");

    init()
        .arg("--non-interactive")
        .arg("--output")
        .arg(&path)
        .assert()
        .success();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hand written\n");
}
