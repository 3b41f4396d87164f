use run_matrix::core::config::{load_matrix, MatrixDocument, Scalar};
use run_matrix::core::error::ConfigError;
use run_matrix::core::models::{Action, Condition};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn parse(content: &str) -> Result<MatrixDocument, ConfigError> {
    MatrixDocument::from_toml(content, Path::new("Matrix.toml"))
}

const MINIMAL: &str = r#"
[[axis]]
name = "build"
values = ["stable"]

[overrides.stable]
toolchain = "stable"
"#;

#[test]
fn test_defaults_are_applied() {
    let document = parse(MINIMAL).unwrap();

    assert_eq!(document.language, "en");
    assert_eq!(document.command, "cargo test");
    assert_eq!(document.args, "");
    assert!(document.cache.is_none());
    assert_eq!(document.toolchain.env, "RUSTUP_TOOLCHAIN");
    assert!(document.toolchain.install.contains("{toolchain}"));
}

#[test]
fn test_override_scalars_keep_their_type() {
    let document = parse(
        r#"
[[axis]]
name = "build"
values = ["stable"]

[overrides.stable]
toolchain = "stable"
RUST_TEST_THREADS = 2
CI = true
"#,
    )
    .unwrap();

    let fragment = &document.overrides["stable"];
    assert_eq!(fragment["RUST_TEST_THREADS"], Scalar::Integer(2));
    assert_eq!(fragment["CI"], Scalar::Bool(true));
}

#[test]
fn test_default_steps_without_cache() {
    let template = parse(MINIMAL).unwrap().template().unwrap();

    let actions: Vec<_> = template.steps.iter().map(|s| s.action.kind()).collect();
    assert_eq!(actions, vec!["install-toolchain", "run-command"]);
    assert_eq!(
        template.steps[0].condition,
        Condition::Present { field: "toolchain".to_string() }
    );
}

#[test]
fn test_default_steps_with_cache_wrap_the_run() {
    let content = format!("{MINIMAL}\n[cache]\npath = \"deps.tar\"\n");
    let template = parse(&content).unwrap().template().unwrap();

    assert_eq!(
        template.steps.first().map(|s| &s.action),
        Some(&Action::CacheRestore { path: PathBuf::from("deps.tar") })
    );
    assert_eq!(
        template.steps.last().map(|s| &s.action),
        Some(&Action::CacheSave { path: PathBuf::from("deps.tar") })
    );
}

#[test]
fn test_declared_steps_with_conditions() {
    let content = format!(
        r#"{MINIMAL}
[[steps]]
name = "Install OpenSSL"
action = "install"
command = "sudo apt-get install -y libssl-dev"
when = {{ os = "linux" }}
unless = {{ toolchain = "nightly" }}

[[steps]]
action = "run-command"
"#
    );
    let template = parse(&content).unwrap().template().unwrap();

    assert_eq!(template.steps.len(), 2);
    assert_eq!(template.steps[1].name, "step 2");
    assert_eq!(
        template.steps[0].condition,
        Condition::All(vec![
            Condition::Equals { field: "os".into(), value: "linux".into() },
            Condition::Not(Box::new(Condition::Equals {
                field: "toolchain".into(),
                value: "nightly".into()
            })),
        ])
    );
}

#[test]
fn test_invalid_steps_are_rejected() {
    let missing_command = format!("{MINIMAL}\n[[steps]]\nname = \"deps\"\naction = \"install\"\n");
    let err = parse(&missing_command).unwrap().template().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidStep { name, .. } if name == "deps"));

    let cache_without_path = format!("{MINIMAL}\n[[steps]]\naction = \"cache-save\"\n");
    assert!(matches!(
        parse(&cache_without_path).unwrap().template(),
        Err(ConfigError::InvalidStep { .. })
    ));

    let escaping = format!("{MINIMAL}\n[[steps]]\naction = \"cache-restore\"\npath = \"../outside\"\n");
    assert!(matches!(
        parse(&escaping).unwrap().template(),
        Err(ConfigError::InvalidStep { .. })
    ));
}

#[test]
fn test_unknown_action_is_a_parse_error() {
    let content = format!("{MINIMAL}\n[[steps]]\naction = \"deploy\"\n");
    assert!(matches!(parse(&content), Err(ConfigError::Parse { .. })));
}

#[test]
fn test_missing_axis_table_is_a_parse_error() {
    assert!(matches!(parse("command = \"cargo test\"\n"), Err(ConfigError::Parse { .. })));
}

#[test]
fn test_load_matrix_reports_missing_file() {
    let dir = tempdir().unwrap();
    let err = load_matrix(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_lock_content_is_read_relative_to_document() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Cargo.lock"), "version = 3\n").unwrap();

    let with_lock = parse(&format!("lockfile = \"Cargo.lock\"\n{MINIMAL}")).unwrap();
    assert_eq!(
        with_lock.read_lock_content(dir.path()).unwrap(),
        Some(b"version = 3\n".to_vec())
    );

    let missing = parse(&format!("lockfile = \"missing.lock\"\n{MINIMAL}")).unwrap();
    assert_eq!(missing.read_lock_content(dir.path()).unwrap(), None);

    let none = parse(MINIMAL).unwrap();
    assert_eq!(none.read_lock_content(dir.path()).unwrap(), None);
}
