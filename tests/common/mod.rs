// Shared test helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{tempdir, TempDir};

use run_matrix::core::cache_key::CacheKeyResolver;
use run_matrix::core::error::StepError;
use run_matrix::core::execution::JobRunner;
use run_matrix::core::models::{Action, AxisValue, Condition, Step, Variant};
use run_matrix::infra::cache::{CacheStore, MemoryCacheStore};
use run_matrix::infra::command::{CommandSpec, ProcessLauncher, ProcessOutput};
use run_matrix::infra::toolchain::{Activation, ToolchainInstaller};

type Rule = Box<dyn Fn(&CommandSpec) -> ProcessOutput + Send + Sync>;

/// A launcher that never spawns anything: it records every command and
/// answers with the output of `rule`.
pub struct ScriptedLauncher {
    rule: Rule,
    delay: Option<Duration>,
    calls: Mutex<Vec<CommandSpec>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedLauncher {
    pub fn new(rule: impl Fn(&CommandSpec) -> ProcessOutput + Send + Sync + 'static) -> Self {
        Self {
            rule: Box::new(rule),
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every command succeeds with empty output.
    pub fn succeeding() -> Self {
        Self::new(|_| ok(""))
    }

    /// Each launch holds its slot for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn launch(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok((self.rule)(spec))
    }
}

pub fn ok(output: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(0),
        output: output.to_string(),
    }
}

pub fn fail(code: i32, output: &str) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(code),
        output: output.to_string(),
    }
}

/// Installer double: activates `RUSTUP_TOOLCHAIN`, fails for listed toolchains.
#[derive(Default)]
pub struct FakeInstaller {
    failing: Vec<String>,
    installed: Mutex<Vec<String>>,
}

impl FakeInstaller {
    pub fn failing_for(toolchains: &[&str]) -> Self {
        Self {
            failing: toolchains.iter().map(|s| s.to_string()).collect(),
            installed: Mutex::new(Vec::new()),
        }
    }

    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolchainInstaller for FakeInstaller {
    async fn install(
        &self,
        step: &str,
        toolchain: &str,
        _env: &BTreeMap<String, String>,
        _work_dir: &Path,
    ) -> Result<Activation, StepError> {
        if self.failing.iter().any(|t| t == toolchain) {
            return Err(StepError::NonZeroExit {
                step: step.to_string(),
                program: "rustup".to_string(),
                code: Some(1),
                output: format!("error: toolchain '{toolchain}' is not available\n"),
            });
        }
        self.installed.lock().unwrap().push(toolchain.to_string());
        Ok(Activation {
            env: BTreeMap::from([("RUSTUP_TOOLCHAIN".to_string(), toolchain.to_string())]),
            output: format!("installed {toolchain}\n"),
        })
    }
}

pub fn step(name: &str, action: Action) -> Step {
    Step {
        name: name.to_string(),
        condition: Condition::Always,
        action,
    }
}

pub fn when(name: &str, field: &str, value: &str, action: Action) -> Step {
    Step {
        name: name.to_string(),
        condition: Condition::Equals {
            field: field.to_string(),
            value: value.to_string(),
        },
        action,
    }
}

pub fn cache_steps(path: &str, run: Vec<Step>) -> Vec<Step> {
    let mut steps = vec![step("Restore cache", Action::CacheRestore { path: PathBuf::from(path) })];
    steps.extend(run);
    steps.push(step("Save cache", Action::CacheSave { path: PathBuf::from(path) }));
    steps
}

/// A single-axis variant named after its value.
pub fn variant(id: &str, os: &str, toolchain: Option<&str>, command: &str, steps: Vec<Step>) -> Variant {
    Variant {
        id: id.to_string(),
        axis_values: vec![AxisValue {
            axis: "build".to_string(),
            value: id.to_string(),
        }],
        os: os.to_string(),
        toolchain: toolchain.map(str::to_string),
        command: command.to_string(),
        args: String::new(),
        env: BTreeMap::new(),
        steps,
    }
}

pub struct Harness {
    pub launcher: Arc<ScriptedLauncher>,
    pub installer: Arc<FakeInstaller>,
    pub cache: Arc<MemoryCacheStore>,
}

impl Harness {
    pub fn new(launcher: ScriptedLauncher) -> Self {
        Self::with_installer(launcher, FakeInstaller::default())
    }

    pub fn with_installer(launcher: ScriptedLauncher, installer: FakeInstaller) -> Self {
        Self {
            launcher: Arc::new(launcher),
            installer: Arc::new(installer),
            cache: Arc::new(MemoryCacheStore::new()),
        }
    }

    pub fn runner(&self) -> JobRunner {
        JobRunner::new(
            self.launcher.clone() as Arc<dyn ProcessLauncher>,
            self.installer.clone() as Arc<dyn ToolchainInstaller>,
            self.cache.clone() as Arc<dyn CacheStore>,
        )
        .with_key_resolver(CacheKeyResolver::new(Some("test".to_string())))
    }
}

/// A seed directory holding `files`, copied into each job's working dir.
pub fn seed_workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().expect("Failed to create temporary directory");
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create seed directory");
        }
        fs::write(path, content).expect("Failed to write seed file");
    }
    dir
}

/// Writes a matrix document into a fresh temporary directory.
pub fn write_matrix(content: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("Failed to create temporary directory");
    let path = dir.path().join("Matrix.toml");
    fs::write(&path, content).expect("Failed to write Matrix.toml");
    (dir, path)
}
