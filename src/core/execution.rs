//! # Job Execution Module / 作业执行模块
//!
//! Runs the ordered steps of one variant inside its own working directory.
//! Environment setup is fail-fast: an install or toolchain failure stops the
//! job immediately, and nothing after it runs (including cache-save, so a
//! partial state is never cached). Caching is best-effort: restore and save
//! problems are logged and the job carries on without a cache.
//!
//! 在变体自己的工作目录中按顺序运行其步骤。环境准备遵循快速失败：
//! 安装或工具链失败会立即停止作业，之后的步骤（包括缓存保存）都不会执行，
//! 因此不会缓存不完整的状态。缓存是尽力而为的：恢复和保存的问题只记录日志，
//! 作业在没有缓存的情况下继续运行。

use colored::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        cache_key::{CacheKey, CacheKeyResolver},
        error::{CacheError, StepError},
        models::{Action, FailureReason, JobResult, JobStatus, Step, StepOutcome, StepRecord, Variant},
    },
    infra::{
        cache::CacheStore,
        command::{parse_command_line, split_args, CommandSpec, ProcessLauncher},
        fs::{create_work_dir, pack_path, unpack_into},
        t,
        toolchain::ToolchainInstaller,
    },
};

/// Executes variants against a fixed set of collaborators.
///
/// One runner is shared by every job of a run; it holds no per-job state, so
/// jobs cannot observe each other except through the cache namespace.
///
/// 执行变体的运行器，持有一组固定的协作者。一次运行中的所有作业共享同一个
/// 运行器；它不保存任何作业级状态，因此作业之间除了缓存命名空间外无法互相影响。
pub struct JobRunner {
    launcher: Arc<dyn ProcessLauncher>,
    installer: Arc<dyn ToolchainInstaller>,
    cache: Arc<dyn CacheStore>,
    keys: CacheKeyResolver,
    lock_content: Option<Arc<[u8]>>,
    workspace: Option<PathBuf>,
    cancel: CancellationToken,
}

impl JobRunner {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        installer: Arc<dyn ToolchainInstaller>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            launcher,
            installer,
            cache,
            keys: CacheKeyResolver::default(),
            lock_content: None,
            workspace: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Content of the designated lock artifact, used for cache keys.
    pub fn with_lock_content(mut self, content: Option<Vec<u8>>) -> Self {
        self.lock_content = content.map(Arc::from);
        self
    }

    pub fn with_key_resolver(mut self, keys: CacheKeyResolver) -> Self {
        self.keys = keys;
        self
    }

    /// Directory copied into every job's working directory.
    pub fn with_workspace(mut self, workspace: Option<PathBuf>) -> Self {
        self.workspace = workspace;
        self
    }

    /// Token that stops the runner from starting further steps.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs every step of `variant` in order and reports the outcome.
    ///
    /// `ambient` is the environment the job starts from; the toolchain
    /// activation, the `MATRIX_*` metadata and the variant's own overrides are
    /// layered on top, in that order, the variant winning on collisions.
    ///
    /// 按顺序运行 `variant` 的每个步骤并报告结果。`ambient` 是作业的初始环境；
    /// 工具链激活变量、`MATRIX_*` 元数据以及变体自身的覆盖项依次叠加其上，
    /// 冲突时以变体为准。
    pub async fn run(&self, variant: &Variant, ambient: &BTreeMap<String, String>) -> JobResult {
        let start = Instant::now();
        let mut log = JobLog::default();

        if self.cancel.is_cancelled() {
            return JobResult::cancelled(&variant.id);
        }

        println!("{}", t!("run.job_started", id = &variant.id, os = &variant.os).blue());

        let cache_key = if variant.requests_cache() {
            match self.keys.resolve(variant, self.lock_content.as_deref()) {
                Ok(key) => Some(key),
                Err(e) => {
                    log.push_line(&e.to_string());
                    return self.finish(
                        variant,
                        log,
                        JobStatus::Failed { reason: FailureReason::MissingInput },
                        start,
                    );
                }
            }
        } else {
            None
        };

        let work_dir = match create_work_dir(&variant.id, self.workspace.as_deref()) {
            Ok(dir) => dir,
            Err(e) => {
                log.push_line(&format!("{e:#}"));
                return self.finish(
                    variant,
                    log,
                    JobStatus::Failed { reason: FailureReason::Workspace },
                    start,
                );
            }
        };

        let metadata = variant.metadata_env();
        let mut activation = BTreeMap::new();
        let mut status = JobStatus::Passed;

        for step in &variant.steps {
            if self.cancel.is_cancelled() {
                log.push_line(&t!("run.job_cancelled_before_step", step = &step.name));
                status = JobStatus::Cancelled;
                break;
            }

            if !step.condition.evaluate(variant) {
                log.record(&step.name, StepOutcome::Skipped, Duration::ZERO);
                continue;
            }

            log.header(step);
            let step_start = Instant::now();
            let env = layer_env(ambient, &activation, &metadata, &variant.env);

            let outcome = match &step.action {
                Action::CacheRestore { path } => {
                    self.restore(cache_key.as_ref(), path, work_dir.path(), &mut log)
                        .await;
                    Ok(StepOutcome::Ran)
                }
                Action::CacheSave { path } => {
                    self.save(cache_key.as_ref(), path, work_dir.path(), &mut log)
                        .await;
                    Ok(StepOutcome::Ran)
                }
                Action::Install { command } => self
                    .run_external(&step.name, command, &[], &env, work_dir.path(), &mut log)
                    .await
                    .map(|()| StepOutcome::Ran),
                Action::InstallToolchain => match &variant.toolchain {
                    Some(toolchain) => self
                        .installer
                        .install(&step.name, toolchain, &env, work_dir.path())
                        .await
                        .map(|installed| {
                            log.push(&installed.output);
                            activation.extend(installed.env);
                            StepOutcome::Ran
                        }),
                    None => {
                        log.push_line(&t!("run.no_toolchain"));
                        Ok(StepOutcome::Skipped)
                    }
                },
                Action::RunCommand => match split_args(&step.name, &variant.args, &env) {
                    Ok(extra) => self
                        .run_external(&step.name, &variant.command, &extra, &env, work_dir.path(), &mut log)
                        .await
                        .map(|()| StepOutcome::Ran),
                    Err(e) => Err(e),
                },
            };

            match outcome {
                Ok(outcome) => log.record(&step.name, outcome, step_start.elapsed()),
                Err(e) => {
                    log.record(&step.name, StepOutcome::Failed, step_start.elapsed());
                    if let StepError::NonZeroExit { output, .. } = &e {
                        log.push(output);
                    }
                    log.push_line(&e.to_string());
                    status = JobStatus::Failed {
                        reason: fatal_reason(&step.action),
                    };
                    break;
                }
            }
        }

        self.finish(variant, log, status, start)
    }

    fn finish(&self, variant: &Variant, log: JobLog, status: JobStatus, start: Instant) -> JobResult {
        let duration = start.elapsed();
        let secs = format!("{:.2}", duration.as_secs_f64());
        match status {
            JobStatus::Passed => {
                println!("{}", t!("run.job_passed", id = &variant.id, duration = &secs).green())
            }
            JobStatus::Failed { .. } => {
                println!("{}", t!("run.job_failed", id = &variant.id, duration = &secs).red())
            }
            JobStatus::Cancelled => {
                println!("{}", t!("run.job_cancelled", id = &variant.id).yellow())
            }
        }
        JobResult {
            variant_id: variant.id.clone(),
            status,
            output: log.output,
            duration,
            steps: log.steps,
        }
    }

    async fn run_external(
        &self,
        step: &str,
        line: &str,
        extra_args: &[String],
        env: &BTreeMap<String, String>,
        work_dir: &Path,
        log: &mut JobLog,
    ) -> Result<(), StepError> {
        let (program, mut args) = parse_command_line(step, line, env)?;
        args.extend_from_slice(extra_args);
        let spec = CommandSpec {
            program: program.clone(),
            args,
            env: env.clone(),
            current_dir: work_dir.to_path_buf(),
        };

        log.push_line(&format!("$ {}", spec.display_line()));
        let result = self
            .launcher
            .launch(&spec)
            .await
            .map_err(|source| StepError::Spawn {
                step: step.to_string(),
                program: program.clone(),
                source,
            })?;

        if result.success() {
            log.push(&result.output);
            Ok(())
        } else {
            Err(StepError::NonZeroExit {
                step: step.to_string(),
                program,
                code: result.exit_code,
                output: result.output,
            })
        }
    }

    async fn restore(&self, key: Option<&CacheKey>, path: &Path, work_dir: &Path, log: &mut JobLog) {
        let Some(key) = key else { return };
        match self.try_restore(key, path, work_dir).await {
            Ok(true) => log.push_line(&t!("cache.hit", key = key.as_str())),
            Ok(false) => log.push_line(&t!("cache.miss", key = key.as_str())),
            Err(e) => {
                eprintln!("{}", t!("cache.restore_failed", error = e.to_string()).yellow());
                log.push_line(&e.to_string());
            }
        }
    }

    async fn try_restore(&self, key: &CacheKey, path: &Path, work_dir: &Path) -> Result<bool, CacheError> {
        let Some(bytes) = self.cache.get(&key.entry(path)).await? else {
            return Ok(false);
        };
        let root = work_dir.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_into(&root, &bytes))
            .await
            .map_err(|e| CacheError::Worker(e.to_string()))?
            .map_err(|source| CacheError::Local {
                path: work_dir.join(path),
                source,
            })?;
        Ok(true)
    }

    async fn save(&self, key: Option<&CacheKey>, path: &Path, work_dir: &Path, log: &mut JobLog) {
        let Some(key) = key else { return };
        let saved = match self.pack(path, work_dir).await {
            Ok(bytes) => self.cache.put(&key.entry(path), bytes).await,
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => log.push_line(&t!("cache.saved", key = key.as_str())),
            Err(e) => {
                eprintln!("{}", t!("cache.save_failed", error = e.to_string()).yellow());
                log.push_line(&e.to_string());
            }
        }
    }

    async fn pack(&self, path: &Path, work_dir: &Path) -> Result<Vec<u8>, CacheError> {
        let (root, relative) = (work_dir.to_path_buf(), path.to_path_buf());
        tokio::task::spawn_blocking(move || pack_path(&root, &relative))
            .await
            .map_err(|e| CacheError::Worker(e.to_string()))?
            .map_err(|source| CacheError::Local {
                path: work_dir.join(path),
                source,
            })
    }
}

/// Which failure reason a fatal step maps to.
fn fatal_reason(action: &Action) -> FailureReason {
    match action {
        Action::Install { .. } => FailureReason::Install,
        Action::InstallToolchain => FailureReason::Toolchain,
        Action::RunCommand => FailureReason::Command,
        // Cache steps never fail a job.
        Action::CacheRestore { .. } | Action::CacheSave { .. } => FailureReason::Internal,
    }
}

fn layer_env(
    ambient: &BTreeMap<String, String>,
    activation: &BTreeMap<String, String>,
    metadata: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut env = ambient.clone();
    for layer in [activation, metadata, overrides] {
        env.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    env
}

/// Diagnostic stream and step records of one job.
#[derive(Default)]
struct JobLog {
    output: String,
    steps: Vec<StepRecord>,
}

impl JobLog {
    fn header(&mut self, step: &Step) {
        self.push_line(&format!("==> {} [{}]", step.name, step.action.kind()));
    }

    fn push(&mut self, text: &str) {
        self.output.push_str(text);
        if !text.is_empty() && !text.ends_with('\n') {
            self.output.push('\n');
        }
    }

    fn push_line(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn record(&mut self, name: &str, outcome: StepOutcome, duration: Duration) {
        self.steps.push(StepRecord {
            name: name.to_string(),
            outcome,
            duration,
        });
    }
}
