//! # Run Command Module / 运行命令模块
//!
//! The reference driver: loads the matrix document, expands and plans it,
//! wires the real collaborators into a job runner, runs every variant and
//! writes the reports.
//!
//! 参考驱动程序：加载矩阵文档，展开并制定计划，将真实的协作者接入作业运行器，
//! 运行所有变体并输出报告。

use anyhow::Result;
use colored::*;
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        cache_key::CacheKeyResolver,
        config::{self, MatrixDocument},
        error::ConfigError,
        execution::JobRunner,
        expander::expand_document,
        models::Report,
        planner, scheduler,
    },
    infra::{
        cache::FsCacheStore,
        command::{ProcessLauncher, TokioLauncher},
        t,
        toolchain::CommandInstaller,
    },
    reporting::{generate_html_report, print_failure_details, print_summary, write_json_report},
};

/// Arguments of the run command.
/// 运行命令的参数。
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Path to the matrix document / 矩阵文档路径
    pub config: PathBuf,
    /// Maximum parallel jobs; defaults to the number of CPUs / 最大并行作业数，默认为 CPU 数量
    pub concurrency: Option<usize>,
    /// Axis values to keep / 要保留的轴值
    pub filters: Vec<String>,
    pub total_runners: Option<usize>,
    pub runner_index: Option<usize>,
    /// Cache store directory / 缓存存储目录
    pub cache_dir: Option<PathBuf>,
    /// JSON report output / JSON 报告输出
    pub report: Option<PathBuf>,
    /// HTML report output / HTML 报告输出
    pub html: Option<PathBuf>,
    /// Wall-clock limit for the whole run, in seconds / 整个运行的时间上限（秒）
    pub timeout_secs: Option<u64>,
    /// Explicit language, wins over the document's / 显式指定的语言，优先于文档设置
    pub lang: Option<String>,
}

/// Executes the run command.
///
/// Everything up to scheduling can fail with a [`ConfigError`]; once jobs are
/// dispatched, failures only show up in the returned report.
///
/// 执行运行命令。调度之前的任何步骤都可能以 [`ConfigError`] 失败；
/// 作业分派后，失败只会体现在返回的报告中。
pub async fn execute(options: RunOptions) -> Result<Report> {
    let (document, config_path) = setup_and_parse_config(&options.config)?;
    let locale = options.lang.clone().unwrap_or_else(|| document.language.clone());
    rust_i18n::set_locale(&locale);

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    println!(
        "{}",
        t!("loading_matrix", locale = &locale, path = config_path.display())
    );

    let variants = expand_document(&document)?;
    let expanded = variants.len();
    let plan = planner::plan_execution(
        variants,
        &document.axes,
        &options.filters,
        options.total_runners,
        options.runner_index,
    )?;
    let lock_content = document.read_lock_content(&base_dir)?;

    println!(
        "{}",
        t!("variants_expanded", locale = &locale, count = expanded).cyan()
    );
    if plan.filtered_count > 0 {
        println!(
            "{}",
            t!("variants_filtered", locale = &locale, count = plan.filtered_count).cyan()
        );
    }
    if let (Some(total), Some(index)) = (options.total_runners, options.runner_index) {
        println!(
            "{}",
            t!(
                "running_as_split_runner",
                locale = &locale,
                index = index + 1,
                total = total,
                count = plan.variants.len()
            )
            .bold()
        );
    } else {
        println!("{}", t!("running_as_single_runner", locale = &locale).bold());
    }

    let cancel = setup_signal_handler(&locale);
    if let Some(secs) = options.timeout_secs {
        arm_timeout(cancel.clone(), Duration::from_secs(secs), &locale);
    }

    let runner = build_runner(&document, &base_dir, &options, lock_content, cancel);
    let jobs = options.concurrency.unwrap_or_else(num_cpus::get);
    let ambient: BTreeMap<String, String> = env::vars().collect();

    if plan.variants.is_empty() {
        println!("{}", t!("no_variants_to_run", locale = &locale).green());
    }

    let report = scheduler::run_all(Arc::new(runner), plan.variants, jobs, Arc::new(ambient)).await;

    print_summary(&report, &locale);
    print_failure_details(&report, &locale);

    if let Some(path) = &options.report {
        match write_json_report(&report, path) {
            Ok(()) => println!("{}", t!("report_written", locale = &locale, path = path.display())),
            Err(e) => eprintln!("{} {:#}", t!("report_failed", locale = &locale).red(), e),
        }
    }
    if let Some(path) = &options.html {
        match generate_html_report(&report, path, &locale) {
            Ok(()) => println!("{}", t!("report_written", locale = &locale, path = path.display())),
            Err(e) => eprintln!("{} {:#}", t!("report_failed", locale = &locale).red(), e),
        }
    }

    if report.passed() {
        println!("\n{}", t!("matrix_passed", locale = &locale).green().bold());
    } else {
        println!("\n{}", t!("matrix_failed", locale = &locale).red().bold());
    }
    Ok(report)
}

/// Canonicalizes the document path and parses it.
fn setup_and_parse_config(config_path_arg: &Path) -> Result<(MatrixDocument, PathBuf), ConfigError> {
    let config_path = fs::canonicalize(config_path_arg).map_err(|source| ConfigError::Read {
        path: config_path_arg.to_path_buf(),
        source,
    })?;
    let document = config::load_matrix(&config_path)?;
    Ok((document, config_path))
}

fn build_runner(
    document: &MatrixDocument,
    base_dir: &Path,
    options: &RunOptions,
    lock_content: Option<Vec<u8>>,
    cancel: CancellationToken,
) -> JobRunner {
    let launcher: Arc<dyn ProcessLauncher> = Arc::new(TokioLauncher);
    let installer = Arc::new(CommandInstaller::new(
        Arc::clone(&launcher),
        document.toolchain.clone(),
    ));
    let cache_dir = options
        .cache_dir
        .clone()
        .unwrap_or_else(|| base_dir.join(".run-matrix").join("cache"));
    let prefix = document.cache.as_ref().and_then(|c| c.prefix.clone());

    JobRunner::new(launcher, installer, Arc::new(FsCacheStore::new(cache_dir)))
        .with_lock_content(lock_content)
        .with_key_resolver(CacheKeyResolver::new(prefix))
        .with_workspace(document.workspace_path(base_dir))
        .with_cancellation(cancel)
}

/// Sets up a signal handler for graceful shutdown.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\n{}", t!("shutdown_signal", locale = &locale).yellow());
            token_clone.cancel();
        }
    });

    token
}

/// Cancels the run once `limit` has elapsed.
fn arm_timeout(token: CancellationToken, limit: Duration, locale: &str) {
    let locale = locale.to_string();
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                println!(
                    "\n{}",
                    t!("timeout_reached", locale = &locale, secs = limit.as_secs()).yellow()
                );
                token.cancel();
            }
        }
    });
}
