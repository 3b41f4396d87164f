//! # Console Reporting Module / 控制台报告模块
//!
//! Prints the per-variant summary table, the passed/failed/cancelled count
//! line, and the captured output of every job that did not pass.
//!
//! 打印每个变体的摘要表、通过/失败/取消的计数行，以及每个未通过作业的
//! 捕获输出。

use colored::*;

use crate::core::models::{JobStatus, Report};
use crate::infra::t;

/// Prints a formatted summary of job results to the console.
///
/// 在控制台打印格式化的作业结果摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Matrix Summary ---
///   - Passed     | stable                                   |      1.23s
///   - Failed     | macos                                    |      0.45s
///   - Cancelled  | nightly                                  |        N/A
/// 1 passed, 1 failed, 1 cancelled
/// ```
pub fn print_summary(report: &Report, locale: &str) {
    println!("\n{}", t!("summary.banner", locale = locale).bold());

    for result in &report.results {
        let label = result.status.label(locale);
        let status_colored = match result.status {
            JobStatus::Passed => label.green(),
            JobStatus::Failed { .. } => label.red(),
            JobStatus::Cancelled => label.dimmed(),
        };
        let duration_str = if result.status == JobStatus::Cancelled && result.steps.is_empty() {
            "N/A".to_string()
        } else {
            format!("{:.2?}", result.duration)
        };

        println!(
            "  - {:<10} | {:<40} | {:>10}",
            status_colored, result.variant_id, duration_str
        );
    }

    println!("{}", count_line(report, locale));
}

/// The "N passed, M failed, K cancelled" line.
/// “N 个通过，M 个失败，K 个取消”汇总行。
pub fn count_line(report: &Report, locale: &str) -> String {
    t!(
        "summary.counts",
        locale = locale,
        passed = report.count_passed(),
        failed = report.count_failed(),
        cancelled = report.count_cancelled()
    )
    .to_string()
}

/// Prints the diagnostic stream of every failed job.
///
/// 打印每个失败作业的诊断输出。
pub fn print_failure_details(report: &Report, locale: &str) {
    let failures: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.status.is_failed())
        .collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("summary.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        let reason = match result.status {
            JobStatus::Failed { reason } => format!("{reason:?}"),
            _ => String::new(),
        };
        println!(
            "[{}/{}] {} '{}' ({})",
            i + 1,
            failures.len(),
            t!("summary.failure_header", locale = locale).red(),
            result.variant_id.cyan(),
            reason
        );
        println!("\n--- {} ---\n", t!("summary.job_log", locale = locale).yellow());
        println!("{}", result.output.trim_end());
        println!("\n{}", "-".repeat(80));
    }
}
