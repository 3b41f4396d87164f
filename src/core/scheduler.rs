//! # Scheduler / Aggregator Module / 调度与汇总模块
//!
//! Dispatches variants to the job runner with bounded concurrency and merges
//! their results into one report. Jobs are independent: a failure never
//! cancels a sibling; only the run-wide cancellation token stops new work.
//!
//! 以有限并发将变体分派给作业运行器，并将结果合并为一份报告。作业彼此独立：
//! 失败不会取消其他作业；只有整个运行范围的取消令牌才会停止新的工作。

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::execution::JobRunner;
use crate::core::models::{FailureReason, JobResult, JobStatus, OverallStatus, Report, Variant};

/// Runs every variant, at most `max_concurrency` at a time, and aggregates.
///
/// Variants that have not started when the runner's cancellation token fires
/// are reported as cancelled. Results come back in the order of `variants`.
///
/// 运行所有变体（同时最多 `max_concurrency` 个）并汇总结果。取消令牌触发时
/// 尚未开始的变体会被报告为已取消。结果按 `variants` 的顺序返回。
pub async fn run_all(
    runner: Arc<JobRunner>,
    variants: Vec<Variant>,
    max_concurrency: usize,
    ambient: Arc<BTreeMap<String, String>>,
) -> Report {
    let started_at = Utc::now();
    let start = Instant::now();
    let jobs = max_concurrency.max(1);
    let cancel = runner.cancellation().clone();

    let mut results: Vec<(usize, JobResult)> =
        stream::iter(variants.into_iter().enumerate().map(|(index, variant)| {
            let runner = Arc::clone(&runner);
            let ambient = Arc::clone(&ambient);
            let cancel = cancel.clone();

            async move {
                if cancel.is_cancelled() {
                    return (index, JobResult::cancelled(&variant.id));
                }

                let variant_id = variant.id.clone();
                let handle = tokio::spawn(async move { runner.run(&variant, &ambient).await });

                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => JobResult {
                        variant_id,
                        status: JobStatus::Failed {
                            reason: FailureReason::Internal,
                        },
                        output: format!("Critical error during job execution: {}", e),
                        duration: Duration::default(),
                        steps: Vec::new(),
                    },
                };
                (index, result)
            }
        }))
        .buffer_unordered(jobs)
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);
    aggregate(
        results.into_iter().map(|(_, result)| result).collect(),
        started_at,
        start.elapsed(),
    )
}

/// Merges job results into a report. Performs no execution.
///
/// The overall status is `Passed` iff every result passed; cancelled results
/// count against the run just like failures.
///
/// 将作业结果合并为报告，不执行任何操作。仅当所有结果都通过时总体状态才为
/// `Passed`；已取消的结果与失败一样会使整个运行不通过。
pub fn aggregate(results: Vec<JobResult>, started_at: DateTime<Utc>, duration: Duration) -> Report {
    let status = if results.iter().all(|r| r.status.is_passed()) {
        OverallStatus::Passed
    } else {
        OverallStatus::Failed
    };
    Report {
        status,
        results,
        started_at,
        duration,
    }
}
