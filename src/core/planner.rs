//! # Execution Planner Module / 执行计划模块
//!
//! Narrows the expanded variants down to what this invocation runs: the
//! `--filter` selection first, then the share assigned to this runner when the
//! matrix is split across several CI machines.
//!
//! 将展开后的变体缩减为本次调用实际运行的部分：先应用 `--filter` 选择，
//! 当矩阵被拆分到多台 CI 机器上时，再取分配给本运行器的部分。

use crate::core::config::Axis;
use crate::core::error::ConfigError;
use crate::core::models::Variant;

/// Represents a complete execution plan for a matrix.
/// 表示矩阵的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// Variants to run, in expansion order.
    /// 要运行的变体，按展开顺序排列。
    pub variants: Vec<Variant>,
    /// How many variants the filter removed.
    /// 被过滤器移除的变体数量。
    pub filtered_count: usize,
    /// Whether the variants are distributed across multiple runners (CI environment).
    /// 变体是否分布在多个运行器上（CI 环境）。
    pub is_distributed: bool,
}

/// Creates the execution plan.
///
/// # Arguments
/// * `variants` - Every expanded variant
/// * `axes` - The declared axes, used to validate `filters`
/// * `filters` - Axis values to keep; empty keeps everything
/// * `total_runners` - Optional total number of runners for distributed execution
/// * `runner_index` - Optional index of this runner (0-based)
///
/// # Errors
/// A filter naming no declared value, only one of the two shard arguments, or
/// an index outside `0..total`.
pub fn plan_execution(
    variants: Vec<Variant>,
    axes: &[Axis],
    filters: &[String],
    total_runners: Option<usize>,
    runner_index: Option<usize>,
) -> Result<ExecutionPlan, ConfigError> {
    for filter in filters {
        if !axes.iter().any(|axis| axis.values.contains(filter)) {
            return Err(ConfigError::UnknownFilter(filter.clone()));
        }
    }

    let total = variants.len();
    let selected: Vec<_> = if filters.is_empty() {
        variants
    } else {
        variants
            .into_iter()
            .filter(|v| filters.iter().any(|f| v.selects(f)))
            .collect()
    };
    let filtered_count = total - selected.len();

    let (variants, is_distributed) = match (total_runners, runner_index) {
        (Some(total), Some(index)) => {
            if total == 0 || index >= total {
                return Err(ConfigError::InvalidShard { index, total });
            }
            let shard = selected
                .into_iter()
                .enumerate()
                .filter(|(i, _)| i % total == index)
                .map(|(_, variant)| variant)
                .collect();
            (shard, true)
        }
        (None, None) => (selected, false),
        _ => return Err(ConfigError::IncompleteShard),
    };

    Ok(ExecutionPlan {
        variants,
        filtered_count,
        is_distributed,
    })
}
