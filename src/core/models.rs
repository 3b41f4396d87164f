//! # Data Models Module / 数据模型模块
//!
//! This module defines the values that flow through the orchestrator: the
//! fully-resolved job [`Variant`] with its conditional [`Step`]s, and the
//! [`JobResult`] / [`Report`] records produced once jobs finish.
//!
//! 此模块定义了在编排器中流转的值：完全解析的作业 [`Variant`] 及其条件步骤
//! [`Step`]，以及作业完成后产生的 [`JobResult`] / [`Report`] 记录。

use crate::infra::t;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One selected `(axis, value)` pair of a variant.
/// 变体中选定的一个 `(轴, 值)` 对。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisValue {
    pub axis: String,
    pub value: String,
}

/// A fully-resolved job: one combination of axis values with every override
/// merged in. Produced by the expander and never mutated afterwards.
///
/// 一个完全解析的作业：轴值的一种组合，且所有覆盖项均已合并。
/// 由展开器生成，之后不再修改。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Identifier built from the selected axis values, unique within a matrix.
    /// 由选定轴值构成的标识符，在矩阵内唯一。
    pub id: String,
    /// The selected values, in axis declaration order.
    /// 选定的值，按轴的声明顺序排列。
    pub axis_values: Vec<AxisValue>,
    /// Operating-system identifier the variant targets (e.g. "linux").
    /// 变体目标操作系统标识符（例如 "linux"）。
    pub os: String,
    /// Toolchain selector, if the variant pins one.
    /// 工具链选择器（如果变体指定了）。
    pub toolchain: Option<String>,
    /// The test command.
    /// 测试命令。
    pub command: String,
    /// Extra argument string appended to the test command.
    /// 附加到测试命令的额外参数字符串。
    pub args: String,
    /// Environment overrides; these win over the ambient environment.
    /// 环境变量覆盖；优先于外部环境。
    pub env: BTreeMap<String, String>,
    /// Ordered steps executed for this variant.
    /// 为该变体按顺序执行的步骤。
    pub steps: Vec<Step>,
}

impl Variant {
    /// Looks up a field by name for condition evaluation.
    ///
    /// Resolution order: the built-in fields (`id`, `os`, `toolchain`, `args`,
    /// `command`), then axis names, then environment overrides.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(&self.id),
            "os" => Some(&self.os),
            "toolchain" => self.toolchain.as_deref(),
            "args" => Some(&self.args),
            "command" => Some(&self.command),
            _ => self
                .axis_values
                .iter()
                .find(|av| av.axis == name)
                .map(|av| av.value.as_str())
                .or_else(|| self.env.get(name).map(String::as_str)),
        }
    }

    /// Returns `true` if this variant selected `value` on any axis.
    pub fn selects(&self, value: &str) -> bool {
        self.axis_values.iter().any(|av| av.value == value)
    }

    /// Whether any cache step of this variant will actually run.
    /// 该变体的缓存步骤是否会实际执行。
    pub fn requests_cache(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.action.is_cache() && step.condition.evaluate(self))
    }

    /// The `MATRIX_*` variables describing this variant to its commands.
    /// 向命令描述该变体的 `MATRIX_*` 环境变量。
    pub fn metadata_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("MATRIX_VARIANT".to_string(), self.id.clone());
        env.insert("MATRIX_OS".to_string(), self.os.clone());
        if let Some(toolchain) = &self.toolchain {
            env.insert("MATRIX_TOOLCHAIN".to_string(), toolchain.clone());
        }
        for av in &self.axis_values {
            let name = av
                .axis
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect::<String>();
            env.insert(format!("MATRIX_{name}"), av.value.clone());
        }
        env
    }
}

/// Predicate over a variant's fields deciding whether a step runs.
/// 基于变体字段的谓词，用于决定某个步骤是否执行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// The field exists and equals the value.
    Equals { field: String, value: String },
    /// The field exists (for `toolchain`: the variant pins one).
    Present { field: String },
    All(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn evaluate(&self, variant: &Variant) -> bool {
        match self {
            Condition::Always => true,
            Condition::Equals { field, value } => variant.field(field) == Some(value.as_str()),
            Condition::Present { field } => variant.field(field).is_some(),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(variant)),
            Condition::Not(inner) => !inner.evaluate(variant),
        }
    }

    /// Builds a conjunction of field equalities, collapsing trivial cases.
    pub fn all_equal(fields: &BTreeMap<String, String>) -> Self {
        let mut conditions: Vec<Condition> = fields
            .iter()
            .map(|(field, value)| Condition::Equals {
                field: field.clone(),
                value: value.clone(),
            })
            .collect();
        match conditions.len() {
            0 => Condition::Always,
            1 => conditions.remove(0),
            _ => Condition::All(conditions),
        }
    }
}

/// What a step does. A closed set: the runner matches on it exhaustively.
/// 步骤执行的操作。这是一个封闭集合：运行器对其进行穷尽匹配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Restore the cache entry for `path` (relative to the job working dir).
    CacheRestore { path: PathBuf },
    /// Persist `path` back into the cache.
    CacheSave { path: PathBuf },
    /// Run an external dependency-install command. Failure is fatal.
    Install { command: String },
    /// Install the variant's toolchain. Failure is fatal.
    InstallToolchain,
    /// Run the variant's test command.
    RunCommand,
}

impl Action {
    pub fn is_cache(&self) -> bool {
        matches!(self, Action::CacheRestore { .. } | Action::CacheSave { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::CacheRestore { .. } => "cache-restore",
            Action::CacheSave { .. } => "cache-save",
            Action::Install { .. } => "install",
            Action::InstallToolchain => "install-toolchain",
            Action::RunCommand => "run-command",
        }
    }
}

/// One unit of work within a variant.
/// 变体中的一个工作单元。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub condition: Condition,
    pub action: Action,
}

/// Why a job failed.
/// 作业失败的原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// A required input (the lock artifact) was missing.
    /// 缺少必需的输入（锁文件）。
    MissingInput,
    /// A dependency-install step failed.
    /// 依赖安装步骤失败。
    Install,
    /// The toolchain could not be installed.
    /// 工具链安装失败。
    Toolchain,
    /// The test command exited unsuccessfully.
    /// 测试命令执行失败。
    Command,
    /// The job's working directory could not be prepared.
    /// 无法准备作业的工作目录。
    Workspace,
    /// The job task itself crashed.
    /// 作业任务本身崩溃。
    Internal,
}

/// Final status of one job.
/// 单个作业的最终状态。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Passed,
    Failed { reason: FailureReason },
    Cancelled,
}

impl JobStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, JobStatus::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobStatus::Failed { .. })
    }

    /// Localized status label for display.
    /// 用于显示的本地化状态标签。
    pub fn label(&self, locale: &str) -> String {
        match self {
            JobStatus::Passed => t!("report.status_passed", locale = locale).to_string(),
            JobStatus::Failed { .. } => t!("report.status_failed", locale = locale).to_string(),
            JobStatus::Cancelled => t!("report.status_cancelled", locale = locale).to_string(),
        }
    }

    /// CSS class used by the HTML report.
    pub fn css_class(&self) -> &'static str {
        match self {
            JobStatus::Passed => "status-Passed",
            JobStatus::Failed { .. } => "status-Failed",
            JobStatus::Cancelled => "status-Cancelled",
        }
    }
}

/// What happened to a single step.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Ran,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub outcome: StepOutcome,
    #[serde(rename = "duration_secs", serialize_with = "serialize_secs")]
    pub duration: Duration,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Outcome of running one variant. Read-only once produced.
/// 运行单个变体的结果。生成后只读。
#[derive(Debug, Clone)]
pub struct JobResult {
    pub variant_id: String,
    pub status: JobStatus,
    /// Captured diagnostic stream: step headers plus combined command output.
    /// 捕获的诊断流：步骤标题加上合并的命令输出。
    pub output: String,
    pub duration: Duration,
    pub steps: Vec<StepRecord>,
}

impl JobResult {
    /// A result for a variant that never started.
    pub fn cancelled(variant_id: impl Into<String>) -> Self {
        Self {
            variant_id: variant_id.into(),
            status: JobStatus::Cancelled,
            output: String::new(),
            duration: Duration::ZERO,
            steps: Vec::new(),
        }
    }

    /// The last `lines` lines of the diagnostic stream.
    /// 诊断流的最后 `lines` 行。
    pub fn output_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.output.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:.2?})", self.variant_id, self.status, self.duration)
    }
}

/// Aggregated verdict of a whole run.
/// 整个运行的汇总结论。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Passed,
    Failed,
}

/// The final report: overall verdict plus every job result in variant order.
/// 最终报告：总体结论以及按变体顺序排列的每个作业结果。
#[derive(Debug, Clone)]
pub struct Report {
    pub status: OverallStatus,
    pub results: Vec<JobResult>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.status == OverallStatus::Passed
    }

    pub fn count_passed(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_passed()).count()
    }

    pub fn count_failed(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_failed()).count()
    }

    pub fn count_cancelled(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == JobStatus::Cancelled)
            .count()
    }
}
