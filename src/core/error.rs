//! # Error Taxonomy Module / 错误分类模块
//!
//! Four error families with four different blast radii:
//!
//! - [`ConfigError`]: the matrix document is malformed or incomplete. Fatal to
//!   the whole invocation, raised before anything is scheduled.
//! - [`InputError`]: a variant is missing a required input (the lock artifact).
//!   Fatal to that variant only.
//! - [`StepError`]: an external command of a step failed. Fatal to that variant,
//!   recorded in its `JobResult`.
//! - [`CacheError`]: restoring or persisting a cache entry failed. Logged, never
//!   fatal.
//!
//! 四类错误，影响范围各不相同：配置错误终止整个运行；输入错误和步骤错误仅对
//! 受影响的变体致命；缓存错误只记录日志，从不致命。

use std::path::PathBuf;
use thiserror::Error;

/// The matrix definition cannot be turned into a schedulable set of variants.
/// 矩阵定义无法转换为可调度的变体集合。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read matrix document `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse matrix document `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("the matrix declares no axes")]
    NoAxes,

    #[error("axis `{0}` declares no values")]
    EmptyAxis(String),

    #[error("axis `{0}` is declared more than once")]
    DuplicateAxis(String),

    #[error("value `{value}` appears more than once (axis `{axis}`)")]
    DuplicateValue { axis: String, value: String },

    #[error("axis `{axis}` value `{value}` has no override entry")]
    MissingOverride { axis: String, value: String },

    #[error("two variants resolve to the same id `{0}`")]
    DuplicateVariant(String),

    #[error("step `{name}` is invalid: {reason}")]
    InvalidStep { name: String, reason: String },

    #[error("filter `{0}` does not name any declared axis value")]
    UnknownFilter(String),

    #[error("invalid shard: runner index {index} must be less than total runners {total}")]
    InvalidShard { index: usize, total: usize },

    #[error("both --total-runners and --runner-index must be provided")]
    IncompleteShard,

    #[error("failed to read lock artifact `{path}`: {source}")]
    LockRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A variant asked for something that was not supplied.
/// 变体请求了未提供的输入。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("variant `{variant}` requested caching but no lock content is available")]
    MissingLockContent { variant: String },
}

/// A step's external command could not run or exited unsuccessfully.
/// 步骤的外部命令无法运行或以失败状态退出。
#[derive(Debug, Error)]
pub enum StepError {
    #[error("step `{step}`: command line is empty")]
    EmptyCommand { step: String },

    #[error("step `{step}`: cannot parse command line `{command}`")]
    Unparsable { step: String, command: String },

    #[error("step `{step}`: failed to launch `{program}`: {source}")]
    Spawn {
        step: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("step `{step}`: `{program}` exited with {}", describe_exit(.code))]
    NonZeroExit {
        step: String,
        program: String,
        code: Option<i32>,
        /// Captured output of the failed command.
        output: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Restoring or saving a cache entry failed. Callers log it and move on.
/// 恢复或保存缓存条目失败。调用方记录日志后继续。
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store I/O failed for `{key}`: {source}")]
    Store {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cache path `{path}` could not be accessed: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache worker failed: {0}")]
    Worker(String),
}
