//! # Core Module / 核心模块
//!
//! The orchestration core: the matrix document and variant model, expansion,
//! cache keys, job execution, planning, scheduling and aggregation.
//!
//! 编排核心：矩阵文档与变体模型、展开、缓存键、作业执行、计划、调度和汇总。

pub mod cache_key;
pub mod config;
pub mod error;
pub mod execution;
pub mod expander;
pub mod models;
pub mod planner;
pub mod scheduler;

// Re-exports
pub use config::MatrixDocument;
pub use execution::JobRunner;
pub use expander::expand;
pub use models::{JobResult, Report, Variant};
pub use scheduler::run_all;
