//! # Run Matrix Library / Run Matrix 库
//!
//! A declarative build-matrix runner: a TOML document names axes, their values
//! and per-value overrides; the runner expands their cartesian product into
//! variants and runs each one as an independent job (install, toolchain,
//! dependency cache, test command), then aggregates a single verdict.
//!
//! 声明式构建矩阵运行器：TOML 文档声明轴、轴值以及每个值的覆盖片段；
//! 运行器将它们的笛卡尔积展开为变体，并把每个变体作为独立作业运行
//! （安装、工具链、依赖缓存、测试命令），最后汇总为单一结论。
//!
//! ## Modules / 模块
//!
//! - `core` - Document model, expansion, cache keys, job execution and scheduling
//! - `infra` - Process launching, toolchain installation, cache storage, working directories
//! - `reporting` - Console, JSON and HTML renderings of the aggregated report
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 文档模型、展开、缓存键、作业执行和调度
//! - `infra` - 进程启动、工具链安装、缓存存储、工作目录
//! - `reporting` - 汇总报告的控制台、JSON 和 HTML 呈现
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use crate::core::config;
pub use crate::core::execution;
pub use crate::core::models;

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// Tries the full locale first (e.g. "zh-CN"), then the language part
/// (e.g. "en" from "en-US"), and finally falls back to "en".
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    let available_locales = rust_i18n::available_locales!();

    let lang = if available_locales.contains(&locale.as_str()) {
        &locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    };

    rust_i18n::set_locale(lang);
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
