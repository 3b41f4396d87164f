//! # Infrastructure Module / 基础设施模块
//!
//! The execution collaborators the core depends on only through traits:
//! process launching, toolchain installation, cache storage, plus the
//! per-job working directories.
//!
//! 核心仅通过 trait 依赖的执行协作者：进程启动、工具链安装、缓存存储，
//! 以及每个作业的工作目录。

pub mod cache;
pub mod command;
pub mod fs;
pub mod toolchain;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
