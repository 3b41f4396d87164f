//! # Reporting Module / 报告模块
//!
//! This module renders the aggregated report: a colorful console summary, a
//! machine-readable JSON document, and a standalone HTML page.
//!
//! 此模块负责呈现汇总报告：彩色控制台摘要、机器可读的 JSON 文档以及
//! 独立的 HTML 页面。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
pub use json::write_json_report;
