//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders a self-contained HTML page with the run statistics and a results
//! table; the output of each job that did not pass is folded under a
//! `<details>` element.
//!
//! 生成一个独立的 HTML 页面，包含运行统计和结果表格；每个未通过作业的输出
//! 折叠在 `<details>` 元素中。

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::core::models::Report;
use crate::infra::t;
use crate::reporting::json::DIAGNOSTIC_TAIL_LINES;

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", sans-serif; margin: 2rem; color: #222; }
.summary-container { display: flex; gap: 1.5rem; margin-bottom: 1.5rem; }
.summary-item { display: flex; flex-direction: column; align-items: center; }
.count { font-size: 1.8rem; font-weight: 600; }
.passed-text { color: #1a7f37; } .failed-text { color: #cf222e; } .cancelled-text { color: #6e7781; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid #d0d7de; padding: 0.4rem 0.6rem; text-align: left; vertical-align: top; }
.status-cell { display: inline-block; padding: 0.1rem 0.5rem; border-radius: 4px; color: #fff; }
.status-Passed { background: #1a7f37; } .status-Failed { background: #cf222e; } .status-Cancelled { background: #6e7781; }
.duration-cell { text-align: right; white-space: nowrap; }
pre.output-content { background: #f6f8fa; padding: 0.6rem; overflow-x: auto; max-height: 30rem; }
"#;

/// Builds the report page.
/// 构建报告页面。
pub fn render_html(report: &Report, locale: &str) -> Markup {
    let title = t!("html_report.title", locale = locale).to_string();
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (title) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (title) }
                p { (t!("html_report.started_at", locale = locale, time = report.started_at.to_rfc3339()).to_string()) }
                div class="summary-container" {
                    (summary_item(report.results.len(), "", &t!("html_report.summary.total", locale = locale)))
                    (summary_item(report.count_passed(), "passed-text", &t!("html_report.summary.passed", locale = locale)))
                    (summary_item(report.count_failed(), "failed-text", &t!("html_report.summary.failed", locale = locale)))
                    (summary_item(report.count_cancelled(), "cancelled-text", &t!("html_report.summary.cancelled", locale = locale)))
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.header.name", locale = locale).to_string()) }
                            th { (t!("html_report.table.header.status", locale = locale).to_string()) }
                            th class="duration-cell" { (t!("html_report.table.header.duration", locale = locale).to_string()) }
                        }
                    }
                    tbody {
                        @for result in &report.results {
                            tr {
                                td {
                                    (result.variant_id)
                                    @if !result.status.is_passed() && !result.output.is_empty() {
                                        details {
                                            summary { (t!("html_report.toggle_output", locale = locale).to_string()) }
                                            pre class="output-content" { (result.output_tail(DIAGNOSTIC_TAIL_LINES)) }
                                        }
                                    }
                                }
                                td {
                                    div class=(format!("status-cell {}", result.status.css_class())) {
                                        (result.status.label(locale))
                                    }
                                }
                                td class="duration-cell" { (format!("{:.2}s", result.duration.as_secs_f64())) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn summary_item(count: usize, class: &str, label: &str) -> Markup {
    html! {
        div class="summary-item" {
            span class=(format!("count {class}")) { (count) }
            span class="label" { (label) }
        }
    }
}

/// Writes the HTML report to `output_path`.
///
/// # Errors
/// This function will return an error if the output file cannot be written.
pub fn generate_html_report(report: &Report, output_path: &Path, locale: &str) -> Result<()> {
    let page = render_html(report, locale).into_string();
    fs::write(output_path, page)
        .with_context(|| format!("Failed to write HTML report to {}", output_path.display()))
}
