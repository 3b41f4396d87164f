//! # JSON Reporting Module / JSON 报告模块
//!
//! Machine-readable report: one record per variant with its status, duration
//! and the tail of its diagnostic stream.
//!
//! 机器可读的报告：每个变体一条记录，包含状态、耗时以及诊断输出的末尾部分。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::core::models::{JobStatus, OverallStatus, Report, StepRecord};

/// Number of trailing output lines kept per record.
pub const DIAGNOSTIC_TAIL_LINES: usize = 40;

#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub status: OverallStatus,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub results: Vec<ReportRecord<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ReportRecord<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub status: JobStatus,
    pub duration_secs: f64,
    pub steps: &'a [StepRecord],
    pub diagnostic_tail: String,
}

impl<'a> ReportDocument<'a> {
    pub fn from_report(report: &'a Report) -> Self {
        Self {
            status: report.status,
            started_at: report.started_at,
            duration_secs: report.duration.as_secs_f64(),
            passed: report.count_passed(),
            failed: report.count_failed(),
            cancelled: report.count_cancelled(),
            results: report
                .results
                .iter()
                .map(|r| ReportRecord {
                    id: &r.variant_id,
                    status: r.status,
                    duration_secs: r.duration.as_secs_f64(),
                    steps: &r.steps,
                    diagnostic_tail: r.output_tail(DIAGNOSTIC_TAIL_LINES),
                })
                .collect(),
        }
    }
}

pub fn render_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(&ReportDocument::from_report(report))
        .context("Failed to serialize report")
}

/// Writes the JSON report to `output_path`.
/// 将 JSON 报告写入 `output_path`。
pub fn write_json_report(report: &Report, output_path: &Path) -> Result<()> {
    let json = render_json(report)?;
    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))
}
