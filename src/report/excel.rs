//! Spreadsheet report
//!
//! Layout of the results sheet:
//!
//! ```text
//! row 0   title, platform, run id
//! row 1   folds × repetitions, seeds, stratified, discretization
//! row 2   duration, status, trial counts
//! row 3   cancellation notice (cancelled runs only)
//! row 5   column headers
//! row 6.. one row per group, declared order
//! ```
//!
//! A second sheet, `Failures`, lists every failure record.

use super::{report_error, GroupRow, ReportWriter, NOT_AVAILABLE};
use crate::experiment::{AggregatedResult, FailureRecord, RunReport};
use crate::Result;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

const HEADER_ROWS: u32 = 5;
const FAILURES_SHEET: &str = "Failures";
const MAX_SHEET_NAME: usize = 31;

const COLUMNS: [(&str, f64); 20] = [
    ("Dataset", 22.0),
    ("Classifier", 16.0),
    ("Hyperparameters", 24.0),
    ("Samples", 9.0),
    ("Features", 9.0),
    ("Classes", 8.0),
    ("Succeeded", 10.0),
    ("Failed", 8.0),
    ("Accuracy", 11.0),
    ("Accuracy Std.", 12.0),
    ("Macro F1", 11.0),
    ("Macro F1 Std.", 12.0),
    ("AUC", 11.0),
    ("Nodes", 9.0),
    ("Edges", 9.0),
    ("States", 9.0),
    ("Train Time", 11.0),
    ("Test Time", 11.0),
    ("Status", 9.0),
    ("Failure Reason", 48.0),
];

/// Writes the report to an `.xlsx` workbook.
#[derive(Debug, Clone)]
pub struct ExcelReportWriter {
    path: PathBuf,
}

impl ExcelReportWriter {
    /// Writer targeting `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Destination file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportWriter for ExcelReportWriter {
    fn write(&mut self, report: &RunReport) -> Result<()> {
        let destination = self.path.display().to_string();
        let mut workbook = Workbook::new();
        let filled = fill(&mut workbook, report);
        // Saved even when filling failed, so a partial workbook is left behind.
        let saved = workbook.save(&self.path);
        if let Err(e) = &filled {
            error!(destination = %destination, error = %e, "report incomplete");
        }
        filled.map_err(|e| report_error(&destination, e))?;
        saved.map_err(|e| report_error(&destination, e))?;
        debug!(destination = %destination, groups = report.groups.len(), "workbook saved");
        Ok(())
    }
}

struct Formats {
    title: Format,
    header: Format,
    text: Format,
    integer: Format,
    score: Format,
    time: Format,
    missing: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            title: Format::new().set_bold().set_font_size(14),
            header: Format::new().set_bold().set_align(FormatAlign::Center).set_text_wrap(),
            text: Format::new(),
            integer: Format::new().set_num_format("#,##0"),
            score: Format::new().set_num_format("0.0000"),
            time: Format::new().set_num_format("0.000"),
            missing: Format::new().set_align(FormatAlign::Center).set_italic(),
        }
    }
}

fn fill(workbook: &mut Workbook, report: &RunReport) -> std::result::Result<(), XlsxError> {
    let formats = Formats::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(report.record.title()))?;
    header(sheet, report, &formats)?;
    for (col, (name, width)) in (0u16..).zip(COLUMNS) {
        sheet.set_column_width(col, width)?;
        sheet.write_string_with_format(HEADER_ROWS, col, name, &formats.header)?;
    }
    sheet.set_freeze_panes(HEADER_ROWS + 1, 1)?;
    for (row, group) in (HEADER_ROWS + 1..).zip(&report.groups) {
        group_row(sheet, row, group, &formats)?;
    }

    let failures: Vec<&FailureRecord> = report.failures().collect();
    let sheet = workbook.add_worksheet();
    sheet.set_name(FAILURES_SHEET)?;
    failure_rows(sheet, &failures, &formats)?;
    Ok(())
}

fn header(sheet: &mut Worksheet, report: &RunReport, formats: &Formats) -> std::result::Result<(), XlsxError> {
    let record = &report.record;
    let seeds: Vec<String> = record.seeds().iter().map(ToString::to_string).collect();
    sheet.merge_range(0, 0, 0, 5, record.title(), &formats.title)?;
    sheet.write_string(0, 6, format!("Platform: {}", record.platform()))?;
    sheet.write_string(0, 9, format!("Run: {}", record.run_id()))?;
    sheet.write_string(
        1,
        0,
        format!(
            "{} folds × {} repetitions cross validation",
            record.folds(),
            record.repetitions()
        ),
    )?;
    sheet.write_string(1, 6, format!("Random seeds: {}", seeds.join(", ")))?;
    sheet.write_string(
        1,
        9,
        format!("Stratified: {}", if record.stratified() { "True" } else { "False" }),
    )?;
    sheet.write_string(
        1,
        12,
        format!("Discretized: {}", record.discretization().unwrap_or("False")),
    )?;
    let duration = record
        .duration_secs()
        .map_or_else(|| NOT_AVAILABLE.to_string(), |secs| format!("{secs:.2} s"));
    sheet.write_string(2, 0, format!("Execution time: {duration}"))?;
    sheet.write_string(2, 6, format!("Status: {}", record.status().label()))?;
    sheet.write_string(
        2,
        9,
        format!(
            "Trials: {} total, {} failed, {} skipped",
            report.trials_total, report.trials_failed, report.trials_skipped
        ),
    )?;
    if report.cancelled {
        sheet.write_string(3, 0, "Run cancelled: only fully resolved groups are listed")?;
    }
    Ok(())
}

fn group_row(
    sheet: &mut Worksheet,
    row: u32,
    group: &AggregatedResult,
    formats: &Formats,
) -> std::result::Result<(), XlsxError> {
    let key = &group.key;
    sheet.write_string_with_format(row, 0, &key.dataset, &formats.text)?;
    sheet.write_string_with_format(row, 1, &key.classifier, &formats.text)?;
    sheet.write_string_with_format(row, 2, key.params.to_json(), &formats.text)?;

    let shape = group.shape;
    let counts = [
        shape.map(|s| s.samples),
        shape.map(|s| s.features),
        shape.map(|s| s.classes),
        Some(group.succeeded_folds),
        Some(group.failed_folds),
    ];
    for (col, count) in (3u16..).zip(counts) {
        #[allow(clippy::cast_precision_loss)]
        let value = count.map(|c| c as f64);
        number(sheet, row, col, value, &formats.integer, formats)?;
    }

    let metrics = GroupRow::of(group);
    let scores = [
        metrics.accuracy,
        metrics.accuracy_std,
        metrics.macro_f1,
        metrics.macro_f1_std,
        metrics.auc,
    ];
    for (col, score) in (8u16..).zip(scores) {
        number(sheet, row, col, score, &formats.score, formats)?;
    }

    let complexity = group.complexity;
    let sizes = [
        complexity.map(|c| c.nodes),
        complexity.map(|c| c.edges),
        complexity.map(|c| c.states),
    ];
    for (col, size) in (13u16..).zip(sizes) {
        number(sheet, row, col, size, &formats.score, formats)?;
    }

    let ran = group.succeeded_folds + group.failed_folds > 0 && group.shape.is_some();
    let timing = |secs: f64| (ran && !group.group_failed).then_some(secs);
    number(sheet, row, 16, timing(group.timings.train_secs), &formats.time, formats)?;
    number(sheet, row, 17, timing(group.timings.test_secs), &formats.time, formats)?;

    sheet.write_string(row, 18, group.status_label())?;
    if let Some(reason) = group.failure_reason() {
        sheet.write_string(row, 19, reason)?;
    } else if !group.notes.is_empty() {
        sheet.write_string(row, 19, group.notes.join("; "))?;
    }
    Ok(())
}

fn number(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<f64>,
    format: &Format,
    formats: &Formats,
) -> std::result::Result<(), XlsxError> {
    match value {
        Some(v) => sheet.write_number_with_format(row, col, v, format)?,
        None => sheet.write_string_with_format(row, col, NOT_AVAILABLE, &formats.missing)?,
    };
    Ok(())
}

fn failure_rows(
    sheet: &mut Worksheet,
    failures: &[&FailureRecord],
    formats: &Formats,
) -> std::result::Result<(), XlsxError> {
    let head = ["Dataset", "Classifier", "Hyperparameters", "Repetition", "Fold", "Kind", "Message"];
    let widths = [22.0, 16.0, 24.0, 11.0, 8.0, 20.0, 80.0];
    for (col, (name, width)) in (0u16..).zip(head.into_iter().zip(widths)) {
        sheet.set_column_width(col, width)?;
        sheet.write_string_with_format(0, col, name, &formats.header)?;
    }
    for (row, failure) in (1u32..).zip(failures) {
        sheet.write_string(row, 0, &failure.dataset)?;
        sheet.write_string(row, 1, &failure.classifier)?;
        sheet.write_string(row, 2, &failure.hyperparameters)?;
        sheet.write_string(row, 3, position(failure.repetition))?;
        sheet.write_string(row, 4, position(failure.fold))?;
        sheet.write_string(row, 5, failure.kind.label())?;
        sheet.write_string(row, 6, &failure.message)?;
    }
    Ok(())
}

fn position(index: Option<usize>) -> String {
    index.map_or_else(|| "all".to_string(), |i| i.to_string())
}

/// Sheet names are limited to 31 characters and may not contain `[]:*?/\`.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(MAX_SHEET_NAME)
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').to_string();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case(FAILURES_SHEET) {
        "Results".to_string()
    } else {
        cleaned
    }
}
