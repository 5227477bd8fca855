//! Fixed-width console table

use super::{fixed, report_error, GroupRow, ReportWriter};
use crate::experiment::RunReport;
use crate::Result;
use std::io::Write;

/// Writes a summary table to any [`Write`] sink (stdout, a buffer, a file).
#[derive(Debug)]
pub struct ConsoleReport<W: Write> {
    out: W,
}

impl<W: Write> ConsoleReport<W> {
    /// Table writer over `out`.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Give the sink back.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, report: &RunReport) -> std::io::Result<()> {
        let record = &report.record;
        let out = &mut self.out;
        writeln!(out, "{}", record.title())?;
        writeln!(
            out,
            "{} | {} folds x {} repetitions | seeds {:?} | stratified {} | discretized {}",
            record.platform(),
            record.folds(),
            record.repetitions(),
            record.seeds(),
            record.stratified(),
            record.discretization().unwrap_or("no"),
        )?;
        writeln!(
            out,
            "{:<16} {:<16} {:<24} {:>7} {:>17} {:>9} {:>9} {:<8}",
            "Dataset", "Classifier", "Hyperparameters", "Folds", "Accuracy", "Macro F1", "AUC", "Status"
        )?;
        writeln!(out, "{}", "=".repeat(113))?;
        for group in &report.groups {
            let row = GroupRow::of(group);
            let accuracy = match (row.accuracy, row.accuracy_std) {
                (Some(mean), Some(std)) => format!("{mean:.4} ± {std:.4}"),
                _ => fixed(None),
            };
            writeln!(
                out,
                "{:<16} {:<16} {:<24} {:>7} {:>17} {:>9} {:>9} {:<8}",
                truncate(&group.key.dataset, 16),
                truncate(&group.key.classifier, 16),
                truncate(&group.key.params.to_string(), 24),
                format!("{}/{}", group.succeeded_folds, group.succeeded_folds + group.failed_folds),
                accuracy,
                fixed(row.macro_f1),
                fixed(row.auc),
                group.status_label(),
            )?;
            if group.group_failed {
                if let Some(reason) = group.failure_reason() {
                    writeln!(out, "    reason: {reason}")?;
                }
            }
            for note in &group.notes {
                writeln!(out, "    note: {note}")?;
            }
        }
        writeln!(out, "{}", "=".repeat(113))?;
        writeln!(
            out,
            "{} trials, {} failed, {} skipped | status {}{}",
            report.trials_total,
            report.trials_failed,
            report.trials_skipped,
            record.status().label(),
            record
                .duration_secs()
                .map(|secs| format!(" | {secs:.2} s"))
                .unwrap_or_default(),
        )?;
        if report.cancelled {
            writeln!(out, "run cancelled: groups with skipped trials are not listed")?;
        }
        out.flush()
    }
}

impl<W: Write> ReportWriter for ConsoleReport<W> {
    fn write(&mut self, report: &RunReport) -> Result<()> {
        self.render(report).map_err(|e| report_error("console", e))
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("iris", 16), "iris");
        assert_eq!(truncate("abcdefgh", 4), "abc…");
    }
}
