//! Report writers
//!
//! Every writer consumes a finished [`RunReport`] and writes one record per
//! group, in the order the groups were declared. Failed groups are written
//! with `n/a` in place of every metric (never `0`) together with the
//! failure reason.
//!
//! Writer failures are fatal for the run and surface as [`Error::Report`].

mod console;
mod excel;
mod json;

pub use console::ConsoleReport;
pub use excel::ExcelReportWriter;
pub use json::JsonReportWriter;

use crate::experiment::{AggregatedResult, RunReport};
use crate::metrics::{ACCURACY, AUC, MACRO_F1};
use crate::{Error, Result};

/// Text written where a metric is unavailable.
pub const NOT_AVAILABLE: &str = "n/a";

/// Destination for a run report.
pub trait ReportWriter {
    /// Write the whole report, releasing the destination on every path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Report`] if the destination cannot be written.
    fn write(&mut self, report: &RunReport) -> Result<()>;
}

/// Metric columns shared by the tabular writers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GroupRow {
    accuracy: Option<f64>,
    accuracy_std: Option<f64>,
    macro_f1: Option<f64>,
    macro_f1_std: Option<f64>,
    auc: Option<f64>,
}

impl GroupRow {
    pub(crate) fn of(group: &AggregatedResult) -> Self {
        let mean = |name: &str| group.metric(name).map(|s| s.mean);
        let std = |name: &str| group.metric(name).map(crate::experiment::MetricSummary::std_dev);
        Self {
            accuracy: mean(ACCURACY),
            accuracy_std: std(ACCURACY),
            macro_f1: mean(MACRO_F1),
            macro_f1_std: std(MACRO_F1),
            auc: mean(AUC),
        }
    }
}

/// `value` to four decimals, or [`NOT_AVAILABLE`].
pub(crate) fn fixed(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.4}"))
}

pub(crate) fn report_error(destination: &str, e: impl std::fmt::Display) -> Error {
    Error::Report(format!("{destination}: {e}"))
}
