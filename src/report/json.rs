//! JSON report

use super::{report_error, ReportWriter};
use crate::experiment::RunReport;
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes the full report, trials included, as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    path: PathBuf,
}

impl JsonReportWriter {
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

    /// Read back a report written by this writer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Report`] if the file cannot be read or parsed.
    pub fn read(path: impl AsRef<Path>) -> Result<RunReport> {
        let path = path.as_ref();
        let destination = path.display().to_string();
        let file = File::open(path).map_err(|e| report_error(&destination, e))?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| report_error(&destination, e))
    }
}

impl ReportWriter for JsonReportWriter {
    fn write(&mut self, report: &RunReport) -> Result<()> {
        let destination = self.path.display().to_string();
        let file = File::create(&self.path).map_err(|e| report_error(&destination, e))?;
        let mut out = BufWriter::new(file);
        let written = serde_json::to_writer_pretty(&mut out, report).map_err(|e| report_error(&destination, e));
        // Flush on every path; the first error wins.
        let flushed = out.flush().map_err(|e| report_error(&destination, e));
        written.and(flushed)
    }
}
