//! Error types for bayesbench
//!
//! The taxonomy separates run-fatal errors (configuration, report sink) from
//! errors that only invalidate one dataset (missing or malformed source) and
//! errors that only invalidate one trial (training, inference, time budget).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// bayesbench error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed experiment description (fatal, raised before any trial runs)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Dataset reference could not be resolved by the provider
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    /// Dataset source is malformed or violates the dataset invariants
    #[error("Schema error: {0}")]
    Schema(String),

    /// Training data violates a classifier backend precondition
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Classifier backend failed while fitting a model
    #[error("Training failure: {0}")]
    Training(String),

    /// Classifier backend failed while predicting
    #[error("Inference failure: {0}")]
    Inference(String),

    /// Trial exceeded its configured wall-clock budget
    #[error("Time budget exceeded: {elapsed_ms} ms elapsed, budget {budget_ms} ms")]
    TimeBudgetExceeded {
        /// Milliseconds spent when the budget check fired
        elapsed_ms: u128,
        /// Configured budget in milliseconds
        budget_ms: u128,
    },

    /// Label sequences handed to the metric evaluator differ in length
    #[error("Shape mismatch: expected {expected} labels, got {actual}\nThis indicates classifier adapter misuse. Please report this issue.")]
    ShapeMismatch {
        /// Length of the ground-truth sequence
        expected: usize,
        /// Length of the predicted sequence
        actual: usize,
    },

    /// A label code falls outside the label space
    #[error("Label {label} outside label space of {classes} classes")]
    LabelOutOfRange {
        /// Offending label code
        label: u32,
        /// Size of the label space
        classes: usize,
    },

    /// Report sink failure (fatal)
    #[error("Report error: {0}")]
    Report(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow/Parquet error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet encoding error
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Classification of a trial-level failure, recorded in failure records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Model fitting failed (including backend schema violations)
    Training,
    /// Prediction failed
    Inference,
    /// Trial ran past its time budget
    TimeBudgetExceeded,
    /// Backend panicked; the panic was contained to the trial
    Panic,
    /// The group's dataset could not be loaded
    DatasetUnavailable,
    /// Classifier/dataset combination rejected before any fold ran
    Unsupported,
    /// Metric evaluator contract violation (adapter misuse)
    ContractViolation,
    /// Anything else raised while the trial ran
    Internal,
}

impl FailureKind {
    /// Short human-readable label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Inference => "inference",
            Self::TimeBudgetExceeded => "time budget",
            Self::Panic => "panic",
            Self::DatasetUnavailable => "dataset unavailable",
            Self::Unsupported => "unsupported",
            Self::ContractViolation => "contract violation",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Error {
    /// Whether the error only invalidates the trial that raised it.
    #[must_use]
    pub const fn is_trial_local(&self) -> bool {
        matches!(
            self,
            Self::SchemaViolation(_)
                | Self::Training(_)
                | Self::Inference(_)
                | Self::TimeBudgetExceeded { .. }
        )
    }

    /// Whether the error aborts the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Report(_) | Self::Xlsx(_))
    }

    /// Map the error onto the failure kind recorded for a trial.
    #[must_use]
    pub const fn failure_kind(&self) -> FailureKind {
        match self {
            Self::SchemaViolation(_) | Self::Training(_) => FailureKind::Training,
            Self::Inference(_) => FailureKind::Inference,
            Self::TimeBudgetExceeded { .. } => FailureKind::TimeBudgetExceeded,
            Self::ShapeMismatch { .. } | Self::LabelOutOfRange { .. } => {
                FailureKind::ContractViolation
            }
            Self::DatasetNotFound(_) | Self::Schema(_) => FailureKind::DatasetUnavailable,
            _ => FailureKind::Internal,
        }
    }
}
