//! Run Record - metadata of one benchmark run

use crate::folding::FoldStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is created but not yet started.
    Pending,
    /// Trials are executing.
    Running,
    /// Every trial succeeded.
    Success,
    /// Some trials or groups failed; the rest completed.
    Partial,
    /// A stop signal arrived before every trial was dispatched.
    Cancelled,
    /// No group produced metrics.
    Failed,
}

impl RunStatus {
    /// Lowercase label used in reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// Run Record describes one execution of an experiment spec.
///
/// Carries everything a report header needs to make the run reproducible:
/// the fold protocol, the seeds, the discretizer and the full configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    run_id: String,
    title: String,
    platform: String,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    folds: usize,
    repetitions: usize,
    seeds: Vec<u64>,
    stratified: bool,
    discretization: Option<String>,
    config: Option<serde_json::Value>,
}

impl RunRecord {
    /// Create a new run record in Pending status with default folds.
    #[must_use]
    pub fn new(run_id: impl Into<String>, title: impl Into<String>) -> Self {
        RunRecordBuilder::new(run_id, title).build()
    }

    /// Create a builder for constructing a run record with optional fields.
    #[must_use]
    pub fn builder(run_id: impl Into<String>, title: impl Into<String>) -> RunRecordBuilder {
        RunRecordBuilder::new(run_id, title)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the experiment title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Get the platform name.
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has completed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Folds per repetition.
    #[must_use]
    pub const fn folds(&self) -> usize {
        self.folds
    }

    /// Number of repetitions.
    #[must_use]
    pub const fn repetitions(&self) -> usize {
        self.repetitions
    }

    /// Seed of every repetition.
    #[must_use]
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    /// Whether folds were stratified.
    #[must_use]
    pub const fn stratified(&self) -> bool {
        self.stratified
    }

    /// Discretizer name, if discretization was enabled.
    #[must_use]
    pub fn discretization(&self) -> Option<&str> {
        self.discretization.as_deref()
    }

    /// Get the experiment configuration, if any.
    #[must_use]
    pub const fn config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }

    /// Wall-clock duration in seconds, once the run has completed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> Option<f64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => {
                Some((end - start).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6)
            }
            _ => None,
        }
    }

    /// Start the run, transitioning from Pending to Running.
    ///
    /// Sets the `started_at` timestamp to now.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Complete the run with the given final status.
    ///
    /// Sets the `ended_at` timestamp to now.
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

/// Builder for `RunRecord`.
#[derive(Debug)]
pub struct RunRecordBuilder {
    record: RunRecord,
}

impl RunRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(run_id: impl Into<String>, title: impl Into<String>) -> Self {
        let strategy = FoldStrategy::default();
        Self {
            record: RunRecord {
                run_id: run_id.into(),
                title: title.into(),
                platform: String::new(),
                status: RunStatus::Pending,
                started_at: None,
                ended_at: None,
                folds: strategy.k,
                repetitions: strategy.repetitions,
                seeds: strategy.seeds(),
                stratified: strategy.stratified,
                discretization: None,
                config: None,
            },
        }
    }

    /// Set the platform name.
    #[must_use]
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.record.platform = platform.into();
        self
    }

    /// Copy the fold protocol.
    #[must_use]
    pub fn strategy(mut self, strategy: &FoldStrategy) -> Self {
        self.record.folds = strategy.k;
        self.record.repetitions = strategy.repetitions;
        self.record.seeds = strategy.seeds();
        self.record.stratified = strategy.stratified;
        self
    }

    /// Set the discretizer name.
    #[must_use]
    pub fn discretization(mut self, algorithm: Option<String>) -> Self {
        self.record.discretization = algorithm;
        self
    }

    /// Set the experiment configuration.
    #[must_use]
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.record.config = Some(config);
        self
    }

    /// Build the `RunRecord`.
    #[must_use]
    pub fn build(self) -> RunRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_record_lifecycle() {
        let mut record = RunRecord::new("run-1", "study");
        assert_eq!(record.status(), RunStatus::Pending);
        assert!(record.duration_secs().is_none());
        record.start();
        assert_eq!(record.status(), RunStatus::Running);
        record.complete(RunStatus::Partial);
        assert_eq!(record.status().label(), "partial");
        assert!(record.duration_secs().unwrap() >= 0.0);
    }

    #[test]
    fn test_run_record_builder() {
        let strategy = FoldStrategy {
            k: 10,
            repetitions: 3,
            seed: 271,
            stratified: true,
        };
        let config = serde_json::json!({"title": "study"});
        let record = RunRecord::builder("run-1", "study")
            .platform("lab")
            .strategy(&strategy)
            .discretization(Some("mdlp".into()))
            .config(config.clone())
            .build();
        assert_eq!(record.platform(), "lab");
        assert_eq!(record.folds(), 10);
        assert_eq!(record.seeds(), &[271, 272, 273]);
        assert!(record.stratified());
        assert_eq!(record.discretization(), Some("mdlp"));
        assert_eq!(record.config(), Some(&config));
    }
}
