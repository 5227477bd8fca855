//! Trial lifecycle and results
//!
//! A trial is one fit/predict/evaluate pass of one group on one fold. Its
//! status moves `Pending → Running → {Succeeded, Failed}`; a trial that is
//! never dispatched because the run was cancelled goes `Pending → Cancelled`.
//! Terminal states reject every further transition, and a finished trial is
//! handed out as an immutable [`TrialResult`].

use crate::classifier::Complexity;
use crate::folding::FoldCoordinates;
use crate::metrics::{MetricBundle, AUC, TRAIN_ACCURACY};
use crate::{Error, FailureKind, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialStatus {
    /// Created, not yet dispatched
    Pending,
    /// Executing on a worker
    Running,
    /// Produced metrics
    Succeeded,
    /// Produced a failure record
    Failed,
    /// Never dispatched because the run was cancelled
    Cancelled,
}

impl TrialStatus {
    /// Whether no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] for any edge outside
    /// `Pending → Running`, `Pending → Cancelled` and
    /// `Running → {Succeeded, Failed}`.
    pub fn advance(self, next: Self) -> Result<Self> {
        match (self, next) {
            (Self::Pending, Self::Running | Self::Cancelled)
            | (Self::Running, Self::Succeeded | Self::Failed) => Ok(next),
            _ => Err(Error::Other(format!(
                "invalid trial transition {self:?} -> {next:?}"
            ))),
        }
    }
}

/// Identity of a trial: its group and its fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialId {
    /// Group index in declared order
    pub group: usize,
    /// Repetition index
    pub repetition: usize,
    /// Fold index within the repetition
    pub fold: usize,
    /// Seed of the repetition
    pub seed: u64,
}

impl TrialId {
    /// Trial of `group` on the fold at `coordinates`.
    #[must_use]
    pub const fn new(group: usize, coordinates: FoldCoordinates) -> Self {
        Self {
            group,
            repetition: coordinates.repetition,
            fold: coordinates.fold,
            seed: coordinates.seed,
        }
    }

    /// Fold coordinates of the trial.
    #[must_use]
    pub const fn coordinates(&self) -> FoldCoordinates {
        FoldCoordinates {
            repetition: self.repetition,
            fold: self.fold,
            seed: self.seed,
        }
    }
}

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}/r{}/f{}", self.group, self.repetition, self.fold)
    }
}

/// Wall-clock phase durations, in seconds. Not reproducible across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialTimings {
    /// Fitting and applying the fold-local discretizer
    pub discretize_secs: f64,
    /// Fitting the model (and scoring the training partition when enabled)
    pub train_secs: f64,
    /// Predicting and evaluating the test partition
    pub test_secs: f64,
}

/// What a succeeded trial measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialMetrics {
    /// Metrics on the test partition
    pub test: MetricBundle,
    /// ROC AUC on the test partition, when the backend yields probabilities
    pub auc: Option<f64>,
    /// Accuracy on the training partition, when requested
    pub train_accuracy: Option<f64>,
    /// Size of the fitted model, when the backend reports one
    pub complexity: Option<Complexity>,
}

impl TrialMetrics {
    /// Scalar metrics keyed by name.
    #[must_use]
    pub fn scalars(&self) -> Vec<(&'static str, f64)> {
        let mut scalars = self.test.scalars();
        if let Some(auc) = self.auc {
            scalars.push((AUC, auc));
        }
        if let Some(accuracy) = self.train_accuracy {
            scalars.push((TRAIN_ACCURACY, accuracy));
        }
        scalars
    }
}

/// Structured description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Dataset name
    pub dataset: String,
    /// Classifier label
    pub classifier: String,
    /// Hyperparameter assignment, rendered
    pub hyperparameters: String,
    /// Repetition index; `None` when the whole group failed up front
    pub repetition: Option<usize>,
    /// Fold index; `None` when the whole group failed up front
    pub fold: Option<usize>,
    /// Failure classification
    pub kind: FailureKind,
    /// Error text
    pub message: String,
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} [{}]", self.dataset, self.classifier, self.hyperparameters)?;
        if let (Some(repetition), Some(fold)) = (self.repetition, self.fold) {
            write!(f, " r{repetition}/f{fold}")?;
        }
        write!(f, ": {} failure: {}", self.kind, self.message)
    }
}

/// How a trial ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrialOutcome {
    /// Metrics of the fold
    Succeeded(TrialMetrics),
    /// Why the fold failed
    Failed(FailureRecord),
    /// Never dispatched
    Skipped,
}

impl TrialOutcome {
    const fn status(&self) -> TrialStatus {
        match self {
            Self::Succeeded(_) => TrialStatus::Succeeded,
            Self::Failed(_) => TrialStatus::Failed,
            Self::Skipped => TrialStatus::Cancelled,
        }
    }
}

/// A trial in flight.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    id: TrialId,
    status: TrialStatus,
    started_at: Option<DateTime<Utc>>,
}

impl TrialRecord {
    /// New trial in `Pending`.
    #[must_use]
    pub const fn new(id: TrialId) -> Self {
        Self {
            id,
            status: TrialStatus::Pending,
            started_at: None,
        }
    }

    /// Trial identity.
    #[must_use]
    pub const fn id(&self) -> TrialId {
        self.id
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> TrialStatus {
        self.status
    }

    /// `Pending → Running`; stamps the start time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] unless the trial is pending.
    pub fn start(&mut self) -> Result<()> {
        self.status = self.status.advance(TrialStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Resolve the trial with `outcome`, freezing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if the outcome does not follow from the
    /// current status (for example skipping a running trial).
    pub fn finish(self, outcome: TrialOutcome, timings: TrialTimings) -> Result<TrialResult> {
        let status = self.status.advance(outcome.status())?;
        Ok(TrialResult {
            id: self.id,
            status,
            outcome,
            timings,
            started_at: self.started_at,
            ended_at: Utc::now(),
        })
    }

    /// `Pending → Cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] unless the trial is pending.
    pub fn cancel(self) -> Result<TrialResult> {
        self.finish(TrialOutcome::Skipped, TrialTimings::default())
    }
}

/// Immutable result of a resolved trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    id: TrialId,
    status: TrialStatus,
    outcome: TrialOutcome,
    timings: TrialTimings,
    started_at: Option<DateTime<Utc>>,
    ended_at: DateTime<Utc>,
}

impl TrialResult {
    /// Failed result for a trial whose lifecycle could not be tracked.
    pub(crate) fn failed(id: TrialId, failure: FailureRecord) -> Self {
        Self {
            id,
            status: TrialStatus::Failed,
            outcome: TrialOutcome::Failed(failure),
            timings: TrialTimings::default(),
            started_at: None,
            ended_at: Utc::now(),
        }
    }

    /// Trial identity.
    #[must_use]
    pub const fn id(&self) -> TrialId {
        self.id
    }

    /// Terminal status.
    #[must_use]
    pub const fn status(&self) -> TrialStatus {
        self.status
    }

    /// Outcome.
    #[must_use]
    pub const fn outcome(&self) -> &TrialOutcome {
        &self.outcome
    }

    /// Phase durations.
    #[must_use]
    pub const fn timings(&self) -> TrialTimings {
        self.timings
    }

    /// Start timestamp; `None` for skipped trials.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// End timestamp.
    #[must_use]
    pub const fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Metrics, for succeeded trials.
    #[must_use]
    pub const fn metrics(&self) -> Option<&TrialMetrics> {
        match &self.outcome {
            TrialOutcome::Succeeded(metrics) => Some(metrics),
            _ => None,
        }
    }

    /// Failure record, for failed trials.
    #[must_use]
    pub const fn failure(&self) -> Option<&FailureRecord> {
        match &self.outcome {
            TrialOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Same identity and outcome, ignoring timestamps and timings.
    #[must_use]
    pub fn same_outcome(&self, other: &Self) -> bool {
        self.id == other.id && self.status == other.status && self.outcome == other.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{evaluate, LabelSpace};

    fn id() -> TrialId {
        TrialId::new(
            3,
            FoldCoordinates {
                repetition: 1,
                fold: 2,
                seed: 272,
            },
        )
    }

    fn metrics() -> TrialMetrics {
        TrialMetrics {
            test: evaluate(&[0, 1], &[0, 1], &LabelSpace::numbered(2)).unwrap(),
            auc: Some(1.0),
            train_accuracy: None,
            complexity: None,
        }
    }

    #[test]
    fn test_lifecycle_success() {
        let mut trial = TrialRecord::new(id());
        assert_eq!(trial.status(), TrialStatus::Pending);
        trial.start().unwrap();
        assert_eq!(trial.status(), TrialStatus::Running);
        let result = trial
            .finish(TrialOutcome::Succeeded(metrics()), TrialTimings::default())
            .unwrap();
        assert_eq!(result.status(), TrialStatus::Succeeded);
        assert!(result.started_at().is_some());
        assert!(result.metrics().is_some());
        assert!(result.failure().is_none());
        assert_eq!(result.id().to_string(), "g3/r1/f2");
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut trial = TrialRecord::new(id());
        trial.start().unwrap();
        assert!(trial.start().is_err());
    }

    #[test]
    fn test_cannot_finish_pending() {
        let trial = TrialRecord::new(id());
        assert!(trial
            .finish(TrialOutcome::Succeeded(metrics()), TrialTimings::default())
            .is_err());
    }

    #[test]
    fn test_cannot_skip_running() {
        let mut trial = TrialRecord::new(id());
        trial.start().unwrap();
        assert!(trial.cancel().is_err());
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        for terminal in [TrialStatus::Succeeded, TrialStatus::Failed, TrialStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                TrialStatus::Pending,
                TrialStatus::Running,
                TrialStatus::Succeeded,
                TrialStatus::Failed,
                TrialStatus::Cancelled,
            ] {
                assert!(terminal.advance(next).is_err());
            }
        }
    }

    #[test]
    fn test_cancelled_has_no_start() {
        let result = TrialRecord::new(id()).cancel().unwrap();
        assert_eq!(result.status(), TrialStatus::Cancelled);
        assert_eq!(result.outcome(), &TrialOutcome::Skipped);
        assert!(result.started_at().is_none());
    }

    #[test]
    fn test_scalars_include_optional_metrics() {
        let names: Vec<&str> = metrics().scalars().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["accuracy", "macro_f1", "weighted_f1", "auc"]);
    }

    #[test]
    fn test_failure_display() {
        let failure = FailureRecord {
            dataset: "iris".into(),
            classifier: "TAN".into(),
            hyperparameters: "default".into(),
            repetition: Some(0),
            fold: Some(2),
            kind: FailureKind::Training,
            message: "boom".into(),
        };
        assert_eq!(failure.to_string(), "iris/TAN [default] r0/f2: training failure: boom");
    }
}
