//! Per-group aggregation across folds
//!
//! Summaries are computed over succeeded folds only, in fold order, so the
//! same trial results always aggregate to bit-identical values. A group with
//! no succeeded fold carries no metrics at all (`metrics == None`) rather
//! than zeros. An optional metric (AUC, training accuracy) is summarized
//! only when every succeeded fold produced it; otherwise it is left out and
//! a note records how many folds lacked it.

use super::spec::GroupKey;
use super::trial::{FailureRecord, TrialOutcome, TrialResult};
use crate::dataset::Dataset;
use crate::metrics::{ConfusionMatrix, ACCURACY};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean and spread of one metric across succeeded folds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Arithmetic mean
    pub mean: f64,
    /// Sample variance (`n - 1` denominator), 0 for a single fold
    pub variance: f64,
    /// Per-fold values in fold order
    pub values: Vec<f64>,
}

impl MetricSummary {
    /// Summarize `values`; `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = if values.len() < 2 {
            0.0
        } else {
            values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0)
        };
        Some(Self {
            mean,
            variance,
            values,
        })
    }

    /// Sample standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Size of the dataset a group ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetShape {
    /// Rows
    pub samples: usize,
    /// Feature columns
    pub features: usize,
    /// Class states
    pub classes: usize,
}

impl DatasetShape {
    /// Shape of `dataset`.
    #[must_use]
    pub fn of(dataset: &Dataset) -> Self {
        Self {
            samples: dataset.n_samples(),
            features: dataset.n_features(),
            classes: dataset.n_classes(),
        }
    }
}

/// Mean model size across succeeded folds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexitySummary {
    /// Mean node count
    pub nodes: f64,
    /// Mean edge count
    pub edges: f64,
    /// Mean total state count
    pub states: f64,
}

/// Mean phase durations across executed folds, in seconds.
///
/// Wall-clock values differ from run to run and are ignored by
/// [`AggregatedResult::same_metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Mean discretization time
    pub discretize_secs: f64,
    /// Mean fit time
    pub train_secs: f64,
    /// Mean predict-and-evaluate time
    pub test_secs: f64,
}

/// Final result of one group. Never mutated after finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Group identity
    pub key: GroupKey,
    /// Dataset shape; `None` when the dataset could not be loaded
    pub shape: Option<DatasetShape>,
    /// Whether folds were discretized before fitting
    pub discretized: bool,
    /// Folds that produced metrics
    pub succeeded_folds: usize,
    /// Folds that failed
    pub failed_folds: usize,
    /// Per-metric summaries; `None` exactly when the group failed
    pub metrics: Option<BTreeMap<String, MetricSummary>>,
    /// Every fold failed (or the group never ran)
    pub group_failed: bool,
    /// Failure records in fold order
    pub failures: Vec<FailureRecord>,
    /// Sum of the succeeded folds' confusion matrices
    pub confusion: Option<ConfusionMatrix>,
    /// Mean model size, for backends that report one
    pub complexity: Option<ComplexitySummary>,
    /// Mean phase durations
    pub timings: TimingSummary,
    /// Free-form remarks (nondeterministic backend, skipped phases)
    pub notes: Vec<String>,
}

impl AggregatedResult {
    /// Aggregate the resolved trials of one group, given in fold order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ShapeMismatch`] if the folds' confusion
    /// matrices disagree in size.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_trials(
        key: GroupKey,
        shape: DatasetShape,
        discretized: bool,
        trials: &[TrialResult],
    ) -> Result<Self> {
        let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut failures = Vec::new();
        let mut confusion: Option<ConfusionMatrix> = None;
        let mut complexities = Vec::new();
        let mut succeeded = 0usize;
        for trial in trials {
            match trial.outcome() {
                TrialOutcome::Succeeded(metrics) => {
                    succeeded += 1;
                    for (name, value) in metrics.scalars() {
                        values.entry(name.to_string()).or_default().push(value);
                    }
                    match confusion.as_mut() {
                        Some(total) => total.merge(&metrics.test.confusion)?,
                        None => confusion = Some(metrics.test.confusion.clone()),
                    }
                    complexities.extend(metrics.complexity);
                }
                TrialOutcome::Failed(failure) => failures.push(failure.clone()),
                TrialOutcome::Skipped => {}
            }
        }

        let mut notes = Vec::new();
        values.retain(|name, v| {
            if v.len() == succeeded {
                return true;
            }
            notes.push(format!(
                "{name} unavailable on {} of {succeeded} folds",
                succeeded - v.len()
            ));
            false
        });

        let group_failed = succeeded == 0;
        let metrics = (!group_failed).then(|| {
            values
                .into_iter()
                .filter_map(|(name, v)| MetricSummary::from_values(v).map(|s| (name, s)))
                .collect()
        });
        let complexity = (!complexities.is_empty()).then(|| {
            let n = complexities.len() as f64;
            ComplexitySummary {
                nodes: complexities.iter().map(|c| c.nodes as f64).sum::<f64>() / n,
                edges: complexities.iter().map(|c| c.edges as f64).sum::<f64>() / n,
                states: complexities.iter().map(|c| c.states as f64).sum::<f64>() / n,
            }
        });

        let executed: Vec<_> = trials.iter().filter(|t| t.started_at().is_some()).collect();
        let timings = if executed.is_empty() {
            TimingSummary::default()
        } else {
            let n = executed.len() as f64;
            TimingSummary {
                discretize_secs: executed.iter().map(|t| t.timings().discretize_secs).sum::<f64>() / n,
                train_secs: executed.iter().map(|t| t.timings().train_secs).sum::<f64>() / n,
                test_secs: executed.iter().map(|t| t.timings().test_secs).sum::<f64>() / n,
            }
        };

        Ok(Self {
            key,
            shape: Some(shape),
            discretized,
            succeeded_folds: succeeded,
            failed_folds: failures.len(),
            metrics,
            group_failed,
            failures,
            confusion,
            complexity,
            timings,
            notes,
        })
    }

    /// Result of a group that never ran a fold (dataset unavailable,
    /// unsupported classifier/dataset combination).
    #[must_use]
    pub fn unavailable(
        key: GroupKey,
        shape: Option<DatasetShape>,
        folds: usize,
        failure: FailureRecord,
    ) -> Self {
        Self {
            key,
            shape,
            discretized: false,
            succeeded_folds: 0,
            failed_folds: folds,
            metrics: None,
            group_failed: true,
            failures: vec![failure],
            confusion: None,
            complexity: None,
            timings: TimingSummary::default(),
            notes: Vec::new(),
        }
    }

    /// Attach a remark.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Summary of one metric; `None` if the group failed or never
    /// produced it.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.as_ref().and_then(|m| m.get(name))
    }

    /// Mean test accuracy.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        self.metric(ACCURACY).map(|s| s.mean)
    }

    /// Short status for reports: `ok`, `partial` or `failed`.
    #[must_use]
    pub const fn status_label(&self) -> &'static str {
        if self.group_failed {
            "failed"
        } else if self.failed_folds > 0 {
            "partial"
        } else {
            "ok"
        }
    }

    /// Failure reason shown next to the group: the first failure, plus a
    /// count of the others.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        let first = self.failures.first()?;
        let reason = format!("{} failure: {}", first.kind, first.message);
        Some(match self.failures.len() {
            1 => reason,
            n => format!("{reason} (+{} more)", n - 1),
        })
    }

    /// Equality of everything reproducible, i.e. all but timings.
    #[must_use]
    pub fn same_metrics(&self, other: &Self) -> bool {
        self.key == other.key
            && self.shape == other.shape
            && self.discretized == other.discretized
            && self.succeeded_folds == other.succeeded_folds
            && self.failed_folds == other.failed_folds
            && self.metrics == other.metrics
            && self.group_failed == other.group_failed
            && self.failures == other.failures
            && self.confusion == other.confusion
            && self.complexity == other.complexity
            && self.notes == other.notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Hyperparameters;
    use crate::experiment::trial::{TrialId, TrialMetrics, TrialRecord, TrialTimings};
    use crate::folding::FoldCoordinates;
    use crate::metrics::{evaluate, LabelSpace, AUC, MACRO_F1};
    use crate::FailureKind;

    fn key() -> GroupKey {
        GroupKey {
            index: 0,
            dataset_index: 0,
            classifier_index: 0,
            dataset: "toy".into(),
            classifier: "ZeroR".into(),
            params: Hyperparameters::new(),
        }
    }

    fn shape() -> DatasetShape {
        DatasetShape {
            samples: 4,
            features: 1,
            classes: 2,
        }
    }

    fn running(fold: usize) -> TrialRecord {
        let mut trial = TrialRecord::new(TrialId::new(
            0,
            FoldCoordinates {
                repetition: 0,
                fold,
                seed: 1,
            },
        ));
        trial.start().unwrap();
        trial
    }

    fn succeeded(fold: usize, predicted: &[u32]) -> TrialResult {
        with_auc(fold, predicted, None)
    }

    fn with_auc(fold: usize, predicted: &[u32], auc: Option<f64>) -> TrialResult {
        let metrics = TrialMetrics {
            test: evaluate(&[0, 1], predicted, &LabelSpace::numbered(2)).unwrap(),
            auc,
            train_accuracy: None,
            complexity: None,
        };
        running(fold)
            .finish(TrialOutcome::Succeeded(metrics), TrialTimings::default())
            .unwrap()
    }

    fn failed(fold: usize) -> TrialResult {
        let failure = FailureRecord {
            dataset: "toy".into(),
            classifier: "ZeroR".into(),
            hyperparameters: "default".into(),
            repetition: Some(0),
            fold: Some(fold),
            kind: FailureKind::Training,
            message: "forced".into(),
        };
        running(fold)
            .finish(TrialOutcome::Failed(failure), TrialTimings::default())
            .unwrap()
    }

    #[test]
    fn test_summary_sample_variance() {
        let summary = MetricSummary::from_values(vec![0.5, 1.0, 0.75]).unwrap();
        assert!((summary.mean - 0.75).abs() < 1e-12);
        assert!((summary.variance - 0.0625).abs() < 1e-12);
        assert!((summary.std_dev() - 0.25).abs() < 1e-12);
        assert!(MetricSummary::from_values(Vec::new()).is_none());
        assert!(MetricSummary::from_values(vec![0.3]).unwrap().variance.abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_folds_excluded_from_means() {
        let trials = vec![succeeded(0, &[0, 1]), failed(1), succeeded(2, &[0, 0])];
        let result = AggregatedResult::from_trials(key(), shape(), false, &trials).unwrap();
        assert_eq!(result.succeeded_folds, 2);
        assert_eq!(result.failed_folds, 1);
        assert!(!result.group_failed);
        assert_eq!(result.status_label(), "partial");
        assert!((result.accuracy().unwrap() - 0.75).abs() < 1e-12);
        assert_eq!(result.metric(MACRO_F1).unwrap().values.len(), 2);
        assert_eq!(result.confusion.as_ref().unwrap().total(), 4);
        assert_eq!(result.failures[0].fold, Some(1));
    }

    #[test]
    fn test_all_failed_has_no_metrics() {
        let trials = vec![failed(0), failed(1)];
        let result = AggregatedResult::from_trials(key(), shape(), false, &trials).unwrap();
        assert!(result.group_failed);
        assert!(result.metrics.is_none());
        assert!(result.accuracy().is_none());
        assert!(result.confusion.is_none());
        assert_eq!(result.status_label(), "failed");
        assert_eq!(
            result.failure_reason().unwrap(),
            "training failure: forced (+1 more)"
        );
    }

    #[test]
    fn test_auc_missing_on_some_folds_is_dropped() {
        let trials = vec![
            with_auc(0, &[0, 1], Some(1.0)),
            with_auc(1, &[0, 1], None),
            failed(2),
            with_auc(3, &[0, 0], Some(0.5)),
        ];
        let result = AggregatedResult::from_trials(key(), shape(), false, &trials).unwrap();
        assert_eq!(result.succeeded_folds, 3);
        assert!(result.metric(AUC).is_none());
        assert_eq!(result.metric(ACCURACY).unwrap().values.len(), 3);
        assert_eq!(result.notes, ["auc unavailable on 1 of 3 folds"]);
    }

    #[test]
    fn test_auc_on_every_succeeded_fold_is_kept() {
        let trials = vec![
            with_auc(0, &[0, 1], Some(1.0)),
            failed(1),
            with_auc(2, &[0, 0], Some(0.5)),
        ];
        let result = AggregatedResult::from_trials(key(), shape(), false, &trials).unwrap();
        let auc = result.metric(AUC).unwrap();
        assert_eq!(auc.values, [1.0, 0.5]);
        assert!((auc.mean - 0.75).abs() < 1e-12);
        assert!(result.notes.is_empty());
    }

    #[test]
    fn test_same_metrics_ignores_timings() {
        let trials = vec![succeeded(0, &[0, 1])];
        let a = AggregatedResult::from_trials(key(), shape(), false, &trials).unwrap();
        let mut b = a.clone();
        b.timings.train_secs += 1.0;
        assert!(a.same_metrics(&b));
        b.succeeded_folds += 1;
        assert!(!a.same_metrics(&b));
    }
}
