//! Metric evaluation
//!
//! Pure functions from `(truth, predicted, label space)` to a
//! [`MetricBundle`]. No randomness and a fixed summation order, so identical
//! inputs always produce bit-identical outputs.
//!
//! ```rust
//! use bayesbench::metrics::{evaluate, LabelSpace};
//!
//! let space = LabelSpace::new(vec!["no".into(), "yes".into()]);
//! let bundle = evaluate(&[0, 1, 1, 0], &[0, 1, 0, 0], &space)?;
//! assert!((bundle.accuracy - 0.75).abs() < 1e-12);
//! # Ok::<(), bayesbench::Error>(())
//! ```

mod auc;

pub use auc::roc_auc;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Metric key for test accuracy.
pub const ACCURACY: &str = "accuracy";
/// Metric key for macro-averaged F1.
pub const MACRO_F1: &str = "macro_f1";
/// Metric key for support-weighted F1.
pub const WEIGHTED_F1: &str = "weighted_f1";
/// Metric key for ROC AUC (only when the backend yields probabilities).
pub const AUC: &str = "auc";
/// Metric key for accuracy on the training partition.
pub const TRAIN_ACCURACY: &str = "train_accuracy";

/// Ordered set of class names; label code `i` names `labels[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSpace {
    labels: Vec<String>,
}

impl LabelSpace {
    /// Create a label space from class names.
    #[must_use]
    pub const fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Label space `Class 0 .. Class n-1`.
    #[must_use]
    pub fn numbered(n_classes: usize) -> Self {
        Self::new((0..n_classes).map(|i| format!("Class {i}")).collect())
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the space is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Class names in code order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Square count matrix; rows are actual classes, columns predicted ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    n_classes: usize,
    counts: Vec<u64>,
}

impl ConfusionMatrix {
    /// All-zero matrix.
    #[must_use]
    pub fn zeros(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    /// Number of classes.
    #[must_use]
    pub const fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Count of rows of class `actual` predicted as `predicted`.
    #[must_use]
    pub fn get(&self, actual: usize, predicted: usize) -> u64 {
        self.counts[actual * self.n_classes + predicted]
    }

    fn increment(&mut self, actual: usize, predicted: usize) {
        self.counts[actual * self.n_classes + predicted] += 1;
    }

    /// Total number of counted rows.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Number of rows whose actual class is `class`.
    #[must_use]
    pub fn support(&self, class: usize) -> u64 {
        (0..self.n_classes).map(|p| self.get(class, p)).sum()
    }

    /// Number of rows predicted as `class`.
    #[must_use]
    pub fn predicted(&self, class: usize) -> u64 {
        (0..self.n_classes).map(|a| self.get(a, class)).sum()
    }

    /// Sum of the diagonal.
    #[must_use]
    pub fn correct(&self) -> u64 {
        (0..self.n_classes).map(|c| self.get(c, c)).sum()
    }

    /// Add another matrix of the same size into this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the class counts differ.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if other.n_classes != self.n_classes {
            return Err(Error::ShapeMismatch {
                expected: self.n_classes,
                actual: other.n_classes,
            });
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        Ok(())
    }

    /// Rows of the matrix, actual class first.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<u64>> {
        self.counts
            .chunks(self.n_classes.max(1))
            .map(<[u64]>::to_vec)
            .collect()
    }
}

/// One-vs-rest scores for a single class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class name
    pub label: String,
    /// `tp / (tp + fp)`, 0 when undefined
    pub precision: f64,
    /// `tp / (tp + fn)`, 0 when undefined
    pub recall: f64,
    /// Harmonic mean of precision and recall, 0 when both are 0
    pub f1: f64,
    /// Number of rows of this class
    pub support: u64,
}

/// Metrics of one prediction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBundle {
    /// Fraction of correct predictions
    pub accuracy: f64,
    /// Per-class scores in label-code order
    pub per_class: Vec<ClassMetrics>,
    /// Unweighted mean of per-class F1
    pub macro_f1: f64,
    /// Support-weighted mean of per-class F1
    pub weighted_f1: f64,
    /// Confusion matrix
    pub confusion: ConfusionMatrix,
}

impl MetricBundle {
    /// Build the bundle from a confusion matrix.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_confusion(confusion: ConfusionMatrix, space: &LabelSpace) -> Self {
        let total = confusion.total();
        let accuracy = if total == 0 {
            0.0
        } else {
            confusion.correct() as f64 / total as f64
        };
        let per_class: Vec<ClassMetrics> = (0..confusion.n_classes())
            .map(|c| {
                let tp = confusion.get(c, c);
                let support = confusion.support(c);
                let predicted = confusion.predicted(c);
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    label: space.labels()[c].clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();
        let macro_f1 = if per_class.is_empty() {
            0.0
        } else {
            per_class.iter().map(|m| m.f1).sum::<f64>() / per_class.len() as f64
        };
        let weighted_f1 = if total == 0 {
            0.0
        } else {
            per_class
                .iter()
                .map(|m| m.f1 * m.support as f64)
                .sum::<f64>()
                / total as f64
        };
        Self {
            accuracy,
            per_class,
            macro_f1,
            weighted_f1,
            confusion,
        }
    }

    /// Scalar metrics keyed by name, in a fixed order.
    #[must_use]
    pub fn scalars(&self) -> Vec<(&'static str, f64)> {
        vec![
            (ACCURACY, self.accuracy),
            (MACRO_F1, self.macro_f1),
            (WEIGHTED_F1, self.weighted_f1),
        ]
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Evaluate predictions against ground truth.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if the sequences differ in length or are
/// empty, and [`Error::LabelOutOfRange`] if a code falls outside `space`.
pub fn evaluate(truth: &[u32], predicted: &[u32], space: &LabelSpace) -> Result<MetricBundle> {
    if truth.len() != predicted.len() || truth.is_empty() {
        return Err(Error::ShapeMismatch {
            expected: truth.len(),
            actual: predicted.len(),
        });
    }
    let n_classes = space.len();
    let mut confusion = ConfusionMatrix::zeros(n_classes);
    for (&actual, &guess) in truth.iter().zip(predicted) {
        for label in [actual, guess] {
            if label as usize >= n_classes {
                return Err(Error::LabelOutOfRange {
                    label,
                    classes: n_classes,
                });
            }
        }
        confusion.increment(actual as usize, guess as usize);
    }
    Ok(MetricBundle::from_confusion(confusion, space))
}
