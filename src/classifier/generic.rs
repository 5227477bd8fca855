//! Generic classifier collection
//!
//! Mixed-input classifiers used as baselines next to the Bayesian networks.
//! Discrete columns are read as their numeric codes. Distance-based models
//! z-score every feature on the training rows and compute squared Euclidean
//! distances with SIMD dot products (`trueno::Vector`):
//! `|a - b|² = a·a + b·b - 2 a·b`.

use super::bayesnet::argmax;
use super::{Capabilities, Hyperparameters, TrialContext};
use crate::dataset::DatasetView;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use trueno::Vector;

/// Default neighbour count of `KNN`.
pub const DEFAULT_NEIGHBOURS: usize = 5;

/// Generic classifier family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenericKind {
    /// Majority class
    ZeroR,
    /// Closest class centroid in standardised space
    NearestCentroid,
    /// Majority vote of the `k` nearest training rows
    Knn,
}

/// Generic classifier adapter.
#[derive(Debug, Clone)]
pub struct GenericClassifier {
    kind: GenericKind,
}

impl GenericClassifier {
    /// Classifier of the given family.
    #[must_use]
    pub const fn new(kind: GenericKind) -> Self {
        Self { kind }
    }

    /// Family.
    #[must_use]
    pub const fn kind(&self) -> GenericKind {
        self.kind
    }

    /// Registered name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.kind {
            GenericKind::ZeroR => "ZeroR",
            GenericKind::NearestCentroid => "NearestCentroid",
            GenericKind::Knn => "KNN",
        }
    }

    /// Capability flags.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        Capabilities {
            probabilities: !matches!(self.kind, GenericKind::NearestCentroid),
            discrete_only: false,
            deterministic: true,
        }
    }

    /// Accepted hyperparameter names.
    #[must_use]
    pub fn valid_hyperparameters(&self) -> Vec<String> {
        match self.kind {
            GenericKind::Knn => vec!["k".to_string()],
            GenericKind::ZeroR | GenericKind::NearestCentroid => Vec::new(),
        }
    }

    /// Fit on the rows of `train`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Training`] for invalid hyperparameter values and
    /// [`Error::TimeBudgetExceeded`] if the budget runs out.
    pub fn fit(&self, train: &DatasetView<'_>, params: &Hyperparameters, ctx: &TrialContext) -> Result<GenericModel> {
        let n_classes = train.dataset().n_classes();
        let labels = train.labels();
        match self.kind {
            GenericKind::ZeroR => {
                let counts = class_counts(&labels, n_classes);
                #[allow(clippy::cast_precision_loss)]
                let distribution = counts
                    .iter()
                    .map(|&c| c as f64 / labels.len() as f64)
                    .collect::<Vec<_>>();
                Ok(GenericModel::ZeroR {
                    class: argmax(&distribution),
                    distribution,
                })
            }
            GenericKind::NearestCentroid => {
                let scaler = Scaler::fit(train);
                let mut sums = vec![vec![0.0f64; train.dataset().n_features()]; n_classes];
                let counts = class_counts(&labels, n_classes);
                for i in 0..train.len() {
                    ctx.check_budget()?;
                    let row = scaler.transform(train, i);
                    for (sum, value) in sums[labels[i] as usize].iter_mut().zip(row) {
                        *sum += f64::from(value);
                    }
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                let centroids = sums
                    .into_iter()
                    .zip(&counts)
                    .enumerate()
                    .filter(|(_, (_, count))| **count > 0)
                    .map(|(class, (sum, &count))| {
                        let centroid: Vec<f32> = sum.iter().map(|s| (s / count as f64) as f32).collect();
                        Point::new(centroid, class_code(class))
                    })
                    .collect();
                Ok(GenericModel::NearestCentroid { scaler, centroids })
            }
            GenericKind::Knn => {
                let k = params.usize_or("k", DEFAULT_NEIGHBOURS)?;
                if k == 0 {
                    return Err(Error::Training("k must be at least 1".to_string()));
                }
                let scaler = Scaler::fit(train);
                let mut points = Vec::with_capacity(train.len());
                for i in 0..train.len() {
                    ctx.check_budget()?;
                    points.push(Point::new(scaler.transform(train, i), labels[i]));
                }
                Ok(GenericModel::Knn {
                    k,
                    n_classes,
                    scaler,
                    points,
                })
            }
        }
    }
}

/// Per-feature z-score parameters learned on the training rows.
#[derive(Debug, Clone)]
pub struct Scaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    #[allow(clippy::cast_precision_loss)]
    fn fit(train: &DatasetView<'_>) -> Self {
        let n = train.len() as f64;
        let (mean, scale) = (0..train.dataset().n_features())
            .map(|feature| {
                let values = train.column_values(feature);
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let scale = if variance > 0.0 { variance.sqrt() } else { 1.0 };
                (mean, scale)
            })
            .unzip();
        Self { mean, scale }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn transform(&self, view: &DatasetView<'_>, i: usize) -> Vec<f32> {
        self.mean
            .iter()
            .zip(&self.scale)
            .enumerate()
            .map(|(feature, (mean, scale))| ((view.value(feature, i) - mean) / scale) as f32)
            .collect()
    }
}

/// Standardised row with its precomputed squared norm.
#[derive(Debug, Clone)]
pub struct Point {
    values: Vector<f32>,
    norm: f32,
    label: u32,
}

impl Point {
    fn new(values: Vec<f32>, label: u32) -> Self {
        let values = Vector::from_slice(&values);
        let norm = values.dot(&values).unwrap_or(0.0);
        Self { values, norm, label }
    }

    fn squared_distance(&self, query: &Self) -> Result<f32> {
        let cross = self
            .values
            .dot(&query.values)
            .map_err(|e| Error::Inference(format!("distance kernel failed: {e}")))?;
        Ok((self.norm + query.norm - 2.0 * cross).max(0.0))
    }
}

/// Squared Euclidean distance via SIMD dot products.
///
/// # Errors
///
/// Returns [`Error::Inference`] if the slices differ in length.
pub fn squared_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::Inference(format!(
            "distance between vectors of length {} and {}",
            a.len(),
            b.len()
        )));
    }
    Point::new(a.to_vec(), 0).squared_distance(&Point::new(b.to_vec(), 0))
}

/// Fitted generic model.
#[derive(Debug, Clone)]
pub enum GenericModel {
    /// Majority class and training class distribution
    ZeroR {
        /// Predicted class
        class: u32,
        /// Training class frequencies
        distribution: Vec<f64>,
    },
    /// Class centroids in standardised space
    NearestCentroid {
        /// Feature standardisation
        scaler: Scaler,
        /// One centroid per class seen in training
        centroids: Vec<Point>,
    },
    /// Stored training rows
    Knn {
        /// Neighbour count
        k: usize,
        /// Size of the label space
        n_classes: usize,
        /// Feature standardisation
        scaler: Scaler,
        /// Standardised training rows
        points: Vec<Point>,
    },
}

impl GenericModel {
    /// Predict one label per row of `eval`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Inference`] if a distance kernel fails and
    /// [`Error::TimeBudgetExceeded`] if the budget runs out.
    pub fn predict(&self, eval: &DatasetView<'_>, ctx: &TrialContext) -> Result<Vec<u32>> {
        match self {
            Self::ZeroR { class, .. } => Ok(vec![*class; eval.len()]),
            Self::NearestCentroid { scaler, centroids } => (0..eval.len())
                .map(|i| {
                    ctx.check_budget()?;
                    let query = Point::new(scaler.transform(eval, i), 0);
                    let mut best: Option<(f32, u32)> = None;
                    for centroid in centroids {
                        let distance = centroid.squared_distance(&query)?;
                        if best.map_or(true, |(d, _)| distance < d) {
                            best = Some((distance, centroid.label));
                        }
                    }
                    best.map(|(_, label)| label)
                        .ok_or_else(|| Error::Inference("model has no centroids".to_string()))
                })
                .collect(),
            Self::Knn { .. } => Ok(self
                .predict_probabilities(eval, ctx)?
                .unwrap_or_default()
                .iter()
                .map(|votes| argmax(votes))
                .collect()),
        }
    }

    /// Per-class probabilities, `None` for nearest-centroid models.
    ///
    /// # Errors
    ///
    /// Same as [`GenericModel::predict`].
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_probabilities(&self, eval: &DatasetView<'_>, ctx: &TrialContext) -> Result<Option<Vec<Vec<f64>>>> {
        match self {
            Self::ZeroR { distribution, .. } => Ok(Some(vec![distribution.clone(); eval.len()])),
            Self::NearestCentroid { .. } => Ok(None),
            Self::Knn {
                k,
                n_classes,
                scaler,
                points,
            } => {
                let k = (*k).min(points.len());
                (0..eval.len())
                    .map(|i| {
                        ctx.check_budget()?;
                        let query = Point::new(scaler.transform(eval, i), 0);
                        let mut distances = points
                            .iter()
                            .enumerate()
                            .map(|(index, point)| Ok((point.squared_distance(&query)?, index)))
                            .collect::<Result<Vec<(f32, usize)>>>()?;
                        distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                        let mut votes = vec![0.0; *n_classes];
                        for &(_, index) in &distances[..k] {
                            votes[points[index].label as usize] += 1.0;
                        }
                        Ok(votes.into_iter().map(|v| v / k as f64).collect())
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(Some)
            }
        }
    }
}

fn class_counts(labels: &[u32], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &label in labels {
        counts[label as usize] += 1;
    }
    counts
}

#[allow(clippy::cast_possible_truncation)]
const fn class_code(class: usize) -> u32 {
    class as u32
}
