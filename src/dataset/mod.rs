//! Tabular datasets and row-index views
//!
//! A [`Dataset`] is an immutable set of typed feature columns plus a label
//! column. Cross-validation never copies rows: folds are expressed as
//! [`DatasetView`]s, i.e. index sequences into a shared `Arc<Dataset>`.
//!
//! ```rust
//! use bayesbench::dataset::{Column, Dataset, Feature};
//!
//! let dataset = Dataset::new(
//!     "toy",
//!     vec![Feature::new("x", Column::Continuous(vec![0.1, 0.9, 0.2, 0.8]))],
//!     "class",
//!     vec!["a".into(), "b".into()],
//!     vec![0, 1, 0, 1],
//! )?;
//!
//! let rows = [1, 3];
//! let view = dataset.view(&rows);
//! assert_eq!(view.labels(), vec![1, 1]);
//! # Ok::<(), bayesbench::Error>(())
//! ```

pub mod arff;
pub mod csv;
pub mod parquet;
pub mod provider;

pub use provider::{CachedProvider, DatasetProvider, DatasetRef, DirectoryProvider, InMemoryProvider};

use crate::metrics::LabelSpace;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Type of a feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    /// Real-valued column
    Continuous,
    /// Categorical column encoded as state codes
    Discrete,
}

/// Column storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Real values, one per row
    Continuous(Vec<f64>),
    /// State codes (`< states.len()`), one per row
    Discrete {
        /// Code per row
        codes: Vec<u32>,
        /// State names indexed by code
        states: Vec<String>,
    },
}

impl Column {
    /// Number of rows in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Continuous(values) => values.len(),
            Self::Discrete { codes, .. } => codes.len(),
        }
    }

    /// Whether the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column type.
    #[must_use]
    pub const fn kind(&self) -> FeatureKind {
        match self {
            Self::Continuous(_) => FeatureKind::Continuous,
            Self::Discrete { .. } => FeatureKind::Discrete,
        }
    }

    /// Number of states of a discrete column (0 for continuous ones).
    #[must_use]
    pub fn n_states(&self) -> usize {
        match self {
            Self::Continuous(_) => 0,
            Self::Discrete { states, .. } => states.len(),
        }
    }

    /// Row value as a real number; discrete codes are widened.
    #[must_use]
    pub fn value(&self, row: usize) -> f64 {
        match self {
            Self::Continuous(values) => values[row],
            Self::Discrete { codes, .. } => f64::from(codes[row]),
        }
    }

    /// Row code for discrete columns.
    #[must_use]
    pub fn code(&self, row: usize) -> Option<u32> {
        match self {
            Self::Continuous(_) => None,
            Self::Discrete { codes, .. } => Some(codes[row]),
        }
    }
}

/// Named feature column.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    name: String,
    column: Column,
}

impl Feature {
    /// Create a feature from a name and a column.
    #[must_use]
    pub fn new(name: impl Into<String>, column: Column) -> Self {
        Self {
            name: name.into(),
            column,
        }
    }

    /// Feature name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature column.
    #[must_use]
    pub const fn column(&self) -> &Column {
        &self.column
    }

    /// Feature type.
    #[must_use]
    pub const fn kind(&self) -> FeatureKind {
        self.column.kind()
    }
}

/// Column layout a model was fit on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// `(name, kind, n_states)` per feature
    pub features: Vec<(String, FeatureKind, usize)>,
    /// Size of the label space
    pub n_classes: usize,
}

impl Schema {
    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Whether every feature column is discrete.
    #[must_use]
    pub fn is_fully_discrete(&self) -> bool {
        self.features
            .iter()
            .all(|(_, kind, _)| *kind == FeatureKind::Discrete)
    }

    /// Describe the first difference to `other`, if any.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Option<String> {
        if self.features.len() != other.features.len() {
            return Some(format!(
                "expected {} features, got {}",
                self.features.len(),
                other.features.len()
            ));
        }
        if self.n_classes != other.n_classes {
            return Some(format!(
                "expected {} classes, got {}",
                self.n_classes, other.n_classes
            ));
        }
        self.features
            .iter()
            .zip(&other.features)
            .find(|(a, b)| a != b)
            .map(|(a, b)| format!("feature {a:?} does not match {b:?}"))
    }
}

/// Immutable labeled tabular dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    features: Vec<Feature>,
    class_name: String,
    class_states: Vec<String>,
    labels: Vec<u32>,
}

impl Dataset {
    /// Build a dataset, enforcing row-count and code-range invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the dataset has no rows, a column's row
    /// count differs from the label column's, or a code is out of range.
    pub fn new(
        name: impl Into<String>,
        features: Vec<Feature>,
        class_name: impl Into<String>,
        class_states: Vec<String>,
        labels: Vec<u32>,
    ) -> Result<Self> {
        let name = name.into();
        let rows = labels.len();
        if rows == 0 {
            return Err(Error::Schema(format!("dataset {name} has no rows")));
        }
        if let Some(bad) = labels.iter().find(|&&l| l as usize >= class_states.len()) {
            return Err(Error::Schema(format!(
                "dataset {name}: label code {bad} outside {} class states",
                class_states.len()
            )));
        }
        for feature in &features {
            if feature.column.len() != rows {
                return Err(Error::Schema(format!(
                    "dataset {name}: column {} has {} rows, labels have {rows}",
                    feature.name,
                    feature.column.len()
                )));
            }
            if let Column::Discrete { codes, states } = &feature.column {
                if let Some(bad) = codes.iter().find(|&&c| c as usize >= states.len()) {
                    return Err(Error::Schema(format!(
                        "dataset {name}: column {} code {bad} outside {} states",
                        feature.name,
                        states.len()
                    )));
                }
            }
        }
        Ok(Self {
            name,
            features,
            class_name: class_name.into(),
            class_states,
            labels,
        })
    }

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature columns in declared order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Feature column by index.
    #[must_use]
    pub fn feature(&self, index: usize) -> &Feature {
        &self.features[index]
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Name of the label column.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Class names indexed by label code.
    #[must_use]
    pub fn class_states(&self) -> &[String] {
        &self.class_states
    }

    /// Size of the label space.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.class_states.len()
    }

    /// Label codes, one per row.
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Label space for metric evaluation.
    #[must_use]
    pub fn label_space(&self) -> LabelSpace {
        LabelSpace::new(self.class_states.clone())
    }

    /// Column layout of this dataset.
    #[must_use]
    pub fn schema(&self) -> Schema {
        Schema {
            features: self
                .features
                .iter()
                .map(|f| (f.name.clone(), f.kind(), f.column.n_states()))
                .collect(),
            n_classes: self.class_states.len(),
        }
    }

    /// Whether any feature column is continuous.
    #[must_use]
    pub fn has_continuous(&self) -> bool {
        self.features
            .iter()
            .any(|f| f.kind() == FeatureKind::Continuous)
    }

    /// Count of rows per class.
    #[must_use]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_states.len()];
        for &label in &self.labels {
            counts[label as usize] += 1;
        }
        counts
    }

    /// View over every row.
    #[must_use]
    pub fn view_all(&self) -> DatasetView<'_> {
        DatasetView {
            dataset: self,
            rows: Cow::Owned((0..self.n_samples()).collect()),
        }
    }

    /// View over the given rows (dataset-relative, 0-based).
    #[must_use]
    pub fn view<'a>(&'a self, rows: &'a [usize]) -> DatasetView<'a> {
        DatasetView {
            dataset: self,
            rows: Cow::Borrowed(rows),
        }
    }
}

/// Row-index view into a shared dataset.
#[derive(Debug, Clone)]
pub struct DatasetView<'a> {
    dataset: &'a Dataset,
    rows: Cow<'a, [usize]>,
}

impl<'a> DatasetView<'a> {
    /// Underlying dataset.
    #[must_use]
    pub const fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Dataset-relative row indices in view order.
    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Number of rows in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the view has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column layout of the underlying dataset.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.dataset.schema()
    }

    /// Label of the `i`-th row of the view.
    #[must_use]
    pub fn label(&self, i: usize) -> u32 {
        self.dataset.labels[self.rows[i]]
    }

    /// Labels in view order.
    #[must_use]
    pub fn labels(&self) -> Vec<u32> {
        self.rows.iter().map(|&r| self.dataset.labels[r]).collect()
    }

    /// Value of `feature` at the `i`-th row of the view.
    #[must_use]
    pub fn value(&self, feature: usize, i: usize) -> f64 {
        self.dataset.features[feature].column.value(self.rows[i])
    }

    /// Discrete code of `feature` at the `i`-th row of the view.
    #[must_use]
    pub fn code(&self, feature: usize, i: usize) -> Option<u32> {
        self.dataset.features[feature].column.code(self.rows[i])
    }

    /// Values of one feature in view order.
    #[must_use]
    pub fn column_values(&self, feature: usize) -> Vec<f64> {
        let column = &self.dataset.features[feature].column;
        self.rows.iter().map(|&r| column.value(r)).collect()
    }

    /// All feature values of the `i`-th row as `f32` (kernel input).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn row_f32(&self, i: usize) -> Vec<f32> {
        let row = self.rows[i];
        self.dataset
            .features
            .iter()
            .map(|f| f.column.value(row) as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> Dataset {
        Dataset::new(
            "toy",
            vec![
                Feature::new("x", Column::Continuous(vec![1.0, 2.0, 3.0])),
                Feature::new(
                    "color",
                    Column::Discrete {
                        codes: vec![0, 1, 1],
                        states: vec!["red".into(), "blue".into()],
                    },
                ),
            ],
            "class",
            vec!["no".into(), "yes".into()],
            vec![0, 1, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_dataset_rejects_empty() {
        let result = Dataset::new("empty", vec![], "class", vec!["a".into()], vec![]);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_dataset_rejects_ragged_columns() {
        let result = Dataset::new(
            "ragged",
            vec![Feature::new("x", Column::Continuous(vec![1.0]))],
            "class",
            vec!["a".into()],
            vec![0, 0],
        );
        assert!(result.unwrap_err().to_string().contains("has 1 rows"));
    }

    #[test]
    fn test_dataset_rejects_label_out_of_range() {
        let result = Dataset::new("bad", vec![], "class", vec!["a".into()], vec![0, 3]);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_view_reads_through_indices() {
        let dataset = toy();
        let rows = [2, 0];
        let view = dataset.view(&rows);
        assert_eq!(view.len(), 2);
        assert_eq!(view.labels(), vec![1, 0]);
        assert!((view.value(0, 0) - 3.0).abs() < f64::EPSILON);
        assert_eq!(view.code(1, 1), Some(0));
        assert_eq!(view.code(0, 1), None);
    }

    #[test]
    fn test_schema_diff() {
        let dataset = toy();
        let schema = dataset.schema();
        assert!(schema.diff(&dataset.schema()).is_none());
        assert!(!schema.is_fully_discrete());

        let mut other = schema.clone();
        other.features[0].1 = FeatureKind::Discrete;
        assert!(schema.diff(&other).is_some());
    }

    #[test]
    fn test_class_counts() {
        assert_eq!(toy().class_counts(), vec![1, 2]);
    }
}
