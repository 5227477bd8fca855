//! Fold-local discretization
//!
//! A [`DiscretizerKind`] is fit on the training partition of one fold and
//! yields a [`FittedDiscretizer`]: one ascending cut-point list per continuous
//! feature. Applying it to any view over the same schema produces a fully
//! discrete [`Dataset`] whose bin states are named `b0 .. bN`.
//!
//! Value `v` falls in bin `i` when `cuts[i-1] <= v < cuts[i]`; values below the
//! first cut land in `b0`, values at or above the last cut in `bN`.
//!
//! ```rust
//! use bayesbench::dataset::{Column, Dataset, Feature};
//! use bayesbench::discretize::DiscretizerKind;
//!
//! let dataset = Dataset::new(
//!     "toy",
//!     vec![Feature::new("x", Column::Continuous(vec![0.0, 1.0, 2.0, 3.0]))],
//!     "class",
//!     vec!["a".into(), "b".into()],
//!     vec![0, 0, 1, 1],
//! )?;
//! let fitted = DiscretizerKind::Uniform(2).fit(&dataset.view_all())?;
//! assert_eq!(fitted.cut_points(0), Some(&[1.5][..]));
//! # Ok::<(), bayesbench::Error>(())
//! ```

mod binning;
mod mdlp;

use crate::dataset::{Column, Dataset, DatasetView, Feature, Schema};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default discretizer name.
pub const DEFAULT_DISCRETIZER: &str = "mdlp";

/// Discretization algorithm and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscretizerKind {
    /// Fayyad–Irani entropy splits with the MDL stopping rule
    Mdlp {
        /// Ranges with fewer rows are not split
        min_length: usize,
        /// Maximum recursion depth
        max_depth: usize,
        /// Keep at most this many cuts (highest gain first)
        max_cuts: Option<usize>,
    },
    /// Equal-width bins over the training range
    Uniform(usize),
    /// Equal-frequency bins over the training values
    Quantile(usize),
}

impl Default for DiscretizerKind {
    fn default() -> Self {
        Self::Mdlp {
            min_length: 3,
            max_depth: usize::MAX,
            max_cuts: None,
        }
    }
}

impl DiscretizerKind {
    /// Resolve a registered discretizer name (`mdlp`, `mdlp3`..`mdlp5`,
    /// `bin3u`..`bin10u`, `bin3q`..`bin10q`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown names.
    pub fn from_name(name: &str) -> Result<Self> {
        let unknown = || {
            Error::Configuration(format!(
                "unknown discretizer {name}; known: {}",
                Self::names().join(", ")
            ))
        };
        if name == "mdlp" {
            return Ok(Self::default());
        }
        if let Some(cuts) = name.strip_prefix("mdlp") {
            return match cuts.parse::<usize>() {
                Ok(max_cuts @ 3..=5) => Ok(Self::Mdlp {
                    min_length: 3,
                    max_depth: usize::MAX,
                    max_cuts: Some(max_cuts),
                }),
                _ => Err(unknown()),
            };
        }
        let bins = name.strip_prefix("bin").ok_or_else(unknown)?;
        let (count, strategy) = bins.split_at(bins.len().saturating_sub(1));
        match (count.parse::<usize>(), strategy) {
            (Ok(n @ 3..=10), "u") => Ok(Self::Uniform(n)),
            (Ok(n @ 3..=10), "q") => Ok(Self::Quantile(n)),
            _ => Err(unknown()),
        }
    }

    /// Every registered discretizer name.
    #[must_use]
    pub fn names() -> Vec<String> {
        let mut names = vec!["mdlp".to_string()];
        names.extend((3..=5).map(|n| format!("mdlp{n}")));
        for n in 3..=10 {
            names.push(format!("bin{n}u"));
            names.push(format!("bin{n}q"));
        }
        names
    }

    /// Fit cut points on the rows of `train` only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the view is empty.
    pub fn fit(&self, train: &DatasetView<'_>) -> Result<FittedDiscretizer> {
        if train.is_empty() {
            return Err(Error::Schema(
                "cannot fit a discretizer on an empty partition".to_string(),
            ));
        }
        let dataset = train.dataset();
        let labels = train.labels();
        let cuts = dataset
            .features()
            .iter()
            .enumerate()
            .map(|(index, feature)| match feature.column() {
                Column::Discrete { .. } => None,
                Column::Continuous(_) => {
                    let values = train.column_values(index);
                    Some(match *self {
                        Self::Mdlp {
                            min_length,
                            max_depth,
                            max_cuts,
                        } => mdlp::cut_points(
                            &values,
                            &labels,
                            dataset.n_classes(),
                            mdlp::Limits {
                                min_length,
                                max_depth,
                                max_cuts,
                            },
                        ),
                        Self::Uniform(bins) => binning::uniform(&values, bins),
                        Self::Quantile(bins) => binning::quantile(&values, bins),
                    })
                }
            })
            .collect();
        Ok(FittedDiscretizer {
            schema: dataset.schema(),
            cuts,
        })
    }
}

/// Cut points learned from one training partition.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedDiscretizer {
    schema: Schema,
    cuts: Vec<Option<Vec<f64>>>,
}

impl FittedDiscretizer {
    /// Cut points of a continuous feature, `None` for discrete ones.
    #[must_use]
    pub fn cut_points(&self, feature: usize) -> Option<&[f64]> {
        self.cuts.get(feature)?.as_deref()
    }

    /// Schema the discretizer was fit on.
    #[must_use]
    pub const fn source_schema(&self) -> &Schema {
        &self.schema
    }

    /// Discretize the rows of `view` (in view order) into a new dataset.
    /// Discrete columns are copied unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the view's schema differs from the one the
    /// discretizer was fit on.
    pub fn transform(&self, view: &DatasetView<'_>) -> Result<Dataset> {
        let source = view.dataset();
        if let Some(diff) = self.schema.diff(&source.schema()) {
            return Err(Error::Schema(format!(
                "discretizer applied to a different schema: {diff}"
            )));
        }
        let features = source
            .features()
            .iter()
            .zip(&self.cuts)
            .map(|(feature, cuts)| {
                let column = match (feature.column(), cuts) {
                    (Column::Discrete { codes, states }, _) => Column::Discrete {
                        codes: view.rows().iter().map(|&r| codes[r]).collect(),
                        states: states.clone(),
                    },
                    (Column::Continuous(values), Some(cuts)) => Column::Discrete {
                        codes: view.rows().iter().map(|&r| bin_of(cuts, values[r])).collect(),
                        states: (0..=cuts.len()).map(|i| format!("b{i}")).collect(),
                    },
                    (Column::Continuous(_), None) => {
                        return Err(Error::Schema(format!(
                            "no cut points fitted for continuous feature {}",
                            feature.name()
                        )))
                    }
                };
                Ok(Feature::new(feature.name(), column))
            })
            .collect::<Result<Vec<_>>>()?;
        Dataset::new(
            source.name(),
            features,
            source.class_name(),
            source.class_states().to_vec(),
            view.labels(),
        )
    }
}

/// Bin index of `value`: the number of cut points `<= value`.
#[allow(clippy::cast_possible_truncation)]
fn bin_of(cuts: &[f64], value: f64) -> u32 {
    cuts.partition_point(|&c| c <= value) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed() -> Dataset {
        Dataset::new(
            "mixed",
            vec![
                Feature::new(
                    "x",
                    Column::Continuous(vec![0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0]),
                ),
                Feature::new(
                    "flag",
                    Column::Discrete {
                        codes: vec![0, 1, 0, 1, 0, 1, 0, 1],
                        states: vec!["off".into(), "on".into()],
                    },
                ),
            ],
            "class",
            vec!["low".into(), "high".into()],
            vec![0, 0, 0, 0, 1, 1, 1, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_names_resolve() {
        for name in DiscretizerKind::names() {
            assert!(DiscretizerKind::from_name(&name).is_ok(), "{name}");
        }
        assert_eq!(
            DiscretizerKind::from_name("bin4q").unwrap(),
            DiscretizerKind::Quantile(4)
        );
        assert!(DiscretizerKind::from_name("bin2u").is_err());
        assert!(DiscretizerKind::from_name("mdlp9").is_err());
        assert!(DiscretizerKind::from_name("kmeans").is_err());
    }

    #[test]
    fn test_bin_assignment_boundaries() {
        let cuts = [1.0, 2.0];
        assert_eq!(bin_of(&cuts, 0.5), 0);
        assert_eq!(bin_of(&cuts, 1.0), 1);
        assert_eq!(bin_of(&cuts, 1.9), 1);
        assert_eq!(bin_of(&cuts, 2.0), 2);
        assert_eq!(bin_of(&cuts, 99.0), 2);
    }

    #[test]
    fn test_transform_is_fully_discrete() {
        let dataset = mixed();
        let fitted = DiscretizerKind::default().fit(&dataset.view_all()).unwrap();
        assert_eq!(fitted.cut_points(0), Some(&[6.5][..]));
        assert_eq!(fitted.cut_points(1), None);

        let rows = [3, 4];
        let discrete = fitted.transform(&dataset.view(&rows)).unwrap();
        assert!(!discrete.has_continuous());
        assert_eq!(discrete.n_samples(), 2);
        assert_eq!(discrete.feature(0).column().code(0), Some(0));
        assert_eq!(discrete.feature(0).column().code(1), Some(1));
        assert_eq!(discrete.feature(1).column().code(1), Some(0));
        assert_eq!(discrete.labels(), &[0, 1]);
    }

    #[test]
    fn test_fit_uses_only_view_rows() {
        let dataset = mixed();
        let train = [0, 1, 2, 3];
        let fitted = DiscretizerKind::Uniform(3).fit(&dataset.view(&train)).unwrap();
        assert_eq!(fitted.cut_points(0), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_transform_rejects_other_schema() {
        let fitted = DiscretizerKind::Uniform(3)
            .fit(&mixed().view_all())
            .unwrap();
        let other = Dataset::new(
            "other",
            vec![Feature::new("y", Column::Continuous(vec![1.0]))],
            "class",
            vec!["low".into(), "high".into()],
            vec![0],
        )
        .unwrap();
        assert!(matches!(
            fitted.transform(&other.view_all()),
            Err(Error::Schema(_))
        ));
    }
}
