//! Declarative experiment description
//!
//! An [`ExperimentSpec`] names the datasets, the classifiers with their
//! hyperparameter grids, the fold strategy and the discretization policy.
//! It is read from JSON (or assembled with [`ExperimentSpec::builder`]),
//! validated once, and then shared read-only by every trial worker.
//!
//! A classifier may also carry a fixed assignment per dataset, given inline
//! (`per_dataset`) or loaded from a hyperparameter file (`hyper_file`) when
//! the experiment is read. On such a dataset the assignment replaces the
//! grid and the classifier contributes exactly one group.
//!
//! ```rust
//! use bayesbench::experiment::{ClassifierEntry, ExperimentSpec};
//! use bayesbench::ClassifierRegistry;
//!
//! let spec = ExperimentSpec::builder("smoke")
//!     .dataset("iris")
//!     .classifier(ClassifierEntry::new("TAN").with_values("alpha", vec![1.0.into(), 0.5.into()]))
//!     .k(5)
//!     .build();
//! spec.validate(&ClassifierRegistry::with_builtins())?;
//! assert_eq!(spec.groups().len(), 2);
//! # Ok::<(), bayesbench::Error>(())
//! ```

use crate::classifier::{
    expand_grid, read_hyper_file, ClassifierRegistry, DatasetHyperparameters, HyperFileFormat, HyperGrid, HyperValue,
    Hyperparameters,
};
use crate::dataset::DatasetRef;
use crate::discretize::{DiscretizerKind, DEFAULT_DISCRETIZER};
use crate::folding::FoldStrategy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Title used when the experiment file omits one.
pub const DEFAULT_TITLE: &str = "bayesbench experiment";

/// Per-dataset hyperparameter file attached to a classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperFile {
    /// Location, relative to the experiment file
    pub path: PathBuf,
    /// Document layout
    #[serde(default)]
    pub format: HyperFileFormat,
}

/// One classifier to benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierEntry {
    /// Registered classifier name
    pub name: String,
    /// Report label; defaults to `name`. Lets one backend appear twice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Candidate values per hyperparameter
    #[serde(default, skip_serializing_if = "HyperGrid::is_empty")]
    pub grid: HyperGrid,
    /// Overrides the global discretization switch for this classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discretize: Option<bool>,
    /// Fixed assignment per dataset; replaces the grid on that dataset
    #[serde(default, skip_serializing_if = "DatasetHyperparameters::is_empty")]
    pub per_dataset: DatasetHyperparameters,
    /// File merged into `per_dataset` when the experiment is loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyper_file: Option<HyperFile>,
}

impl ClassifierEntry {
    /// Entry with the backend defaults and no grid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            grid: HyperGrid::new(),
            discretize: None,
            per_dataset: DatasetHyperparameters::new(),
            hyper_file: None,
        }
    }

    /// Set the report label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add candidate values for one hyperparameter.
    #[must_use]
    pub fn with_values(mut self, name: impl Into<String>, values: Vec<HyperValue>) -> Self {
        self.grid.insert(name.into(), values);
        self
    }

    /// Force discretization on or off for this classifier.
    #[must_use]
    pub const fn with_discretize(mut self, discretize: bool) -> Self {
        self.discretize = Some(discretize);
        self
    }

    /// Fix the assignment used on `dataset`.
    #[must_use]
    pub fn with_dataset_params(mut self, dataset: impl Into<String>, params: Hyperparameters) -> Self {
        self.per_dataset.insert(dataset.into(), params);
        self
    }

    /// Load per-dataset assignments from `path` when the experiment is read.
    #[must_use]
    pub fn with_hyper_file(mut self, path: impl Into<PathBuf>, format: HyperFileFormat) -> Self {
        self.hyper_file = Some(HyperFile {
            path: path.into(),
            format,
        });
        self
    }

    /// Label used in reports.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Global discretization switch and algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscretizationPolicy {
    /// Discretize continuous features before fitting
    pub enabled: bool,
    /// Registered discretizer name
    pub algorithm: String,
}

impl Default for DiscretizationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: DEFAULT_DISCRETIZER.to_string(),
        }
    }
}

impl DiscretizationPolicy {
    /// Resolve the configured algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown discretizer names.
    pub fn kind(&self) -> Result<DiscretizerKind> {
        DiscretizerKind::from_name(&self.algorithm)
    }

    /// Whether `entry` is discretized, given the global switch.
    #[must_use]
    pub fn applies_to(&self, entry: &ClassifierEntry) -> bool {
        entry.discretize.unwrap_or(self.enabled)
    }
}

/// Identity of one (dataset, classifier, hyperparameter assignment) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupKey {
    /// Position in declared order
    pub index: usize,
    /// Index into [`ExperimentSpec::datasets`]
    pub dataset_index: usize,
    /// Index into [`ExperimentSpec::classifiers`]
    pub classifier_index: usize,
    /// Dataset name
    pub dataset: String,
    /// Classifier label
    pub classifier: String,
    /// Hyperparameter assignment
    pub params: Hyperparameters,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} [{}]", self.dataset, self.classifier, self.params)
    }
}

/// Experiment description. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    /// Human-readable title, copied into the run record
    #[serde(default = "default_title")]
    pub title: String,
    /// Datasets, in report order
    pub datasets: Vec<DatasetRef>,
    /// Classifiers, in report order
    pub classifiers: Vec<ClassifierEntry>,
    /// Cross-validation protocol
    #[serde(default)]
    pub folds: FoldStrategy,
    /// Discretization policy
    #[serde(default)]
    pub discretization: DiscretizationPolicy,
    /// Wall-clock budget per trial, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_budget_secs: Option<f64>,
    /// Also report accuracy on the training partition
    #[serde(default)]
    pub score_train: bool,
    /// Worker threads; available cores when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl ExperimentSpec {
    /// Start building a spec in code.
    #[must_use]
    pub fn builder(title: impl Into<String>) -> ExperimentSpecBuilder {
        ExperimentSpecBuilder::new(title)
    }

    /// Parse a JSON experiment description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the document is malformed.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid experiment description: {e}")))
    }

    /// Read a JSON experiment description from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or parsed.
    ///
    /// Hyperparameter files named by the classifiers are loaded relative to
    /// the experiment file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read experiment file {}: {e}", path.display()))
        })?;
        let mut spec = Self::from_json(&text)?;
        spec.resolve_hyper_files(path.parent().unwrap_or_else(|| Path::new(".")))?;
        Ok(spec)
    }

    /// Merge every classifier's hyperparameter file into its `per_dataset`
    /// map. Inline entries win over the file; datasets the file does not
    /// mention keep the grid. Resolved files are cleared from the entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a file cannot be read or parsed.
    pub fn resolve_hyper_files(&mut self, base: &Path) -> Result<()> {
        for entry in &mut self.classifiers {
            let Some(file) = entry.hyper_file.take() else {
                continue;
            };
            let path = base.join(&file.path);
            let loaded = read_hyper_file(&path, file.format)?;
            for dataset in &self.datasets {
                match loaded.get(&dataset.name) {
                    Some(params) => {
                        entry
                            .per_dataset
                            .entry(dataset.name.clone())
                            .or_insert_with(|| params.clone());
                    }
                    None if !entry.per_dataset.contains_key(&dataset.name) => warn!(
                        classifier = entry.label(),
                        dataset = %dataset.name,
                        file = %path.display(),
                        "dataset not in hyperparameter file; using the grid"
                    ),
                    None => {}
                }
            }
            debug!(classifier = entry.label(), file = %path.display(), datasets = loaded.len(), "hyperparameter file loaded");
        }
        Ok(())
    }

    /// The description as a JSON value, stored in the run record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Per-trial budget.
    #[must_use]
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Reject malformed descriptions before any trial runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first problem found.
    pub fn validate(&self, registry: &ClassifierRegistry) -> Result<()> {
        if self.datasets.is_empty() {
            return Err(Error::Configuration("no datasets listed".to_string()));
        }
        if self.classifiers.is_empty() {
            return Err(Error::Configuration("no classifiers listed".to_string()));
        }
        self.folds.validate()?;
        unique(self.datasets.iter().map(|d| d.name.as_str()), "dataset")?;
        unique(self.classifiers.iter().map(ClassifierEntry::label), "classifier")?;

        for entry in &self.classifiers {
            let classifier = registry.create(&entry.name)?;
            let valid = classifier.valid_hyperparameters();
            for (name, values) in &entry.grid {
                if values.is_empty() {
                    return Err(Error::Configuration(format!(
                        "{}: hyperparameter {name} has no candidate values",
                        entry.label()
                    )));
                }
            }
            if let Some(params) = expand_grid(&entry.grid).first() {
                params
                    .check(&valid)
                    .map_err(|e| Error::Configuration(format!("{}: {e}", entry.label())))?;
            }
            if let Some(file) = &entry.hyper_file {
                return Err(Error::Configuration(format!(
                    "{}: hyperparameter file {} has not been loaded",
                    entry.label(),
                    file.path.display()
                )));
            }
            for (dataset, params) in &entry.per_dataset {
                if !self.datasets.iter().any(|d| &d.name == dataset) {
                    return Err(Error::Configuration(format!(
                        "{}: hyperparameters given for unlisted dataset {dataset}",
                        entry.label()
                    )));
                }
                params
                    .check(&valid)
                    .map_err(|e| Error::Configuration(format!("{} on {dataset}: {e}", entry.label())))?;
            }
        }

        if self.classifiers.iter().any(|c| self.discretization.applies_to(c)) {
            self.discretization.kind()?;
        }
        if let Some(budget) = self.time_budget_secs {
            if !(budget.is_finite() && budget > 0.0) {
                return Err(Error::Configuration(format!(
                    "time budget must be a positive number of seconds, got {budget}"
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(Error::Configuration("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Expand into groups: datasets in declared order, then classifiers in
    /// declared order, then grid assignments in grid order. A per-dataset
    /// assignment stands in for the whole grid on its dataset.
    #[must_use]
    pub fn groups(&self) -> Vec<GroupKey> {
        let assignments: Vec<Vec<Hyperparameters>> = self
            .classifiers
            .iter()
            .map(|entry| expand_grid(&entry.grid))
            .collect();
        let mut groups = Vec::new();
        for (dataset_index, dataset) in self.datasets.iter().enumerate() {
            for (classifier_index, entry) in self.classifiers.iter().enumerate() {
                let params = match entry.per_dataset.get(&dataset.name) {
                    Some(fixed) => std::slice::from_ref(fixed),
                    None => assignments[classifier_index].as_slice(),
                };
                for params in params {
                    groups.push(GroupKey {
                        index: groups.len(),
                        dataset_index,
                        classifier_index,
                        dataset: dataset.name.clone(),
                        classifier: entry.label().to_string(),
                        params: params.clone(),
                    });
                }
            }
        }
        groups
    }
}

fn unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(Error::Configuration(format!("duplicate {what} {name}")));
        }
    }
    Ok(())
}

/// Builder for [`ExperimentSpec`].
#[derive(Debug)]
pub struct ExperimentSpecBuilder {
    spec: ExperimentSpec,
}

impl ExperimentSpecBuilder {
    /// Empty spec with default folds and discretization.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            spec: ExperimentSpec {
                title: title.into(),
                datasets: Vec::new(),
                classifiers: Vec::new(),
                folds: FoldStrategy::default(),
                discretization: DiscretizationPolicy::default(),
                time_budget_secs: None,
                score_train: false,
                workers: None,
            },
        }
    }

    /// Append a dataset.
    #[must_use]
    pub fn dataset(mut self, dataset: impl Into<DatasetRef>) -> Self {
        self.spec.datasets.push(dataset.into());
        self
    }

    /// Append a classifier.
    #[must_use]
    pub fn classifier(mut self, entry: ClassifierEntry) -> Self {
        self.spec.classifiers.push(entry);
        self
    }

    /// Replace the whole fold strategy.
    #[must_use]
    pub const fn folds(mut self, folds: FoldStrategy) -> Self {
        self.spec.folds = folds;
        self
    }

    /// Folds per repetition.
    #[must_use]
    pub const fn k(mut self, k: usize) -> Self {
        self.spec.folds.k = k;
        self
    }

    /// Number of repetitions.
    #[must_use]
    pub const fn repetitions(mut self, repetitions: usize) -> Self {
        self.spec.folds.repetitions = repetitions;
        self
    }

    /// Base seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.spec.folds.seed = seed;
        self
    }

    /// Stratified folds.
    #[must_use]
    pub const fn stratified(mut self, stratified: bool) -> Self {
        self.spec.folds.stratified = stratified;
        self
    }

    /// Global discretization switch and algorithm.
    #[must_use]
    pub fn discretization(mut self, enabled: bool, algorithm: impl Into<String>) -> Self {
        self.spec.discretization = DiscretizationPolicy {
            enabled,
            algorithm: algorithm.into(),
        };
        self
    }

    /// Per-trial budget.
    #[must_use]
    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.spec.time_budget_secs = Some(budget.as_secs_f64());
        self
    }

    /// Also score the training partition.
    #[must_use]
    pub const fn score_train(mut self, score_train: bool) -> Self {
        self.spec.score_train = score_train;
        self
    }

    /// Worker thread count.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.spec.workers = Some(workers);
        self
    }

    /// Finish. Validation happens separately, against a registry.
    #[must_use]
    pub fn build(self) -> ExperimentSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "title": "glass study",
        "datasets": ["iris", {"name": "glass", "class_name": "Type"}],
        "classifiers": [
            {"name": "TAN", "grid": {"alpha": [1.0, 0.5]}},
            {"name": "KNN", "grid": {"k": [1, 3, 5]}, "discretize": false}
        ],
        "folds": {"k": 10, "stratified": true},
        "time_budget_secs": 30
    }"#;

    #[test]
    fn test_parse_document() {
        let spec = ExperimentSpec::from_json(DOCUMENT).unwrap();
        assert_eq!(spec.title, "glass study");
        assert_eq!(spec.datasets[1].class_name.as_deref(), Some("Type"));
        assert_eq!(spec.folds.k, 10);
        assert_eq!(spec.folds.repetitions, 1);
        assert!(spec.folds.stratified);
        assert!(spec.discretization.enabled);
        assert_eq!(spec.time_budget(), Some(Duration::from_secs(30)));
        spec.validate(&ClassifierRegistry::with_builtins()).unwrap();
    }

    #[test]
    fn test_group_order() {
        let spec = ExperimentSpec::from_json(DOCUMENT).unwrap();
        let groups = spec.groups();
        assert_eq!(groups.len(), 2 * (2 + 3));
        let labels: Vec<String> = groups.iter().take(5).map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "iris/TAN [alpha=1]",
                "iris/TAN [alpha=0.5]",
                "iris/KNN [k=1]",
                "iris/KNN [k=3]",
                "iris/KNN [k=5]"
            ]
        );
        assert!(groups.iter().enumerate().all(|(i, g)| g.index == i));
        assert_eq!(groups[5].dataset, "glass");
    }

    #[test]
    fn test_malformed_document() {
        let err = ExperimentSpec::from_json(r#"{"datasets": "iris"}"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects() {
        let registry = ClassifierRegistry::with_builtins();
        let base = || ExperimentSpec::builder("t").dataset("iris");

        let cases = vec![
            base().build(),
            base().classifier(ClassifierEntry::new("SVC")).build(),
            base().classifier(ClassifierEntry::new("TAN")).k(1).build(),
            base()
                .classifier(ClassifierEntry::new("TAN"))
                .classifier(ClassifierEntry::new("TAN"))
                .build(),
            base()
                .classifier(ClassifierEntry::new("KNN").with_values("depth", vec![3i64.into()]))
                .build(),
            base()
                .classifier(ClassifierEntry::new("KNN").with_values("k", Vec::new()))
                .build(),
            base()
                .classifier(ClassifierEntry::new("TAN"))
                .discretization(true, "kmeans")
                .build(),
            base()
                .classifier(ClassifierEntry::new("TAN"))
                .time_budget(Duration::ZERO)
                .build(),
        ];
        for spec in cases {
            let err = spec.validate(&registry).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{spec:?}: {err}");
        }
    }

    #[test]
    fn test_same_backend_twice_with_labels() {
        let spec = ExperimentSpec::builder("t")
            .dataset("iris")
            .classifier(ClassifierEntry::new("KNN"))
            .classifier(ClassifierEntry::new("KNN").with_label("KNN-raw").with_discretize(false))
            .build();
        spec.validate(&ClassifierRegistry::with_builtins()).unwrap();
        assert!(spec.discretization.applies_to(&spec.classifiers[0]));
        assert!(!spec.discretization.applies_to(&spec.classifiers[1]));
    }

    #[test]
    fn test_per_dataset_params_replace_grid() {
        let spec = ExperimentSpec::builder("t")
            .dataset("iris")
            .dataset("glass")
            .classifier(
                ClassifierEntry::new("KNN")
                    .with_values("k", vec![1i64.into(), 3i64.into()])
                    .with_dataset_params("glass", Hyperparameters::new().with("k", 7i64)),
            )
            .build();
        spec.validate(&ClassifierRegistry::with_builtins()).unwrap();
        let labels: Vec<String> = spec.groups().iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["iris/KNN [k=1]", "iris/KNN [k=3]", "glass/KNN [k=7]"]);
    }

    #[test]
    fn test_per_dataset_params_validated() {
        let registry = ClassifierRegistry::with_builtins();
        let base = || ExperimentSpec::builder("t").dataset("iris");
        let cases = vec![
            base()
                .classifier(ClassifierEntry::new("KNN").with_dataset_params("glass", Hyperparameters::new()))
                .build(),
            base()
                .classifier(
                    ClassifierEntry::new("KNN").with_dataset_params("iris", Hyperparameters::new().with("depth", 2i64)),
                )
                .build(),
            base()
                .classifier(ClassifierEntry::new("KNN").with_hyper_file("best.json", HyperFileFormat::Best))
                .build(),
        ];
        for spec in cases {
            let err = spec.validate(&registry).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{spec:?}: {err}");
        }
    }

    #[test]
    fn test_hyper_file_resolved_relative_to_experiment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("best.json"),
            r#"{"iris": [0.96, {"k": 5}, "results_iris.json"], "wine": [0.9, {"k": 9}, "x"]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("experiment.json"),
            r#"{
                "datasets": ["iris", "glass"],
                "classifiers": [{
                    "name": "KNN",
                    "grid": {"k": [1, 3]},
                    "per_dataset": {"glass": {"k": 2}},
                    "hyper_file": {"path": "best.json", "format": "best"}
                }]
            }"#,
        )
        .unwrap();

        let spec = ExperimentSpec::from_path(dir.path().join("experiment.json")).unwrap();
        let entry = &spec.classifiers[0];
        assert!(entry.hyper_file.is_none());
        assert_eq!(entry.per_dataset.len(), 2);
        assert_eq!(entry.per_dataset["iris"], Hyperparameters::new().with("k", 5i64));
        spec.validate(&ClassifierRegistry::with_builtins()).unwrap();
        let labels: Vec<String> = spec.groups().iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["iris/KNN [k=5]", "glass/KNN [k=2]"]);
    }

    #[test]
    fn test_inline_params_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tuned.json"),
            r#"{"iris": {"hyperparameters": {"k": 5}}}"#,
        )
        .unwrap();
        let mut spec = ExperimentSpec::builder("t")
            .dataset("iris")
            .classifier(
                ClassifierEntry::new("KNN")
                    .with_dataset_params("iris", Hyperparameters::new().with("k", 1i64))
                    .with_hyper_file("tuned.json", HyperFileFormat::Results),
            )
            .build();
        spec.resolve_hyper_files(dir.path()).unwrap();
        assert_eq!(spec.classifiers[0].per_dataset["iris"], Hyperparameters::new().with("k", 1i64));
    }

    #[test]
    fn test_json_roundtrip_keeps_meaning() {
        let spec = ExperimentSpec::from_json(DOCUMENT).unwrap();
        let again = ExperimentSpec::from_json(&spec.to_json().unwrap().to_string()).unwrap();
        assert_eq!(spec, again);
    }
}
