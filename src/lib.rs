//! # bayesbench: Reproducible Classifier Benchmarking
//!
//! **Version**: 0.1.0
//!
//! bayesbench runs cross-validated benchmarks of Bayesian-network and
//! generic classifiers over tabular datasets. An experiment declares
//! datasets × classifiers × hyperparameter grids × fold protocol; the
//! orchestrator turns that into independent trials, runs them on a worker
//! pool, and aggregates one result per group in declared order.
//!
//! ## Guarantees
//!
//! - **Reproducible**: fold plans are pure functions of the seed, metric
//!   aggregation has a fixed summation order, so the same spec yields
//!   bit-identical aggregated results
//! - **Leak-free**: discretizers are fit on each fold's training rows only
//! - **Bulkheaded**: a failing or panicking trial never affects its siblings;
//!   a group reports "no metrics" only when every fold failed
//! - **Bounded**: every trial runs under a cooperative time budget, and a
//!   run can be cancelled without losing finished groups
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bayesbench::dataset::DirectoryProvider;
//! use bayesbench::experiment::{ExperimentSpec, Orchestrator};
//! use bayesbench::report::{ExcelReportWriter, ReportWriter};
//! use bayesbench::ClassifierRegistry;
//!
//! let spec = ExperimentSpec::from_path("experiment.json")?;
//! let provider = DirectoryProvider::new("datasets")?;
//! let report = Orchestrator::new(Arc::new(spec), ClassifierRegistry::with_builtins(), Arc::new(provider))
//!     .run()?;
//!
//! ExcelReportWriter::new("results.xlsx").write(&report)?;
//! # Ok::<(), bayesbench::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod discretize;
pub mod error;
pub mod experiment;
pub mod folding;
pub mod metrics;
pub mod report;

pub use classifier::{Classifier, ClassifierRegistry, ExternalClassifier, Hyperparameters, TrialContext};
pub use config::Settings;
pub use dataset::{Dataset, DatasetProvider, DatasetRef};
pub use error::{Error, FailureKind, Result};
pub use experiment::{AggregatedResult, CancellationToken, ExperimentSpec, Orchestrator, RunReport};
