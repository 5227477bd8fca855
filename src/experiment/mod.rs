//! Experiment orchestration
//!
//! ## Model
//!
//! ```text
//! ExperimentSpec ──expand──< GroupKey (dataset × classifier × assignment)
//!                                 │
//!                                 ├──< TrialResult (one per fold)
//!                                 └──  AggregatedResult (finalized once)
//!
//! RunReport = RunRecord + AggregatedResult (declared order) + TrialResult
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use bayesbench::dataset::{Column, Dataset, Feature, InMemoryProvider};
//! use bayesbench::experiment::{ClassifierEntry, ExperimentSpec, Orchestrator};
//! use bayesbench::ClassifierRegistry;
//!
//! let rows = 20u32;
//! let dataset = Dataset::new(
//!     "line",
//!     vec![Feature::new("x", Column::Continuous((0..rows).map(f64::from).collect()))],
//!     "class",
//!     vec!["lo".into(), "hi".into()],
//!     (0..rows).map(|i| u32::from(i >= rows / 2)).collect(),
//! )?;
//!
//! let spec = ExperimentSpec::builder("demo")
//!     .dataset("line")
//!     .classifier(ClassifierEntry::new("NaiveBayes"))
//!     .k(5)
//!     .build();
//! let provider = InMemoryProvider::new().with_dataset(dataset);
//! let report = Orchestrator::new(Arc::new(spec), ClassifierRegistry::with_builtins(), Arc::new(provider))
//!     .run()?;
//!
//! assert_eq!(report.trials_total, 5);
//! assert_eq!(report.groups[0].succeeded_folds, 5);
//! # Ok::<(), bayesbench::Error>(())
//! ```

mod aggregate;
mod cancel;
mod orchestrator;
mod record;
mod spec;
mod trial;

pub use aggregate::{AggregatedResult, ComplexitySummary, DatasetShape, MetricSummary, TimingSummary};
pub use cancel::CancellationToken;
pub use orchestrator::{Orchestrator, RunReport, DEFAULT_PLATFORM};
pub use record::{RunRecord, RunRecordBuilder, RunStatus};
pub use spec::{
    ClassifierEntry, DiscretizationPolicy, ExperimentSpec, ExperimentSpecBuilder, GroupKey, HyperFile, DEFAULT_TITLE,
};
pub use trial::{FailureRecord, TrialId, TrialMetrics, TrialOutcome, TrialRecord, TrialResult, TrialStatus, TrialTimings};
