//! Experiment orchestrator
//!
//! Turns an [`ExperimentSpec`] into trials, runs them on a worker pool and
//! folds their results back into one [`AggregatedResult`] per group.
//!
//! ## Execution
//!
//! 1. The experiment is validated; configuration errors abort before any trial.
//! 2. Every dataset is loaded once and gets one fold plan shared by all of
//!    its groups. A dataset that cannot be loaded fails its groups only.
//! 3. Groups are dispatched in declared order onto a `rayon` pool, the folds
//!    of a group in parallel. Each trial discretizes on its training rows
//!    (when configured), fits a fresh model, predicts the test rows and
//!    evaluates. Errors and panics stay inside the trial.
//! 4. Each group owns a completion slot with an atomic countdown; the trial
//!    that resolves last finalizes the group, exactly once.
//! 5. Groups are returned in declared order, whatever order trials finished.
//!
//! Cancellation is cooperative: trials already running finish, trials not
//! yet started are skipped, and groups with skipped trials are left out of
//! the report. Groups run in declared order, so the ones that finished
//! before the stop form a prefix of it.

use super::aggregate::{AggregatedResult, DatasetShape};
use super::cancel::CancellationToken;
use super::record::{RunRecord, RunStatus};
use super::spec::{ExperimentSpec, GroupKey};
use super::trial::{FailureRecord, TrialId, TrialMetrics, TrialOutcome, TrialRecord, TrialResult, TrialStatus, TrialTimings};
use crate::classifier::{Classifier, ClassifierRegistry, TrialContext};
use crate::dataset::{Dataset, DatasetProvider, DatasetRef, DatasetView};
use crate::discretize::DiscretizerKind;
use crate::folding::{Fold, FoldGenerator, FoldPlan};
use crate::metrics::{evaluate, roc_auc};
use crate::{Error, FailureKind, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Platform name recorded when none is configured.
pub const DEFAULT_PLATFORM: &str = "bayesbench";

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run metadata
    pub record: RunRecord,
    /// Finalized groups in declared order
    pub groups: Vec<AggregatedResult>,
    /// Resolved trials, by group then fold
    pub trials: Vec<TrialResult>,
    /// Trials planned
    pub trials_total: usize,
    /// Trials that failed
    pub trials_failed: usize,
    /// Trials skipped by cancellation
    pub trials_skipped: usize,
    /// Whether the run was cancelled
    pub cancelled: bool,
}

impl RunReport {
    /// Trials that produced metrics.
    #[must_use]
    pub fn trials_succeeded(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.status() == TrialStatus::Succeeded)
            .count()
    }

    /// Every failure record, group by group.
    pub fn failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.groups.iter().flat_map(|g| g.failures.iter())
    }
}

/// Per-group completion tracking.
///
/// `remaining` counts unresolved trials. The trial whose decrement takes it
/// to zero is the only one that finalizes the group.
#[derive(Debug)]
struct GroupSlot {
    remaining: AtomicUsize,
    trials: Mutex<Vec<Option<TrialResult>>>,
    result: OnceLock<AggregatedResult>,
}

impl GroupSlot {
    fn new(folds: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(folds),
            trials: Mutex::new(vec![None; folds]),
            result: OnceLock::new(),
        }
    }

    /// Store one trial; returns every trial, in fold order, once the
    /// group has fully resolved.
    fn resolve(&self, ordinal: usize, trial: TrialResult) -> Option<Vec<TrialResult>> {
        {
            let mut trials = self.trials.lock().unwrap_or_else(PoisonError::into_inner);
            trials[ordinal] = Some(trial);
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) != 1 {
            return None;
        }
        let trials = self.trials.lock().unwrap_or_else(PoisonError::into_inner);
        Some(trials.iter().flatten().cloned().collect())
    }

    fn into_parts(self) -> (Vec<TrialResult>, Option<AggregatedResult>) {
        let trials = self
            .trials
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .flatten()
            .collect();
        (trials, self.result.into_inner())
    }
}

/// A dataset after loading: ready with its fold plan, or unusable.
enum Source {
    Ready {
        dataset: Arc<Dataset>,
        plan: Arc<FoldPlan>,
    },
    Unavailable {
        kind: FailureKind,
        message: String,
    },
}

/// A group ready to run.
struct PreparedGroup {
    key: GroupKey,
    classifier: Classifier,
    discretizer: Option<DiscretizerKind>,
    dataset: Arc<Dataset>,
    plan: Arc<FoldPlan>,
    slot: GroupSlot,
}

impl PreparedGroup {
    fn failure(&self, fold: &Fold, kind: FailureKind, message: String) -> FailureRecord {
        failure_record(&self.key, Some(fold), kind, message)
    }
}

enum Prepared {
    Run(Box<PreparedGroup>),
    Done(AggregatedResult),
}

/// Drives an experiment from spec to report.
pub struct Orchestrator {
    spec: Arc<ExperimentSpec>,
    registry: ClassifierRegistry,
    provider: Arc<dyn DatasetProvider>,
    cancel: CancellationToken,
    platform: String,
    workers: Option<usize>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("title", &self.spec.title)
            .field("registry", &self.registry)
            .field("platform", &self.platform)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator over a shared, immutable spec.
    #[must_use]
    pub fn new(
        spec: Arc<ExperimentSpec>,
        registry: ClassifierRegistry,
        provider: Arc<dyn DatasetProvider>,
    ) -> Self {
        Self {
            spec,
            registry,
            provider,
            cancel: CancellationToken::new(),
            platform: DEFAULT_PLATFORM.to_string(),
            workers: None,
        }
    }

    /// Use `token` as the stop signal.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Platform name recorded in the run record.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Override the worker count of the experiment.
    #[must_use]
    pub const fn with_workers(mut self, workers: Option<usize>) -> Self {
        if workers.is_some() {
            self.workers = workers;
        }
        self
    }

    /// Spec being run.
    #[must_use]
    pub fn spec(&self) -> &ExperimentSpec {
        &self.spec
    }

    /// Handle that cancels this orchestrator's run.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Validate the experiment and list its groups in declared order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the experiment is malformed.
    pub fn plan(&self) -> Result<Vec<GroupKey>> {
        self.spec.validate(&self.registry)?;
        Ok(self.spec.groups())
    }

    /// Run every trial and aggregate.
    ///
    /// Trial and dataset failures end up in the report; only configuration
    /// problems and worker-pool setup failures are returned as errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the experiment is malformed.
    #[tracing::instrument(skip(self), fields(title = %self.spec.title))]
    pub fn run(&self) -> Result<RunReport> {
        let keys = self.plan()?;
        let discretization = self
            .spec
            .discretization
            .enabled
            .then(|| self.spec.discretization.algorithm.clone());
        let mut record = RunRecord::builder(run_id(), self.spec.title.clone())
            .platform(self.platform.clone())
            .strategy(&self.spec.folds)
            .discretization(discretization)
            .config(self.spec.to_json()?)
            .build();
        record.start();
        info!(
            run_id = record.run_id(),
            groups = keys.len(),
            datasets = self.spec.datasets.len(),
            "run started"
        );

        let sources: Vec<Source> = self.spec.datasets.iter().map(|r| self.load(r)).collect();
        let prepared = keys
            .into_iter()
            .map(|key| self.prepare(key, &sources))
            .collect::<Result<Vec<_>>>()?;

        let trials_total: usize = prepared
            .iter()
            .map(|p| match p {
                Prepared::Run(group) => group.plan.len(),
                Prepared::Done(_) => 0,
            })
            .sum();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.or(self.spec.workers).unwrap_or(0))
            .thread_name(|i| format!("bayesbench-worker-{i}"))
            .build()
            .map_err(|e| Error::Other(format!("cannot start worker pool: {e}")))?;
        debug!(workers = pool.current_num_threads(), trials = trials_total, "dispatching");
        // Groups run one after another in declared order, folds in parallel,
        // so a cancelled run still holds every group finished before the stop.
        pool.install(|| {
            for entry in &prepared {
                if let Prepared::Run(group) = entry {
                    (0..group.plan.len())
                        .into_par_iter()
                        .for_each(|f| self.dispatch(group, f));
                }
            }
        });

        let mut groups = Vec::with_capacity(prepared.len());
        let mut trials = Vec::with_capacity(trials_total);
        for entry in prepared {
            match entry {
                Prepared::Done(result) => groups.push(result),
                Prepared::Run(group) => {
                    let (group_trials, result) = group.slot.into_parts();
                    trials.extend(group_trials);
                    groups.extend(result);
                }
            }
        }

        let trials_failed = count(&trials, TrialStatus::Failed);
        let trials_skipped = count(&trials, TrialStatus::Cancelled);
        let cancelled = trials_skipped > 0 || self.cancel.is_cancelled();
        let status = if cancelled {
            RunStatus::Cancelled
        } else if groups.iter().all(|g| g.group_failed) {
            RunStatus::Failed
        } else if groups.iter().any(|g| g.failed_folds > 0) {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        record.complete(status);
        info!(
            status = status.label(),
            trials = trials_total,
            failed = trials_failed,
            skipped = trials_skipped,
            "run finished"
        );

        Ok(RunReport {
            record,
            groups,
            trials,
            trials_total,
            trials_failed,
            trials_skipped,
            cancelled,
        })
    }

    fn load(&self, reference: &DatasetRef) -> Source {
        let dataset = match self.provider.load(reference) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(dataset = %reference.name, error = %e, "dataset unavailable");
                return Source::Unavailable {
                    kind: FailureKind::DatasetUnavailable,
                    message: e.to_string(),
                };
            }
        };
        match FoldGenerator::new(self.spec.folds).plan(dataset.labels()) {
            Ok(plan) => {
                debug!(
                    dataset = %reference.name,
                    rows = dataset.n_samples(),
                    folds = plan.len(),
                    "fold plan ready"
                );
                Source::Ready {
                    dataset,
                    plan: Arc::new(plan),
                }
            }
            Err(e) => {
                warn!(dataset = %reference.name, error = %e, "cannot fold dataset");
                Source::Unavailable {
                    kind: FailureKind::Unsupported,
                    message: e.to_string(),
                }
            }
        }
    }

    fn prepare(&self, key: GroupKey, sources: &[Source]) -> Result<Prepared> {
        let folds = self.spec.folds.total_folds();
        let (dataset, plan) = match &sources[key.dataset_index] {
            Source::Ready { dataset, plan } => (Arc::clone(dataset), Arc::clone(plan)),
            Source::Unavailable { kind, message } => {
                let failure = failure_record(&key, None, *kind, message.clone());
                return Ok(Prepared::Done(AggregatedResult::unavailable(key, None, folds, failure)));
            }
        };

        let entry = &self.spec.classifiers[key.classifier_index];
        let classifier = self.registry.create(&entry.name)?;
        let capabilities = classifier.capabilities();
        let discretize = self.spec.discretization.applies_to(entry) && dataset.has_continuous();
        if capabilities.discrete_only && !discretize && dataset.has_continuous() {
            let message = format!(
                "{} requires discrete features and discretization is disabled for it",
                classifier.name()
            );
            warn!(group = %key, "{message}");
            let failure = failure_record(&key, None, FailureKind::Unsupported, message);
            let shape = Some(DatasetShape::of(&dataset));
            return Ok(Prepared::Done(AggregatedResult::unavailable(key, shape, folds, failure)));
        }
        let discretizer = if discretize {
            Some(self.spec.discretization.kind()?)
        } else {
            None
        };

        Ok(Prepared::Run(Box::new(PreparedGroup {
            slot: GroupSlot::new(plan.len()),
            key,
            classifier,
            discretizer,
            dataset,
            plan,
        })))
    }

    /// Run one trial and, if it was the group's last, finalize the group.
    fn dispatch(&self, group: &PreparedGroup, ordinal: usize) {
        let Some(fold) = group.plan.get(ordinal) else {
            return;
        };
        let id = TrialId::new(group.key.index, fold.coordinates());
        let result = self.run_trial(group, fold, id).unwrap_or_else(|e| {
            error!(trial = %id, error = %e, "trial lifecycle error");
            TrialResult::failed(id, group.failure(fold, FailureKind::Internal, e.to_string()))
        });
        if let Some(trials) = group.slot.resolve(ordinal, result) {
            self.finalize(group, &trials);
        }
    }

    fn run_trial(&self, group: &PreparedGroup, fold: &Fold, id: TrialId) -> Result<TrialResult> {
        let mut trial = TrialRecord::new(id);
        if self.cancel.is_cancelled() {
            debug!(trial = %id, "skipped after cancellation");
            return trial.cancel();
        }
        trial.start()?;
        let ctx = TrialContext::new(fold.coordinates(), self.spec.time_budget());
        let mut timings = TrialTimings::default();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.evaluate_fold(group, fold, &ctx, &mut timings)));
        let outcome = match outcome {
            Ok(Ok(metrics)) => TrialOutcome::Succeeded(metrics),
            Ok(Err(e)) => {
                let kind = e.failure_kind();
                if kind == FailureKind::ContractViolation {
                    error!(trial = %id, group = %group.key, error = %e, "metric contract violated");
                } else {
                    warn!(
                        dataset = %group.key.dataset,
                        classifier = %group.key.classifier,
                        repetition = fold.repetition,
                        fold = fold.index,
                        error = %e,
                        "trial failed"
                    );
                }
                TrialOutcome::Failed(group.failure(fold, kind, e.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(trial = %id, group = %group.key, panic = %message, "trial panicked");
                TrialOutcome::Failed(group.failure(fold, FailureKind::Panic, message))
            }
        };
        trial.finish(outcome, timings)
    }

    fn evaluate_fold(
        &self,
        group: &PreparedGroup,
        fold: &Fold,
        ctx: &TrialContext,
        timings: &mut TrialTimings,
    ) -> Result<TrialMetrics> {
        let dataset = group.dataset.as_ref();
        let space = dataset.label_space();
        let raw_train = dataset.view(&fold.train);
        let raw_test = dataset.view(&fold.test);

        let discretized;
        let (train, test): (DatasetView<'_>, DatasetView<'_>) = match &group.discretizer {
            Some(kind) => {
                let started = Instant::now();
                let fitted = kind.fit(&raw_train).map_err(discretizer_failure)?;
                discretized = (
                    fitted.transform(&raw_train).map_err(discretizer_failure)?,
                    fitted.transform(&raw_test).map_err(discretizer_failure)?,
                );
                timings.discretize_secs = started.elapsed().as_secs_f64();
                ctx.check_budget()?;
                (discretized.0.view_all(), discretized.1.view_all())
            }
            None => (raw_train, raw_test),
        };

        let started = Instant::now();
        let params = &group.key.params;
        let model = group.classifier.fit(&train, params, ctx)?;
        ctx.check_budget()?;
        let train_accuracy = if self.spec.score_train {
            let predicted = group.classifier.predict(&model, &train, ctx)?;
            Some(evaluate(&train.labels(), &predicted, &space)?.accuracy)
        } else {
            None
        };
        timings.train_secs = started.elapsed().as_secs_f64();
        ctx.check_budget()?;

        let started = Instant::now();
        let truth = test.labels();
        let predicted = group.classifier.predict(&model, &test, ctx)?;
        let bundle = evaluate(&truth, &predicted, &space)?;
        let auc = if group.classifier.capabilities().probabilities {
            match group.classifier.predict_probabilities(&model, &test, ctx)? {
                Some(probabilities) => roc_auc(&truth, &probabilities, space.len())?,
                None => None,
            }
        } else {
            None
        };
        timings.test_secs = started.elapsed().as_secs_f64();
        ctx.check_budget()?;

        Ok(TrialMetrics {
            test: bundle,
            auc,
            train_accuracy,
            complexity: model.complexity(),
        })
    }

    fn finalize(&self, group: &PreparedGroup, trials: &[TrialResult]) {
        if trials.iter().any(|t| t.status() == TrialStatus::Cancelled) {
            debug!(group = %group.key, "group not finalized: trials skipped");
            return;
        }
        let shape = DatasetShape::of(&group.dataset);
        let discretized = group.discretizer.is_some();
        let mut result = AggregatedResult::from_trials(group.key.clone(), shape, discretized, trials)
            .unwrap_or_else(|e| {
                error!(group = %group.key, error = %e, "aggregation failed");
                let failure = failure_record(&group.key, None, e.failure_kind(), e.to_string());
                AggregatedResult::unavailable(group.key.clone(), Some(shape), trials.len(), failure)
            });
        if !group.classifier.capabilities().deterministic {
            result = result.with_note(format!(
                "{} is nondeterministic; repeated runs may differ",
                group.classifier.name()
            ));
        }
        match result.accuracy() {
            Some(accuracy) => info!(
                group = %group.key,
                accuracy,
                succeeded = result.succeeded_folds,
                failed = result.failed_folds,
                "group finalized"
            ),
            None => warn!(group = %group.key, failed = result.failed_folds, "group failed"),
        }
        if group.slot.result.set(result).is_err() {
            error!(group = %group.key, "group finalized twice");
        }
    }
}

fn failure_record(key: &GroupKey, fold: Option<&Fold>, kind: FailureKind, message: String) -> FailureRecord {
    FailureRecord {
        dataset: key.dataset.clone(),
        classifier: key.classifier.clone(),
        hyperparameters: key.params.to_string(),
        repetition: fold.map(|f| f.repetition),
        fold: fold.map(|f| f.index),
        kind,
        message,
    }
}

fn discretizer_failure(e: Error) -> Error {
    Error::Training(format!("discretization failed: {e}"))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "backend panicked".to_string())
}

fn count(trials: &[TrialResult], status: TrialStatus) -> usize {
    trials.iter().filter(|t| t.status() == status).count()
}

fn run_id() -> String {
    format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"))
}
