//! Classifier adapter layer
//!
//! Backends with different native contracts sit behind one capability-tagged
//! [`Classifier`] enum. The orchestrator only ever calls
//! [`Classifier::fit`], [`Classifier::predict`] and
//! [`Classifier::predict_probabilities`]; dispatch happens on the variant tag.
//!
//! - [`Classifier::BayesNet`]: discrete Bayesian-network classifiers
//!   (Naive Bayes, TAN). Fitting on a continuous column is a
//!   [`Error::SchemaViolation`].
//! - [`Classifier::Generic`]: general-purpose classifiers that accept mixed
//!   columns (`ZeroR`, `NearestCentroid`, `KNN`).
//! - [`Classifier::External`]: anything registered by the embedding
//!   application through [`ExternalClassifier`].
//!
//! Adapters never mutate their input views; every fit allocates a fresh
//! [`Model`] owned by the calling trial.

pub mod bayesnet;
pub mod generic;
pub mod hyper;
pub mod registry;

pub use bayesnet::{BayesNetClassifier, Network, Structure};
pub use generic::{GenericClassifier, GenericKind, GenericModel};
pub use hyper::{
    expand_grid, parse_hyper_file, read_hyper_file, DatasetHyperparameters, HyperFileFormat, HyperGrid, HyperValue,
    Hyperparameters,
};
pub use registry::{ClassifierFactory, ClassifierRegistry};

use crate::dataset::{DatasetView, Schema};
use crate::folding::FoldCoordinates;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a backend can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Yields per-class probabilities
    pub probabilities: bool,
    /// Requires fully discrete input
    pub discrete_only: bool,
    /// Same inputs always give the same model
    pub deterministic: bool,
}

/// Structural size of a fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complexity {
    /// Number of nodes (features plus class)
    pub nodes: usize,
    /// Number of directed edges
    pub edges: usize,
    /// Total number of variable states
    pub states: usize,
}

/// Per-trial execution context handed to backends.
///
/// Carries the fold identity and the wall-clock budget. Budgets are
/// cooperative: long-running backends call [`TrialContext::check_budget`]
/// inside their loops, and the orchestrator checks again between phases.
#[derive(Debug, Clone)]
pub struct TrialContext {
    fold: FoldCoordinates,
    started: Instant,
    budget: Option<Duration>,
}

impl TrialContext {
    /// Context for `fold`, starting the budget clock now.
    #[must_use]
    pub fn new(fold: FoldCoordinates, budget: Option<Duration>) -> Self {
        Self {
            fold,
            started: Instant::now(),
            budget,
        }
    }

    /// Context without a budget, for direct use outside a run.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(FoldCoordinates::default(), None)
    }

    /// Fold the trial runs on.
    #[must_use]
    pub const fn fold(&self) -> FoldCoordinates {
        self.fold
    }

    /// Time since the trial started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail once the trial has run past its budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimeBudgetExceeded`] when the budget is spent.
    pub fn check_budget(&self) -> Result<()> {
        match self.budget {
            Some(budget) if self.elapsed() > budget => Err(Error::TimeBudgetExceeded {
                elapsed_ms: self.elapsed().as_millis(),
                budget_ms: budget.as_millis(),
            }),
            _ => Ok(()),
        }
    }
}

/// Backend supplied by the embedding application.
///
/// Models are type-erased; the backend downcasts what it produced in
/// [`ExternalClassifier::fit`].
pub trait ExternalClassifier: Send + Sync + fmt::Debug {
    /// Registered name.
    fn name(&self) -> &str;

    /// Capability flags.
    fn capabilities(&self) -> Capabilities;

    /// Accepted hyperparameter names.
    fn valid_hyperparameters(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fit a model on `train`.
    ///
    /// # Errors
    ///
    /// Backend-specific; [`Error::Training`] for precondition failures.
    fn fit(
        &self,
        train: &DatasetView<'_>,
        params: &Hyperparameters,
        ctx: &TrialContext,
    ) -> Result<Box<dyn Any + Send>>;

    /// Predict one label per row of `eval`.
    ///
    /// # Errors
    ///
    /// Backend-specific; [`Error::Inference`] for prediction failures.
    fn predict(
        &self,
        model: &(dyn Any + Send),
        eval: &DatasetView<'_>,
        ctx: &TrialContext,
    ) -> Result<Vec<u32>>;

    /// Per-class probabilities, `None` when unsupported.
    ///
    /// # Errors
    ///
    /// Backend-specific; [`Error::Inference`] for prediction failures.
    fn predict_probabilities(
        &self,
        _model: &(dyn Any + Send),
        _eval: &DatasetView<'_>,
        _ctx: &TrialContext,
    ) -> Result<Option<Vec<Vec<f64>>>> {
        Ok(None)
    }
}

/// Backend-specific model payload.
pub enum ModelKind {
    /// Fitted Bayesian network
    BayesNet(Network),
    /// Fitted generic classifier
    Generic(GenericModel),
    /// Opaque model of an external backend
    External(Box<dyn Any + Send>),
}

impl fmt::Debug for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BayesNet(network) => f.debug_tuple("BayesNet").field(network).finish(),
            Self::Generic(model) => f.debug_tuple("Generic").field(model).finish(),
            Self::External(_) => f.write_str("External(..)"),
        }
    }
}

/// Fitted model plus the schema it was fit on.
#[derive(Debug)]
pub struct Model {
    schema: Schema,
    inner: ModelKind,
}

impl Model {
    /// Wrap a backend payload.
    #[must_use]
    pub const fn new(schema: Schema, inner: ModelKind) -> Self {
        Self { schema, inner }
    }

    /// Schema of the training data.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Backend payload.
    #[must_use]
    pub const fn inner(&self) -> &ModelKind {
        &self.inner
    }

    /// Structural size, for backends that report one.
    #[must_use]
    pub fn complexity(&self) -> Option<Complexity> {
        match &self.inner {
            ModelKind::BayesNet(network) => Some(network.complexity()),
            _ => None,
        }
    }
}

/// Capability-tagged classifier adapter.
#[derive(Debug, Clone)]
pub enum Classifier {
    /// Discrete Bayesian-network classifier
    BayesNet(BayesNetClassifier),
    /// Generic mixed-input classifier
    Generic(GenericClassifier),
    /// Application-supplied backend
    External(Arc<dyn ExternalClassifier>),
}

impl Classifier {
    /// Backend name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::BayesNet(c) => c.name(),
            Self::Generic(c) => c.name(),
            Self::External(c) => c.name(),
        }
    }

    /// Capability flags.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::BayesNet(_) => BayesNetClassifier::capabilities(),
            Self::Generic(c) => c.capabilities(),
            Self::External(c) => c.capabilities(),
        }
    }

    /// Accepted hyperparameter names.
    #[must_use]
    pub fn valid_hyperparameters(&self) -> Vec<String> {
        match self {
            Self::BayesNet(c) => c.valid_hyperparameters(),
            Self::Generic(c) => c.valid_hyperparameters(),
            Self::External(c) => c.valid_hyperparameters(),
        }
    }

    /// Fit a fresh model on the rows of `train`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaViolation`] if a discrete-only backend sees a
    /// continuous column, [`Error::Training`] for other precondition
    /// failures and [`Error::TimeBudgetExceeded`] if the budget runs out.
    pub fn fit(&self, train: &DatasetView<'_>, params: &Hyperparameters, ctx: &TrialContext) -> Result<Model> {
        if train.is_empty() {
            return Err(Error::Training("empty training partition".to_string()));
        }
        let schema = train.schema();
        if self.capabilities().discrete_only && !schema.is_fully_discrete() {
            return Err(Error::SchemaViolation(format!(
                "{} requires discrete features; enable discretization for this classifier",
                self.name()
            )));
        }
        let inner = match self {
            Self::BayesNet(c) => ModelKind::BayesNet(c.fit(train, params, ctx)?),
            Self::Generic(c) => ModelKind::Generic(c.fit(train, params, ctx)?),
            Self::External(c) => ModelKind::External(c.fit(train, params, ctx)?),
        };
        Ok(Model::new(schema, inner))
    }

    /// Predict one label per row of `eval`, in row order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Inference`] if `eval` does not share the model's
    /// schema or the model came from another backend.
    pub fn predict(&self, model: &Model, eval: &DatasetView<'_>, ctx: &TrialContext) -> Result<Vec<u32>> {
        check_schema(model, eval)?;
        let predictions = match (self, &model.inner) {
            (Self::BayesNet(_), ModelKind::BayesNet(network)) => network.predict(eval, ctx)?,
            (Self::Generic(_), ModelKind::Generic(generic)) => generic.predict(eval, ctx)?,
            (Self::External(c), ModelKind::External(inner)) => c.predict(inner.as_ref(), eval, ctx)?,
            _ => return Err(foreign_model(self)),
        };
        if predictions.len() != eval.len() {
            return Err(Error::Inference(format!(
                "{} returned {} predictions for {} rows",
                self.name(),
                predictions.len(),
                eval.len()
            )));
        }
        Ok(predictions)
    }

    /// Per-class probabilities per row of `eval`; `None` if the backend does
    /// not produce them.
    ///
    /// # Errors
    ///
    /// Same as [`Classifier::predict`].
    pub fn predict_probabilities(
        &self,
        model: &Model,
        eval: &DatasetView<'_>,
        ctx: &TrialContext,
    ) -> Result<Option<Vec<Vec<f64>>>> {
        check_schema(model, eval)?;
        match (self, &model.inner) {
            (Self::BayesNet(_), ModelKind::BayesNet(network)) => network.predict_probabilities(eval, ctx).map(Some),
            (Self::Generic(_), ModelKind::Generic(generic)) => generic.predict_probabilities(eval, ctx),
            (Self::External(c), ModelKind::External(inner)) => c.predict_probabilities(inner.as_ref(), eval, ctx),
            _ => Err(foreign_model(self)),
        }
    }
}

fn check_schema(model: &Model, eval: &DatasetView<'_>) -> Result<()> {
    match model.schema.diff(&eval.schema()) {
        Some(diff) => Err(Error::Inference(format!(
            "evaluation data does not match the training schema: {diff}"
        ))),
        None => Ok(()),
    }
}

fn foreign_model(classifier: &Classifier) -> Error {
    Error::Inference(format!(
        "model was not produced by the {} backend",
        classifier.name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, Dataset, Feature};

    fn continuous() -> Dataset {
        Dataset::new(
            "c",
            vec![Feature::new("x", Column::Continuous(vec![0.1, 0.2, 0.9, 1.0]))],
            "class",
            vec!["a".into(), "b".into()],
            vec![0, 0, 1, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_bayesnet_rejects_continuous() {
        let dataset = continuous();
        let classifier = Classifier::BayesNet(BayesNetClassifier::new(Structure::NaiveBayes));
        let err = classifier
            .fit(&dataset.view_all(), &Hyperparameters::new(), &TrialContext::unbounded())
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        assert!(err.is_trial_local());
    }

    #[test]
    fn test_predict_rejects_schema_drift() {
        let dataset = continuous();
        let classifier = Classifier::Generic(GenericClassifier::new(GenericKind::ZeroR));
        let ctx = TrialContext::unbounded();
        let model = classifier
            .fit(&dataset.view_all(), &Hyperparameters::new(), &ctx)
            .unwrap();

        let other = Dataset::new(
            "d",
            vec![Feature::new(
                "x",
                Column::Discrete {
                    codes: vec![0],
                    states: vec!["s".into()],
                },
            )],
            "class",
            vec!["a".into(), "b".into()],
            vec![0],
        )
        .unwrap();
        let err = classifier.predict(&model, &other.view_all(), &ctx).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_foreign_model_rejected() {
        let dataset = continuous();
        let ctx = TrialContext::unbounded();
        let zero_r = Classifier::Generic(GenericClassifier::new(GenericKind::ZeroR));
        let model = zero_r
            .fit(&dataset.view_all(), &Hyperparameters::new(), &ctx)
            .unwrap();
        let tan = Classifier::BayesNet(BayesNetClassifier::new(Structure::Tan));
        assert!(matches!(
            tan.predict(&model, &dataset.view_all(), &ctx),
            Err(Error::Inference(_))
        ));
    }

    #[test]
    fn test_budget_check() {
        let ctx = TrialContext::new(FoldCoordinates::default(), Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            ctx.check_budget(),
            Err(Error::TimeBudgetExceeded { budget_ms: 0, .. })
        ));
        assert!(TrialContext::unbounded().check_budget().is_ok());
    }
}
