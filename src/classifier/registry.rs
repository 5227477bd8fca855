//! Name → classifier factory registry

use super::{BayesNetClassifier, Classifier, ExternalClassifier, GenericClassifier, GenericKind, Structure};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds a fresh classifier adapter.
pub type ClassifierFactory = Arc<dyn Fn() -> Classifier + Send + Sync>;

/// Registered classifier factories, listed in name order.
#[derive(Clone, Default)]
pub struct ClassifierRegistry {
    factories: BTreeMap<String, ClassifierFactory>,
}

impl ClassifierRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in backend: `NaiveBayes`, `TAN`,
    /// `ZeroR`, `NearestCentroid` and `KNN`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for structure in [Structure::NaiveBayes, Structure::Tan] {
            let classifier = BayesNetClassifier::new(structure);
            registry.register(classifier.name(), move || Classifier::BayesNet(classifier.clone()));
        }
        for kind in [GenericKind::ZeroR, GenericKind::NearestCentroid, GenericKind::Knn] {
            let classifier = GenericClassifier::new(kind);
            registry.register(classifier.name(), move || Classifier::Generic(classifier.clone()));
        }
        registry
    }

    /// Register (or replace) a factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Classifier + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register a shared external backend under its own name.
    pub fn register_external(&mut self, backend: Arc<dyn ExternalClassifier>) -> &mut Self {
        let name = backend.name().to_string();
        self.register(name, move || Classifier::External(Arc::clone(&backend)))
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the classifier registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown names.
    pub fn create(&self, name: &str) -> Result<Classifier> {
        self.factories.get(name).map(|factory| factory()).ok_or_else(|| {
            Error::Configuration(format!(
                "unknown classifier {name}; registered: {}",
                self.names().join(", ")
            ))
        })
    }

    /// Registered names in lexicographic order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl fmt::Debug for ClassifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ClassifierRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["KNN", "NaiveBayes", "NearestCentroid", "TAN", "ZeroR"]
        );
        assert_eq!(registry.create("TAN").unwrap().name(), "TAN");
        assert!(registry.create("TAN").unwrap().capabilities().discrete_only);
    }

    #[test]
    fn test_unknown_classifier() {
        let err = ClassifierRegistry::with_builtins().create("SVC").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("SVC"));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ClassifierRegistry::new();
        registry.register("baseline", || {
            Classifier::Generic(GenericClassifier::new(GenericKind::ZeroR))
        });
        assert!(registry.contains("baseline"));
        assert_eq!(registry.create("baseline").unwrap().name(), "ZeroR");
    }
}
