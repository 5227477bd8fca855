//! Dataset providers
//!
//! A provider resolves a [`DatasetRef`] into a shared, immutable dataset.
//! [`CachedProvider`] wraps any provider so each dataset is parsed once per
//! run even when many groups and worker threads ask for it.

use super::{arff, csv, parquet, Dataset};
use crate::{Error, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Catalog file listing the datasets of a directory (`name[;class]` lines).
pub const CATALOG_FILE: &str = "all.txt";

/// File extensions tried, in order, when resolving a dataset by name.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["arff", "csv", "parquet"];

/// Reference to a dataset in an experiment description.
///
/// Serialized either as a bare name (`"iris"`) or as an object
/// (`{"name": "glass", "class_name": "Type"}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RefRepr", into = "RefRepr")]
pub struct DatasetRef {
    /// Dataset name (also the report key)
    pub name: String,
    /// Class column override
    pub class_name: Option<String>,
    /// Explicit file path; resolved from the provider root when absent
    pub path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RefRepr {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
}

impl From<RefRepr> for DatasetRef {
    fn from(repr: RefRepr) -> Self {
        match repr {
            RefRepr::Name(name) => Self::new(name),
            RefRepr::Detailed {
                name,
                class_name,
                path,
            } => Self {
                name,
                class_name,
                path,
            },
        }
    }
}

impl From<DatasetRef> for RefRepr {
    fn from(reference: DatasetRef) -> Self {
        if reference.class_name.is_none() && reference.path.is_none() {
            Self::Name(reference.name)
        } else {
            Self::Detailed {
                name: reference.name,
                class_name: reference.class_name,
                path: reference.path,
            }
        }
    }
}

impl DatasetRef {
    /// Reference a dataset by name only.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: None,
            path: None,
        }
    }

    /// Override the class column.
    #[must_use]
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// Point at an explicit file.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.name,
            self.class_name.as_deref().unwrap_or_default(),
            self.path
                .as_deref()
                .map(Path::display)
                .map(|p| p.to_string())
                .unwrap_or_default()
        )
    }
}

impl From<&str> for DatasetRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Source of datasets, consumed read-only by the orchestrator.
pub trait DatasetProvider: Send + Sync {
    /// Resolve a reference into a dataset.
    ///
    /// # Errors
    ///
    /// [`Error::DatasetNotFound`] when the reference cannot be resolved,
    /// [`Error::Schema`] when the source is malformed.
    fn load(&self, reference: &DatasetRef) -> Result<Arc<Dataset>>;

    /// Names of the datasets this provider knows about.
    fn names(&self) -> Vec<String>;
}

/// Provider reading ARFF, CSV and Parquet files from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    catalog: BTreeMap<String, Option<String>>,
}

impl DirectoryProvider {
    /// Create a provider rooted at `root`, reading `all.txt` if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the catalog file is malformed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let catalog_path = root.join(CATALOG_FILE);
        let catalog = match std::fs::read_to_string(&catalog_path) {
            Ok(text) => parse_catalog(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        tracing::debug!(root = %root.display(), entries = catalog.len(), "dataset directory opened");
        Ok(Self { root, catalog })
    }

    /// Directory the provider reads from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &DatasetRef) -> Result<PathBuf> {
        if let Some(path) = &reference.path {
            return if path.exists() {
                Ok(path.clone())
            } else {
                Err(Error::DatasetNotFound(path.display().to_string()))
            };
        }
        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{}.{ext}", reference.name)))
            .find(|p| p.exists())
            .ok_or_else(|| {
                Error::DatasetNotFound(format!(
                    "{} (looked for .arff/.csv/.parquet in {})",
                    reference.name,
                    self.root.display()
                ))
            })
    }
}

fn parse_catalog(text: &str) -> Result<BTreeMap<String, Option<String>>> {
    let mut catalog = BTreeMap::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split(';').map(str::trim).collect();
        match tokens.as_slice() {
            [name] => {
                catalog.insert((*name).to_string(), None);
            }
            [name, class, ..] if tokens.len() <= 3 => {
                let class = (!class.is_empty() && *class != "-1").then(|| (*class).to_string());
                catalog.insert((*name).to_string(), class);
            }
            _ => {
                return Err(Error::Configuration(format!(
                    "invalid catalog line {line:?}"
                )))
            }
        }
    }
    Ok(catalog)
}

impl DatasetProvider for DirectoryProvider {
    #[tracing::instrument(skip(self), fields(dataset = %reference.name))]
    fn load(&self, reference: &DatasetRef) -> Result<Arc<Dataset>> {
        let path = self.resolve(reference)?;
        let class_name = reference
            .class_name
            .clone()
            .or_else(|| self.catalog.get(&reference.name).cloned().flatten());
        let class_name = class_name.as_deref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let dataset = match extension.as_str() {
            "arff" => arff::load_arff(&path, &reference.name, class_name)?,
            "csv" => csv::load_csv(&path, &reference.name, class_name)?,
            "parquet" => parquet::load_parquet(&path, &reference.name, class_name)?,
            other => {
                return Err(Error::Schema(format!(
                    "{}: unsupported file extension {other:?}",
                    path.display()
                )))
            }
        };
        tracing::info!(
            samples = dataset.n_samples(),
            features = dataset.n_features(),
            classes = dataset.n_classes(),
            "dataset loaded"
        );
        Ok(Arc::new(dataset))
    }

    fn names(&self) -> Vec<String> {
        if !self.catalog.is_empty() {
            return self.catalog.keys().cloned().collect();
        }
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e))
            })
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Provider over datasets already in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProvider {
    datasets: BTreeMap<String, Arc<Dataset>>,
}

impl InMemoryProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset under its own name.
    #[must_use]
    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.insert(dataset);
        self
    }

    /// Register a dataset under its own name, replacing any previous one.
    pub fn insert(&mut self, dataset: Dataset) {
        self.datasets
            .insert(dataset.name().to_string(), Arc::new(dataset));
    }
}

impl DatasetProvider for InMemoryProvider {
    fn load(&self, reference: &DatasetRef) -> Result<Arc<Dataset>> {
        self.datasets
            .get(&reference.name)
            .cloned()
            .ok_or_else(|| Error::DatasetNotFound(reference.name.clone()))
    }

    fn names(&self) -> Vec<String> {
        self.datasets.keys().cloned().collect()
    }
}

/// Caching wrapper using a lock-free concurrent hashmap.
///
/// Thread-safe: concurrent misses for the same reference may both load, but
/// only the first inserted dataset is ever handed out.
pub struct CachedProvider<P> {
    inner: P,
    cache: DashMap<String, Arc<Dataset>>,
}

impl<P: DatasetProvider> CachedProvider<P> {
    /// Wrap a provider.
    #[must_use]
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Number of cached datasets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop every cached dataset.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<P: DatasetProvider> DatasetProvider for CachedProvider<P> {
    fn load(&self, reference: &DatasetRef) -> Result<Arc<Dataset>> {
        let key = reference.cache_key();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let loaded = self.inner.load(reference)?;
        Ok(Arc::clone(self.cache.entry(key).or_insert(loaded).value()))
    }

    fn names(&self) -> Vec<String> {
        self.inner.names()
    }
}
