//! Hyperparameter values, assignments, grids and per-dataset files

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// One hyperparameter value as written in the experiment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HyperValue {
    /// `true` / `false`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Floating-point literal
    Float(f64),
    /// Anything else
    Text(String),
}

impl HyperValue {
    /// Numeric view of the value.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Non-negative integer view of the value.
    #[must_use]
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for HyperValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for HyperValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for HyperValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for HyperValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for HyperValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Candidate values per hyperparameter name.
pub type HyperGrid = BTreeMap<String, Vec<HyperValue>>;

/// One concrete hyperparameter assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters {
    values: BTreeMap<String, HyperValue>,
}

impl Hyperparameters {
    /// Empty assignment (backend defaults).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<HyperValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Whether no value is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HyperValue> {
        self.values.get(name)
    }

    /// Parameter names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Numeric value or `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Training`] if the value is not numeric.
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        self.get(name).map_or(Ok(default), |value| {
            value
                .as_f64()
                .ok_or_else(|| Error::Training(format!("hyperparameter {name} must be numeric, got {value}")))
        })
    }

    /// Non-negative integer value or `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Training`] if the value is not a non-negative integer.
    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        self.get(name).map_or(Ok(default), |value| {
            value.as_usize().ok_or_else(|| {
                Error::Training(format!(
                    "hyperparameter {name} must be a non-negative integer, got {value}"
                ))
            })
        })
    }

    /// Reject names outside `valid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first invalid parameter.
    pub fn check(&self, valid: &[String]) -> Result<()> {
        match self.names().find(|name| !valid.iter().any(|v| v == name)) {
            Some(name) => Err(Error::Configuration(format!(
                "hyperparameter {name} is not valid; valid hyperparameters are {{{}}}",
                valid.join(",")
            ))),
            None => Ok(()),
        }
    }

    /// Assignment from a JSON object. Nested objects and arrays are kept
    /// as their JSON text, for backends that parse them themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `value` is not an object or holds
    /// a `null`.
    pub fn from_json_object(value: &Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Err(Error::Configuration(format!(
                "hyperparameters must be a JSON object, got {value}"
            )));
        };
        let mut params = Self::new();
        for (name, value) in object {
            let value = match value {
                Value::Bool(v) => HyperValue::Bool(*v),
                Value::Number(n) => n
                    .as_i64()
                    .map(HyperValue::Int)
                    .or_else(|| n.as_f64().map(HyperValue::Float))
                    .ok_or_else(|| Error::Configuration(format!("hyperparameter {name}: unsupported number {n}")))?,
                Value::String(v) => HyperValue::Text(v.clone()),
                Value::Array(_) | Value::Object(_) => HyperValue::Text(value.to_string()),
                Value::Null => {
                    return Err(Error::Configuration(format!("hyperparameter {name} is null")));
                }
            };
            params = params.with(name.clone(), value);
        }
        Ok(params)
    }

    /// Compact JSON rendering used as the group label in reports.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.values).unwrap_or_else(|_| "{}".to_string())
    }
}

impl fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return f.write_str("default");
        }
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Cartesian product of a grid: names in lexicographic order, values in
/// declared order, the last name varying fastest. An empty grid yields one
/// empty assignment.
#[must_use]
pub fn expand_grid(grid: &HyperGrid) -> Vec<Hyperparameters> {
    grid.iter()
        .fold(vec![Hyperparameters::new()], |assignments, (name, values)| {
            assignments
                .iter()
                .flat_map(|partial| {
                    values
                        .iter()
                        .map(move |value| partial.clone().with(name.clone(), value.clone()))
                })
                .collect()
        })
}

/// Fixed hyperparameter assignment per dataset name.
pub type DatasetHyperparameters = BTreeMap<String, Hyperparameters>;

/// Layout of a per-dataset hyperparameter file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperFileFormat {
    /// `{"<dataset>": {"hyperparameters": {..}}}`, optionally wrapped in a
    /// top-level `"results"` object as written by result files
    #[default]
    Results,
    /// Best-results file: `{"<dataset>": [score, {..}, "<source file>"]}`
    Best,
}

/// Parse a per-dataset hyperparameter document.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the document is not JSON, is not
/// keyed by dataset, or a dataset entry lacks its assignment.
pub fn parse_hyper_file(text: &str, format: HyperFileFormat) -> Result<DatasetHyperparameters> {
    let document: Value = serde_json::from_str(text)
        .map_err(|e| Error::Configuration(format!("invalid hyperparameter file: {e}")))?;
    let document = match (format, document.get("results")) {
        (HyperFileFormat::Results, Some(results)) if results.is_object() => results,
        _ => &document,
    };
    let Some(entries) = document.as_object() else {
        return Err(Error::Configuration(
            "hyperparameter file must be a JSON object keyed by dataset".to_string(),
        ));
    };
    entries
        .iter()
        .map(|(dataset, entry)| {
            let assignment = match format {
                HyperFileFormat::Results => entry.get("hyperparameters"),
                HyperFileFormat::Best => entry.get(1),
            }
            .ok_or_else(|| {
                Error::Configuration(format!("hyperparameter file: no hyperparameters for dataset {dataset}"))
            })?;
            let params = Hyperparameters::from_json_object(assignment)
                .map_err(|e| Error::Configuration(format!("hyperparameter file, dataset {dataset}: {e}")))?;
            Ok((dataset.clone(), params))
        })
        .collect()
}

/// Read and parse a per-dataset hyperparameter file.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the file cannot be read or parsed.
pub fn read_hyper_file(path: &Path, format: HyperFileFormat) -> Result<DatasetHyperparameters> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Configuration(format!("cannot read hyperparameter file {}: {e}", path.display()))
    })?;
    parse_hyper_file(&text, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_empty_grid() {
        let assignments = expand_grid(&HyperGrid::new());
        assert_eq!(assignments, vec![Hyperparameters::new()]);
    }

    #[test]
    fn test_expand_grid_order() {
        let mut grid = HyperGrid::new();
        grid.insert("root".into(), vec![0i64.into(), 1i64.into()]);
        grid.insert("alpha".into(), vec![1.0.into(), 0.5.into()]);
        let labels: Vec<String> = expand_grid(&grid).iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec![
                "alpha=1, root=0",
                "alpha=1, root=1",
                "alpha=0.5, root=0",
                "alpha=0.5, root=1"
            ]
        );
    }

    #[test]
    fn test_untagged_values() {
        let grid: HyperGrid = serde_json::from_str(r#"{"k": [3, 5], "alpha": [0.5], "w": ["x", true]}"#).unwrap();
        assert_eq!(grid["k"][0], HyperValue::Int(3));
        assert_eq!(grid["alpha"][0], HyperValue::Float(0.5));
        assert_eq!(grid["w"][0], HyperValue::Text("x".into()));
        assert_eq!(grid["w"][1], HyperValue::Bool(true));
    }

    #[test]
    fn test_typed_accessors() {
        let params = Hyperparameters::new().with("k", 3i64).with("alpha", "big");
        assert_eq!(params.usize_or("k", 5).unwrap(), 3);
        assert_eq!(params.usize_or("missing", 5).unwrap(), 5);
        assert!(params.f64_or("alpha", 1.0).is_err());
        assert!((params.f64_or("k", 1.0).unwrap() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_check_rejects_unknown() {
        let params = Hyperparameters::new().with("depth", 3i64);
        let err = params.check(&["alpha".to_string()]).unwrap_err();
        assert!(err.to_string().contains("depth"));
        assert!(Hyperparameters::new().check(&[]).is_ok());
    }

    #[test]
    fn test_results_file_by_dataset() {
        let text = r#"{
            "iris": {"hyperparameters": {"k": 3, "weights": "distance"}, "score": 0.95},
            "glass": {"hyperparameters": {}}
        }"#;
        let loaded = parse_hyper_file(text, HyperFileFormat::Results).unwrap();
        assert_eq!(loaded["iris"], Hyperparameters::new().with("k", 3i64).with("weights", "distance"));
        assert!(loaded["glass"].is_empty());
    }

    #[test]
    fn test_results_file_wrapped_in_results() {
        let text = r#"{"model": "TAN", "results": {"iris": {"hyperparameters": {"alpha": 0.5}}}}"#;
        let loaded = parse_hyper_file(text, HyperFileFormat::Results).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["iris"].get("alpha"), Some(&HyperValue::Float(0.5)));
    }

    #[test]
    fn test_best_file_takes_second_element() {
        let text = r#"{"iris": [0.97, {"alpha": 1, "nested": {"depth": 2}}, "results_iris.json"]}"#;
        let loaded = parse_hyper_file(text, HyperFileFormat::Best).unwrap();
        let params = &loaded["iris"];
        assert_eq!(params.get("alpha"), Some(&HyperValue::Int(1)));
        assert_eq!(params.get("nested"), Some(&HyperValue::Text(r#"{"depth":2}"#.into())));
    }

    #[test]
    fn test_malformed_hyper_files() {
        let cases = [
            ("[1, 2]", HyperFileFormat::Results),
            ("{not json", HyperFileFormat::Results),
            (r#"{"iris": {"score": 1.0}}"#, HyperFileFormat::Results),
            (r#"{"iris": {"hyperparameters": [1]}}"#, HyperFileFormat::Results),
            (r#"{"iris": {"hyperparameters": {"k": null}}}"#, HyperFileFormat::Results),
            (r#"{"iris": [0.9]}"#, HyperFileFormat::Best),
        ];
        for (text, format) in cases {
            let err = parse_hyper_file(text, format).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{text}: {err}");
        }
    }

    #[test]
    fn test_missing_hyper_file() {
        let err = read_hyper_file(Path::new("/nonexistent/hyper.json"), HyperFileFormat::Best).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/hyper.json"));
    }
}
