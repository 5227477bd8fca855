//! Platform settings
//!
//! Where datasets live, where reports go and how the platform names itself.
//! Defaults are overridden by environment variables, which command-line
//! flags override in turn:
//!
//! | Variable | Setting |
//! |---|---|
//! | `BAYESBENCH_DATASETS` | dataset directory (default `datasets`) |
//! | `BAYESBENCH_OUTPUT` | report directory (default `results`) |
//! | `BAYESBENCH_PLATFORM` | platform name in run records |
//! | `BAYESBENCH_WORKERS` | worker threads (default: available cores) |

use crate::experiment::DEFAULT_PLATFORM;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the dataset directory.
pub const ENV_DATASETS: &str = "BAYESBENCH_DATASETS";
/// Environment variable naming the report directory.
pub const ENV_OUTPUT: &str = "BAYESBENCH_OUTPUT";
/// Environment variable naming the platform.
pub const ENV_PLATFORM: &str = "BAYESBENCH_PLATFORM";
/// Environment variable fixing the worker count.
pub const ENV_WORKERS: &str = "BAYESBENCH_WORKERS";

/// Platform settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory the dataset provider reads from
    pub datasets: PathBuf,
    /// Directory reports are written to
    pub output: PathBuf,
    /// Platform name recorded in run records
    pub platform: String,
    /// Worker threads; `None` uses every available core
    pub workers: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            datasets: PathBuf::from("datasets"),
            output: PathBuf::from("results"),
            platform: DEFAULT_PLATFORM.to_string(),
            workers: None,
        }
    }
}

impl Settings {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a variable holds an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(dir) = value(ENV_DATASETS) {
            settings.datasets = PathBuf::from(dir);
        }
        if let Some(dir) = value(ENV_OUTPUT) {
            settings.output = PathBuf::from(dir);
        }
        if let Some(platform) = value(ENV_PLATFORM) {
            settings.platform = platform;
        }
        if let Some(workers) = value(ENV_WORKERS) {
            settings.workers = match workers.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    return Err(Error::Configuration(format!(
                        "{ENV_WORKERS} must be a positive integer, got {workers}"
                    )))
                }
            };
        }
        Ok(settings)
    }

    /// Path of a report file named `file_name` inside the output directory.
    #[must_use]
    pub fn output_file(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.output.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.platform, "bayesbench");
    }

    #[test]
    fn test_environment_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_DATASETS, "/data/uci"),
            (ENV_PLATFORM, "lab-7"),
            (ENV_WORKERS, " 4 "),
            (ENV_OUTPUT, ""),
        ]))
        .unwrap();
        assert_eq!(settings.datasets, PathBuf::from("/data/uci"));
        assert_eq!(settings.platform, "lab-7");
        assert_eq!(settings.workers, Some(4));
        assert_eq!(settings.output, PathBuf::from("results"));
        assert_eq!(settings.output_file("run.xlsx"), PathBuf::from("results/run.xlsx"));
    }

    #[test]
    fn test_invalid_workers() {
        for bad in ["0", "many", "-2"] {
            let err = Settings::from_lookup(lookup(&[(ENV_WORKERS, bad)])).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)));
        }
    }
}
