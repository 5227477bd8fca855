//! Experiment description and platform settings tests

use bayesbench::config::{Settings, ENV_OUTPUT, ENV_WORKERS};
use bayesbench::experiment::ExperimentSpec;
use bayesbench::{ClassifierRegistry, Error};
use std::io::Write;
use std::time::Duration;

const EXPERIMENT: &str = r#"{
    "title": "uci-small",
    "datasets": ["iris", {"name": "glass", "class_name": "Type"}],
    "classifiers": [
        {"name": "TAN"},
        {"name": "KNN", "label": "KNN-grid", "grid": {"k": [1, 5]}, "discretize": false}
    ],
    "folds": {"k": 10, "repetitions": 3, "seed": 271, "stratified": true},
    "discretization": {"enabled": true, "algorithm": "mdlp4"},
    "time_budget_secs": 30.0,
    "score_train": true
}"#;

#[test]
fn test_experiment_file_parsed_and_validated() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(EXPERIMENT.as_bytes()).unwrap();
    let spec = ExperimentSpec::from_path(file.path()).unwrap();

    spec.validate(&ClassifierRegistry::with_builtins()).unwrap();
    assert_eq!(spec.title, "uci-small");
    assert_eq!(spec.datasets[1].class_name.as_deref(), Some("Type"));
    assert_eq!(spec.folds.total_folds(), 30);
    assert_eq!(spec.time_budget(), Some(Duration::from_secs(30)));

    let groups = spec.groups();
    // 2 datasets × (TAN + KNN with two values of k)
    assert_eq!(groups.len(), 6);
    assert_eq!(groups[1].classifier, "KNN-grid");
    assert_eq!(groups[3].dataset, "glass");
}

#[test]
fn test_missing_experiment_file() {
    let err = ExperimentSpec::from_path("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_mistyped_fields_are_configuration_errors() {
    let err = ExperimentSpec::from_json(r#"{"datasets": ["iris"], "classifiers": [{"name": "TAN"}], "folds": {"k": "ten"}}"#)
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_invalid_budget_rejected() {
    let text = EXPERIMENT.replace("30.0", "-1.0");
    let spec = ExperimentSpec::from_json(&text).unwrap();
    assert!(spec.time_budget().is_none());
    let err = spec.validate(&ClassifierRegistry::with_builtins()).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_settings_from_lookup() {
    let settings = Settings::from_lookup(|key| match key {
        k if k == ENV_OUTPUT => Some("/tmp/bench".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(settings.output_file("r.json"), std::path::Path::new("/tmp/bench/r.json"));
    assert_eq!(settings.workers, None);
}

#[test]
fn test_settings_reject_zero_workers() {
    let err = Settings::from_lookup(|key| (key == ENV_WORKERS).then(|| "0".to_string())).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
