//! Tests for error types

use bayesbench::{Error, FailureKind};

#[test]
fn test_configuration_error() {
    let error = Error::Configuration("fold count must be at least 2".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Configuration error"));
    assert!(error_str.contains("at least 2"));
    assert!(error.is_fatal());
    assert!(!error.is_trial_local());
}

#[test]
fn test_shape_mismatch_error() {
    let error = Error::ShapeMismatch {
        expected: 10,
        actual: 9,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("expected 10 labels, got 9"));
    assert!(error_str.contains("Please report this issue"));
    assert_eq!(error.failure_kind(), FailureKind::ContractViolation);
}

#[test]
fn test_time_budget_error() {
    let error = Error::TimeBudgetExceeded {
        elapsed_ms: 1250,
        budget_ms: 1000,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("1250 ms elapsed"));
    assert!(error_str.contains("budget 1000 ms"));
    assert!(error.is_trial_local());
    assert_eq!(error.failure_kind(), FailureKind::TimeBudgetExceeded);
}

#[test]
fn test_trial_local_errors() {
    let training = Error::Training("singular covariance".to_string());
    let inference = Error::Inference("unseen state".to_string());
    let schema = Error::SchemaViolation("continuous feature x".to_string());
    assert_eq!(training.failure_kind(), FailureKind::Training);
    assert_eq!(inference.failure_kind(), FailureKind::Inference);
    assert_eq!(schema.failure_kind(), FailureKind::Training);
    assert!([training, inference, schema].iter().all(Error::is_trial_local));
}

#[test]
fn test_dataset_errors_fail_the_dataset() {
    let error = Error::DatasetNotFound("iris".to_string());
    assert!(format!("{error}").contains("Dataset not found: iris"));
    assert_eq!(error.failure_kind(), FailureKind::DatasetUnavailable);
    assert!(!error.is_fatal());
}

#[test]
fn test_report_error_is_fatal() {
    let error = Error::Report("results.xlsx: permission denied".to_string());
    assert!(format!("{error}").contains("Report error"));
    assert!(error.is_fatal());
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
    assert_eq!(error.failure_kind(), FailureKind::Internal);
}

#[test]
fn test_failure_kind_labels() {
    assert_eq!(FailureKind::TimeBudgetExceeded.label(), "time budget");
    assert_eq!(FailureKind::DatasetUnavailable.label(), "dataset unavailable");
    assert_eq!(FailureKind::Panic.label(), "panic");
}
