//! Report writer tests
//!
//! Every writer gets the same report: one healthy group and one group whose
//! dataset is missing.

use bayesbench::dataset::{Column, Dataset, Feature, InMemoryProvider};
use bayesbench::experiment::{ClassifierEntry, ExperimentSpec, Orchestrator, RunReport};
use bayesbench::report::{ConsoleReport, ExcelReportWriter, JsonReportWriter, ReportWriter, NOT_AVAILABLE};
use bayesbench::{ClassifierRegistry, Error};
use std::sync::Arc;

fn report() -> RunReport {
    let rows = 30u32;
    let dataset = Dataset::new(
        "line",
        vec![Feature::new("x", Column::Continuous((0..rows).map(f64::from).collect()))],
        "class",
        vec!["lo".into(), "hi".into()],
        (0..rows).map(|i| u32::from(i >= rows / 2)).collect(),
    )
    .unwrap();
    let spec = ExperimentSpec::builder("report: line vs missing")
        .dataset("line")
        .dataset("missing")
        .classifier(ClassifierEntry::new("NaiveBayes"))
        .k(3)
        .build();
    let provider = InMemoryProvider::new().with_dataset(dataset);
    Orchestrator::new(Arc::new(spec), ClassifierRegistry::with_builtins(), Arc::new(provider))
        .with_platform("test-rig")
        .run()
        .unwrap()
}

#[test]
fn test_excel_report_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.xlsx");
    let mut writer = ExcelReportWriter::new(&path);
    writer.write(&report()).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    // xlsx files are zip archives
    assert!(bytes.starts_with(b"PK"));
    assert_eq!(writer.path(), path.as_path());
}

#[test]
fn test_excel_unwritable_destination_is_report_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("results.xlsx");
    let err = ExcelReportWriter::new(path).write(&report()).unwrap_err();
    assert!(matches!(err, Error::Report(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_json_report_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let original = report();
    JsonReportWriter::new(&path).write(&original).unwrap();

    let restored = JsonReportWriter::read(&path).unwrap();
    assert_eq!(restored.record.run_id(), original.record.run_id());
    assert_eq!(restored.record.platform(), "test-rig");
    assert_eq!(restored.trials.len(), original.trials.len());
    assert_eq!(restored.groups.len(), 2);
    for (a, b) in restored.groups.iter().zip(&original.groups) {
        assert_eq!(a.key, b.key);
        assert_eq!(a.succeeded_folds, b.succeeded_folds);
        assert_eq!(a.group_failed, b.group_failed);
        match (a.accuracy(), b.accuracy()) {
            (Some(x), Some(y)) => assert!((x - y).abs() < 1e-12),
            (None, None) => {}
            other => panic!("accuracy changed: {other:?}"),
        }
    }
}

#[test]
fn test_json_read_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(JsonReportWriter::read(&path), Err(Error::Report(_))));
}

#[test]
fn test_console_marks_failed_group_unavailable() {
    let mut console = ConsoleReport::new(Vec::new());
    console.write(&report()).unwrap();
    let text = String::from_utf8(console.into_inner()).unwrap();

    assert!(text.contains("report: line vs missing"));
    let missing = text
        .lines()
        .find(|l| l.starts_with("missing"))
        .expect("row for the missing dataset");
    assert!(missing.contains(NOT_AVAILABLE));
    assert!(!missing.contains("0.0000"));
    assert!(text.contains("dataset unavailable"));

    let line = text.lines().find(|l| l.starts_with("line")).unwrap();
    assert!(line.contains("3/3"));
}
