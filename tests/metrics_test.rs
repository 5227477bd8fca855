//! Metric evaluator tests
//!
//! Properties of `evaluate` and `roc_auc` over arbitrary label sequences,
//! plus the contract violations the orchestrator relies on.

use bayesbench::metrics::{evaluate, roc_auc, LabelSpace};
use bayesbench::Error;
use proptest::prelude::*;

fn space(n: usize) -> LabelSpace {
    LabelSpace::numbered(n)
}

// ============================================================================
// Strategies
// ============================================================================

/// Class count and a non-empty truth sequence over it.
fn arb_truth() -> impl Strategy<Value = (usize, Vec<u32>)> {
    (2usize..6).prop_flat_map(|n| {
        #[allow(clippy::cast_possible_truncation)]
        let labels = prop::collection::vec(0..n as u32, 1..300);
        (Just(n), labels)
    })
}

/// Truth and an arbitrary prediction of the same length.
fn arb_pair() -> impl Strategy<Value = (usize, Vec<u32>, Vec<u32>)> {
    arb_truth().prop_flat_map(|(n, truth)| {
        #[allow(clippy::cast_possible_truncation)]
        let predicted = prop::collection::vec(0..n as u32, truth.len());
        (Just(n), Just(truth), predicted)
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Predicting the truth scores 1 everywhere that has support.
    #[test]
    fn prop_perfect_predictions((n, truth) in arb_truth()) {
        let bundle = evaluate(&truth, &truth, &space(n)).unwrap();
        prop_assert!((bundle.accuracy - 1.0).abs() < f64::EPSILON);
        prop_assert!((bundle.weighted_f1 - 1.0).abs() < 1e-12);
        for class in bundle.per_class.iter().filter(|c| c.support > 0) {
            prop_assert!((class.f1 - 1.0).abs() < 1e-12);
        }
    }

    /// Scores stay in [0, 1] and the confusion matrix accounts for every row.
    #[test]
    fn prop_scores_bounded((n, truth, predicted) in arb_pair()) {
        let bundle = evaluate(&truth, &predicted, &space(n)).unwrap();
        prop_assert_eq!(bundle.confusion.total(), truth.len() as u64);
        for score in [bundle.accuracy, bundle.macro_f1, bundle.weighted_f1] {
            prop_assert!((0.0..=1.0).contains(&score));
        }
        let support: u64 = bundle.per_class.iter().map(|c| c.support).sum();
        prop_assert_eq!(support, truth.len() as u64);
    }

    /// Accuracy is the diagonal share of the confusion matrix.
    #[test]
    fn prop_accuracy_matches_confusion((n, truth, predicted) in arb_pair()) {
        let bundle = evaluate(&truth, &predicted, &space(n)).unwrap();
        let agree = truth.iter().zip(&predicted).filter(|(a, b)| a == b).count();
        #[allow(clippy::cast_precision_loss)]
        let expected = agree as f64 / truth.len() as f64;
        prop_assert!((bundle.accuracy - expected).abs() < 1e-12);
        prop_assert_eq!(bundle.confusion.correct(), agree as u64);
    }

    /// AUC of any probability assignment lies in [0, 1].
    #[test]
    fn prop_auc_bounded((n, truth) in arb_truth(), seed in any::<u64>()) {
        #[allow(clippy::cast_precision_loss)]
        let probabilities: Vec<Vec<f64>> = (0..truth.len())
            .map(|row| {
                let raw: Vec<f64> = (0..n)
                    .map(|c| ((seed ^ (row * 31 + c) as u64) % 97) as f64 + 1.0)
                    .collect();
                let total: f64 = raw.iter().sum();
                raw.into_iter().map(|v| v / total).collect()
            })
            .collect();
        if let Some(auc) = roc_auc(&truth, &probabilities, n).unwrap() {
            prop_assert!((0.0..=1.0).contains(&auc));
        }
    }
}

// ============================================================================
// Contract violations
// ============================================================================

#[test]
fn test_length_mismatch_is_contract_violation() {
    let err = evaluate(&[0, 1, 1], &[0, 1], &space(2)).unwrap_err();
    assert!(matches!(
        err,
        Error::ShapeMismatch {
            expected: 3,
            actual: 2
        }
    ));
    assert_eq!(err.failure_kind(), bayesbench::FailureKind::ContractViolation);
}

#[test]
fn test_empty_sequences_rejected() {
    assert!(matches!(
        evaluate(&[], &[], &space(2)),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn test_label_outside_space_rejected() {
    let err = evaluate(&[0, 1], &[0, 3], &space(2)).unwrap_err();
    assert!(matches!(err, Error::LabelOutOfRange { label: 3, classes: 2 }));
}

#[test]
fn test_perfect_ranking_has_unit_auc() {
    let truth = [0, 0, 1, 1];
    let probabilities = vec![
        vec![0.9, 0.1],
        vec![0.7, 0.3],
        vec![0.4, 0.6],
        vec![0.2, 0.8],
    ];
    let auc = roc_auc(&truth, &probabilities, 2).unwrap().unwrap();
    assert!((auc - 1.0).abs() < 1e-12);
}

#[test]
fn test_single_class_has_no_auc() {
    let probabilities = vec![vec![0.5, 0.5]; 3];
    assert_eq!(roc_auc(&[1, 1, 1], &probabilities, 2).unwrap(), None);
}
