//! Distance kernel equivalence
//!
//! The SIMD squared-distance kernel used by KNN must agree with a plain
//! scalar loop on arbitrary inputs.

use bayesbench::classifier::generic::squared_distance;
use quickcheck::{quickcheck, TestResult};

/// Scalar reference: sum of squared differences.
fn scalar_squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Small integer inputs keep the values finite and the comparison exact
/// up to rounding.
fn to_f32(values: &[i8]) -> Vec<f32> {
    values.iter().map(|&v| f32::from(v) / 8.0).collect()
}

fn kernel_matches_scalar(pairs: Vec<(i8, i8)>) -> TestResult {
    if pairs.is_empty() {
        return TestResult::discard();
    }
    let (a, b): (Vec<i8>, Vec<i8>) = pairs.into_iter().unzip();
    let (a, b) = (to_f32(&a), to_f32(&b));
    let expected = scalar_squared_distance(&a, &b);
    let Ok(actual) = squared_distance(&a, &b) else {
        return TestResult::failed();
    };
    let magnitude: f32 = a.iter().chain(&b).map(|v| v * v).sum();
    let tolerance = 1e-4 * (magnitude + 1.0);
    TestResult::from_bool(actual >= 0.0 && (actual - expected).abs() <= tolerance)
}

fn kernel_symmetric(pairs: Vec<(i8, i8)>) -> TestResult {
    if pairs.is_empty() {
        return TestResult::discard();
    }
    let (a, b): (Vec<i8>, Vec<i8>) = pairs.into_iter().unzip();
    let (a, b) = (to_f32(&a), to_f32(&b));
    let magnitude: f32 = a.iter().chain(&b).map(|v| v * v).sum();
    match (squared_distance(&a, &b), squared_distance(&b, &a)) {
        (Ok(ab), Ok(ba)) => TestResult::from_bool((ab - ba).abs() <= 1e-4 * (magnitude + 1.0)),
        _ => TestResult::failed(),
    }
}

#[test]
fn test_kernel_matches_scalar() {
    quickcheck(kernel_matches_scalar as fn(Vec<(i8, i8)>) -> TestResult);
}

#[test]
fn test_kernel_symmetric() {
    quickcheck(kernel_symmetric as fn(Vec<(i8, i8)>) -> TestResult);
}

#[test]
fn test_identical_points_have_zero_distance() {
    let a = to_f32(&[3, -7, 12, 0, 5]);
    let d = squared_distance(&a, &a).unwrap();
    assert!(d.abs() < 1e-4);
}

#[test]
fn test_length_mismatch_rejected() {
    assert!(squared_distance(&[1.0, 2.0], &[1.0]).is_err());
}
