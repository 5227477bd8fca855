//! Area under the ROC curve (Mann–Whitney formulation)

use crate::{Error, Result};

/// ROC AUC from per-row class probabilities.
///
/// Two classes: AUC of class 1 scores against class 0. More classes: macro
/// average of one-vs-rest AUCs over the classes present with both positives
/// and negatives. Tied scores count one half. Returns `None` when no class
/// has both positive and negative rows.
///
/// # Errors
///
/// Returns [`Error::ShapeMismatch`] if `probabilities` does not have one row
/// per label or a row does not have `n_classes` columns, and
/// [`Error::LabelOutOfRange`] for labels outside `0..n_classes`.
pub fn roc_auc(truth: &[u32], probabilities: &[Vec<f64>], n_classes: usize) -> Result<Option<f64>> {
    if truth.len() != probabilities.len() {
        return Err(Error::ShapeMismatch {
            expected: truth.len(),
            actual: probabilities.len(),
        });
    }
    if let Some(row) = probabilities.iter().find(|row| row.len() != n_classes) {
        return Err(Error::ShapeMismatch {
            expected: n_classes,
            actual: row.len(),
        });
    }
    if let Some(&label) = truth.iter().find(|&&l| l as usize >= n_classes) {
        return Err(Error::LabelOutOfRange {
            label,
            classes: n_classes,
        });
    }

    if n_classes == 2 {
        return Ok(one_vs_rest(truth, probabilities, 1));
    }
    let scores: Vec<f64> = (0..n_classes)
        .filter_map(|class| one_vs_rest(truth, probabilities, class))
        .collect();
    if scores.is_empty() {
        return Ok(None);
    }
    #[allow(clippy::cast_precision_loss)]
    let n = scores.len() as f64;
    Ok(Some(scores.iter().sum::<f64>() / n))
}

#[allow(clippy::cast_precision_loss)]
fn one_vs_rest(truth: &[u32], probabilities: &[Vec<f64>], class: usize) -> Option<f64> {
    let mut scored: Vec<(f64, bool)> = truth
        .iter()
        .zip(probabilities)
        .map(|(&label, row)| (row[class], label as usize == class))
        .collect();
    let positives = scored.iter().filter(|(_, p)| *p).count();
    let negatives = scored.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Sum of positive ranks, ties sharing their average rank.
    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < scored.len() {
        let mut end = start + 1;
        while end < scored.len() && scored[end].0 == scored[start].0 {
            end += 1;
        }
        let average_rank = (start + end + 1) as f64 / 2.0;
        let tied_positives = scored[start..end].iter().filter(|(_, p)| *p).count();
        rank_sum += average_rank * tied_positives as f64;
        start = end;
    }
    let p = positives as f64;
    let n = negatives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}
