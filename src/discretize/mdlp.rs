//! Fayyad–Irani MDLP cut-point selection
//!
//! Rows are sorted by value; a range is split at the candidate boundary that
//! minimises the weighted class entropy of both halves, and the split is kept
//! only if its information gain beats the MDL threshold
//! `(log2(N - 1) + delta) / N`. Candidates sit at the midpoint between two
//! adjacent distinct values.

#[derive(Debug, Clone, Copy)]
pub(super) struct Limits {
    pub min_length: usize,
    pub max_depth: usize,
    pub max_cuts: Option<usize>,
}

struct Split {
    cut: f64,
    gain: f64,
}

/// Ascending cut points for one continuous column.
pub(super) fn cut_points(values: &[f64], labels: &[u32], n_classes: usize, limits: Limits) -> Vec<f64> {
    let mut rows: Vec<(f64, u32)> = values.iter().copied().zip(labels.iter().copied()).collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut splits = Vec::new();
    split_range(&rows, n_classes, limits, 0, &mut splits);

    if let Some(max_cuts) = limits.max_cuts {
        if splits.len() > max_cuts {
            splits.sort_by(|a, b| b.gain.total_cmp(&a.gain));
            splits.truncate(max_cuts);
        }
    }
    let mut cuts: Vec<f64> = splits.into_iter().map(|s| s.cut).collect();
    cuts.sort_by(f64::total_cmp);
    cuts
}

fn split_range(rows: &[(f64, u32)], n_classes: usize, limits: Limits, depth: usize, out: &mut Vec<Split>) {
    if rows.len() < limits.min_length.max(2) || depth >= limits.max_depth {
        return;
    }
    let total = class_counts(rows, n_classes);
    let entropy_all = entropy(&total, rows.len());
    if entropy_all == 0.0 {
        return;
    }

    // Best boundary by weighted entropy, scanning left counts incrementally.
    let mut left = vec![0usize; n_classes];
    let mut best: Option<(usize, f64)> = None;
    for i in 1..rows.len() {
        left[rows[i - 1].1 as usize] += 1;
        if rows[i].0 == rows[i - 1].0 {
            continue;
        }
        let right: Vec<usize> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
        let weighted = weighted_entropy(&left, i, &right, rows.len() - i);
        if best.map_or(true, |(_, e)| weighted < e) {
            best = Some((i, weighted));
        }
    }
    let Some((index, weighted)) = best else {
        return;
    };

    let (lower, upper) = rows.split_at(index);
    let lower_counts = class_counts(lower, n_classes);
    let upper_counts = class_counts(upper, n_classes);
    let gain = entropy_all - weighted;
    if !accepts(
        rows.len(),
        gain,
        (&total, entropy_all),
        (&lower_counts, entropy(&lower_counts, lower.len())),
        (&upper_counts, entropy(&upper_counts, upper.len())),
    ) {
        return;
    }

    out.push(Split {
        cut: (rows[index - 1].0 + rows[index].0) / 2.0,
        gain,
    });
    split_range(lower, n_classes, limits, depth + 1, out);
    split_range(upper, n_classes, limits, depth + 1, out);
}

#[allow(clippy::cast_precision_loss)]
fn accepts(
    n: usize,
    gain: f64,
    all: (&[usize], f64),
    lower: (&[usize], f64),
    upper: (&[usize], f64),
) -> bool {
    let distinct = |counts: &[usize]| counts.iter().filter(|&&c| c > 0).count() as f64;
    let (k, k1, k2) = (distinct(all.0), distinct(lower.0), distinct(upper.0));
    let delta = (3f64.powf(k) - 2.0).log2() - (k * all.1 - k1 * lower.1 - k2 * upper.1);
    let n = n as f64;
    gain > ((n - 1.0).log2() + delta) / n
}

fn class_counts(rows: &[(f64, u32)], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &(_, label) in rows {
        counts[label as usize] += 1;
    }
    counts
}

#[allow(clippy::cast_precision_loss)]
fn entropy(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

#[allow(clippy::cast_precision_loss)]
fn weighted_entropy(left: &[usize], n_left: usize, right: &[usize], n_right: usize) -> f64 {
    let n = (n_left + n_right) as f64;
    (n_left as f64 / n) * entropy(left, n_left) + (n_right as f64 / n) * entropy(right, n_right)
}
