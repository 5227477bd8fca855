//! Equal-width and equal-frequency binning

/// `bins - 1` equally spaced cuts over `[min, max]` of the training values.
/// A constant column gets no cuts.
#[allow(clippy::cast_precision_loss)]
pub(super) fn uniform(values: &[f64], bins: usize) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if bins < 2 || max <= min {
        return Vec::new();
    }
    let width = (max - min) / bins as f64;
    (1..bins).map(|i| min + width * i as f64).collect()
}

/// Cuts at the `i / bins` quantiles (linear interpolation), deduplicated.
/// Cuts equal to the minimum are dropped so `b0` is never empty on the
/// training rows.
#[allow(clippy::cast_precision_loss)]
pub(super) fn quantile(values: &[f64], bins: usize) -> Vec<f64> {
    if bins < 2 || values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = (sorted.len() - 1) as f64;

    let mut cuts: Vec<f64> = Vec::with_capacity(bins - 1);
    for i in 1..bins {
        let position = last * i as f64 / bins as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lower = position.floor() as usize;
        let upper = (lower + 1).min(sorted.len() - 1);
        let fraction = position - lower as f64;
        let cut = sorted[lower] + (sorted[upper] - sorted[lower]) * fraction;
        if cut > sorted[0] && cuts.last().map_or(true, |&prev| cut > prev) {
            cuts.push(cut);
        }
    }
    cuts
}
