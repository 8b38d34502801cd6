//! Confidence score checks used by the threshold and filing steps

/// True when at least one score reaches `threshold` (inclusive)
pub fn meets_threshold(scores: &[f64], threshold: f64) -> bool {
    scores.iter().any(|&score| score >= threshold)
}

/// Index of the highest score, first occurrence on ties
///
/// NaN scores never win. Returns `None` for an empty (or all-NaN) vector.
pub fn arg_max(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Highest score, for diagnostics
pub fn best_score(scores: &[f64]) -> Option<f64> {
    arg_max(scores).map(|index| scores[index])
}
