/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Standard deviation over mean. `None` when the mean is zero.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    if avg == 0.0 {
        return None;
    }
    Some(std_dev(values)? / avg)
}

/// Nearest-rank percentile on an ascending slice: `sorted[floor(n * p)]`, no interpolation.
pub fn nearest_rank(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    Some(sorted[idx])
}
