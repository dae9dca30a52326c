//! Small numeric helpers shared by the analytical engines

/// Arithmetic mean. Empty input yields 0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. Empty input yields 0.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Coefficient of variation as a percentage: stddev / mean * 100.
///
/// A zero or empty mean reports 100 (maximally irregular) rather than
/// dividing by zero; callers treat high CV as "no pattern".
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m <= 0.0 {
        return 100.0;
    }
    std_dev(values) / m * 100.0
}

/// Least-squares linear fit over `(index, value)` pairs.
///
/// Returns `(slope, intercept)` for x = 0..n-1, or `None` with fewer than
/// two points.
pub fn linear_fit(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = mean(values);

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        return None;
    }

    let slope = numerator / denominator;
    let intercept = y_mean - slope * x_mean;
    Some((slope, intercept))
}
