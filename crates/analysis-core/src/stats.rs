//! Small numeric helpers shared by the scoring and aggregation crates.
//!
//! Everything here is total: empty or degenerate inputs produce a neutral
//! value instead of NaN so that results can be serialized without checks.

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Compute population standard deviation (divides by n).
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Pearson correlation over the common prefix of two slices.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }

    let a = &a[..n];
    let b = &b[..n];
    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 { 0.0 } else { finite_or(cov / denom, 0.0) }
}

/// Beta of `returns` against `benchmark`; 1.0 when the benchmark has no variance.
pub fn beta(returns: &[f64], benchmark: &[f64]) -> f64 {
    let n = returns.len().min(benchmark.len());
    if n < 2 {
        return 1.0;
    }

    let r = &returns[..n];
    let b = &benchmark[..n];
    let mean_r = mean(r);
    let mean_b = mean(b);

    let mut cov = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let db = b[i] - mean_b;
        cov += (r[i] - mean_r) * db;
        var_b += db * db;
    }

    if var_b == 0.0 { 1.0 } else { finite_or(cov / var_b, 1.0) }
}

/// Replace NaN and infinities with `fallback`.
#[inline]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data) - 5.0).abs() < 1e-12);
        assert!((population_std_dev(&data) - 2.0).abs() < 1e-12);
        assert!(std_dev(&data) > population_std_dev(&data));
    }

    #[test]
    fn test_degenerate_inputs_are_neutral() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[1.0]), 0.0);
        assert_eq!(population_std_dev(&[]), 0.0);
        assert_eq!(pearson_correlation(&[1.0], &[2.0]), 0.0);
        assert_eq!(beta(&[0.1, 0.2], &[0.0, 0.0]), 1.0);
    }

    #[test]
    fn test_correlation_sign() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![2.0, 4.0, 6.0, 8.0];
        let c = vec![8.0, 6.0, 4.0, 2.0];
        assert!((pearson_correlation(&a, &b) - 1.0).abs() < 1e-12);
        assert!((pearson_correlation(&a, &c) + 1.0).abs() < 1e-12);
        assert!((beta(&b, &a) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_finite_or() {
        assert_eq!(finite_or(f64::NAN, 3.0), 3.0);
        assert_eq!(finite_or(f64::INFINITY, 0.0), 0.0);
        assert_eq!(finite_or(1.5, 0.0), 1.5);
    }
}
