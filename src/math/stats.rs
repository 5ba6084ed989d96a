//! Descriptive statistics for series diagnostics.
//!
//! Autocorrelations drive the AR lesson: the ACF suggests how persistent a
//! series is, and the PACF (via Durbin-Levinson) suggests the AR order.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::AppError;

/// Two-sided p-value of a standard-normal statistic.
///
/// # Errors
/// Exit code 4 when the statistic is not finite.
pub fn two_sided_normal_p(z: f64) -> Result<f64, AppError> {
    if !z.is_finite() {
        return Err(AppError::runtime(format!("Non-finite test statistic {z}.")));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::runtime(format!("Standard normal unavailable: {e}")))?;
    Ok(2.0 * (1.0 - normal.cdf(z.abs())))
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with the n-1 denominator.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Median of a slice (averaging the middle pair for even lengths).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    }
}

/// Sample autocorrelations for lags `0..=max_lag`.
///
/// Uses the standard biased covariance estimator `c_k = (1/n) Σ (x_t - x̄)(x_{t+k} - x̄)`
/// normalized by `c_0`, so `acf[0] == 1`.
///
/// # Errors
/// - exit code 3 when the series is shorter than `max_lag + 2`
/// - exit code 4 when the series is constant (zero variance)
pub fn acf(values: &[f64], max_lag: usize) -> Result<Vec<f64>, AppError> {
    let n = values.len();
    if n < max_lag + 2 {
        return Err(AppError::insufficient(format!(
            "Series has {n} observations; need at least {} for {max_lag} lags.",
            max_lag + 2
        )));
    }

    let m = mean(values);
    let c0: f64 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
    if !(c0.is_finite() && c0 > 0.0) {
        return Err(AppError::runtime(
            "Series is constant; autocorrelations are undefined.",
        ));
    }

    let mut out = Vec::with_capacity(max_lag + 1);
    out.push(1.0);
    for k in 1..=max_lag {
        let ck: f64 = (0..n - k)
            .map(|t| (values[t] - m) * (values[t + k] - m))
            .sum::<f64>()
            / n as f64;
        out.push(ck / c0);
    }
    Ok(out)
}

/// Partial autocorrelations for lags `1..=max_lag` via Durbin-Levinson.
///
/// For an AR(p) process the PACF is (in expectation) zero beyond lag p,
/// which is what the order-selection diagnostics look for.
pub fn pacf(values: &[f64], max_lag: usize) -> Result<Vec<f64>, AppError> {
    if max_lag == 0 {
        return Ok(Vec::new());
    }
    let r = acf(values, max_lag)?;

    // Durbin-Levinson recursion. `phi` holds the AR coefficients of the
    // current-order autoregression; the lag-k PACF is its last element.
    let mut pacf = Vec::with_capacity(max_lag);
    let mut phi = vec![0.0_f64; max_lag + 1];
    let mut prev = vec![0.0_f64; max_lag + 1];

    phi[1] = r[1];
    pacf.push(r[1]);

    for k in 2..=max_lag {
        prev[..k].copy_from_slice(&phi[..k]);

        let num = r[k] - (1..k).map(|j| prev[j] * r[k - j]).sum::<f64>();
        let den = 1.0 - (1..k).map(|j| prev[j] * r[j]).sum::<f64>();
        if !(den.is_finite() && den.abs() > 1e-12) {
            return Err(AppError::runtime(
                "Durbin-Levinson recursion became degenerate; series may be near unit root.",
            ));
        }

        let phi_kk = num / den;
        for j in 1..k {
            phi[j] = prev[j] - phi_kk * prev[k - j];
        }
        phi[k] = phi_kk;
        pacf.push(phi_kk);
    }

    Ok(pacf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn ar1_series(n: usize, phi: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut x = 0.0_f64;
        // Burn in so the start point does not matter.
        for _ in 0..200 {
            x = phi * x + normal.sample(&mut rng);
        }
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            x = phi * x + normal.sample(&mut rng);
            out.push(x);
        }
        out
    }

    #[test]
    fn acf_lag_zero_is_one() {
        let xs = ar1_series(500, 0.5, 7);
        let r = acf(&xs, 5).unwrap();
        assert!((r[0] - 1.0).abs() < 1e-12);
        assert_eq!(r.len(), 6);
    }

    #[test]
    fn acf_of_ar1_decays_geometrically() {
        let xs = ar1_series(4000, 0.6, 11);
        let r = acf(&xs, 3).unwrap();
        assert!((r[1] - 0.6).abs() < 0.08, "lag-1 acf {} should be near 0.6", r[1]);
        assert!((r[2] - 0.36).abs() < 0.10, "lag-2 acf {} should be near 0.36", r[2]);
        assert!(r[1] > r[2] && r[2] > r[3], "acf should decay");
    }

    #[test]
    fn pacf_of_ar1_cuts_off_after_lag_one() {
        let xs = ar1_series(4000, 0.6, 13);
        let p = pacf(&xs, 4).unwrap();
        assert!((p[0] - 0.6).abs() < 0.08, "lag-1 pacf {} should be near 0.6", p[0]);
        for (lag, v) in p.iter().enumerate().skip(1) {
            assert!(
                v.abs() < 0.15,
                "pacf at lag {} should be near zero, got {v}",
                lag + 1
            );
        }
    }

    #[test]
    fn acf_rejects_constant_series() {
        let xs = vec![3.0; 50];
        let err = acf(&xs, 3).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
