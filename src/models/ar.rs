//! Autoregressive models fit by conditional least squares.
//!
//! An AR(p) regresses each observation on its previous `p` values plus a
//! constant. Order selection computes:
//! - SSE on a common estimation sample (first `max_order` rows held back)
//! - BIC = n * ln(SSE/n) + k * ln(n)
//!
//! Selection rules:
//! 1. Exclude underdetermined orders: require enough rows for `p + 1` terms
//! 2. Choose the order with minimum BIC
//! 3. If ΔBIC < 2 between the best and a lower order, pick the lower order

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use super::{CoefRow, coef_rows};
use crate::error::AppError;
use crate::math::fit_ols;

/// A fitted AR(p) model.
#[derive(Debug, Clone, Serialize)]
pub struct ArFit {
    pub order: usize,
    pub intercept: f64,
    /// Lag coefficients, `phi[0]` on the most recent lag.
    pub phi: Vec<f64>,
    pub coef: Vec<CoefRow>,
    pub sigma2: f64,
    pub bic: f64,
    pub r_squared: f64,
    /// Rows actually regressed (series length minus `order`).
    pub n_used: usize,
}

/// One candidate order from the selection sweep.
#[derive(Debug, Clone, Serialize)]
pub struct OrderCandidate {
    pub order: usize,
    pub bic: f64,
    pub sigma2: f64,
}

/// Output of the BIC sweep over candidate orders.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSelection {
    pub candidates: Vec<OrderCandidate>,
    pub chosen: usize,
}

/// Sweep orders `0..=max_order`, scoring each on the same estimation sample.
///
/// # Errors
/// Exit code 3 when the series is too short to fit the largest candidate.
pub fn select_ar_order(values: &[f64], max_order: usize) -> Result<OrderSelection, AppError> {
    let n = values.len();
    if n < 2 * max_order + 3 {
        return Err(AppError::insufficient(format!(
            "Order selection up to AR({max_order}) needs at least {} observations, have {n}.",
            2 * max_order + 3
        )));
    }

    let n_common = n - max_order;
    let mut candidates = Vec::with_capacity(max_order + 1);
    for order in 0..=max_order {
        let (design, response) = lag_design(values, order, max_order);
        let fit = fit_ols(&design, &response)?;
        let sse: f64 = fit.residuals.iter().map(|r| r * r).sum();
        candidates.push(OrderCandidate {
            order,
            bic: bic(n_common, sse, order + 1),
            sigma2: fit.sigma2,
        });
    }

    Ok(OrderSelection {
        chosen: select_by_bic(&candidates),
        candidates,
    })
}

/// Fit AR(`order`) on the full conditional sample (rows `order..n`).
///
/// # Errors
/// Exit code 3 when the series is too short for the requested order.
pub fn fit_ar(values: &[f64], order: usize) -> Result<ArFit, AppError> {
    let n = values.len();
    if n < 2 * order + 3 {
        return Err(AppError::insufficient(format!(
            "AR({order}) needs at least {} observations, have {n}.",
            2 * order + 3
        )));
    }

    let (design, response) = lag_design(values, order, order);
    let fit = fit_ols(&design, &response)?;
    let sse: f64 = fit.residuals.iter().map(|r| r * r).sum();

    let mut names = vec!["const".to_string()];
    for lag in 1..=order {
        names.push(format!("lag {lag}"));
    }

    Ok(ArFit {
        order,
        intercept: fit.coef[0],
        phi: fit.coef[1..].to_vec(),
        coef: coef_rows(&names, &fit),
        sigma2: fit.sigma2,
        bic: bic(n - order, sse, order + 1),
        r_squared: fit.r_squared,
        n_used: n - order,
    })
}

impl ArFit {
    /// Iterated point forecast for `horizon` steps past the end of `history`.
    ///
    /// # Errors
    /// Exit code 3 when `history` is shorter than the model order.
    pub fn forecast(&self, history: &[f64], horizon: usize) -> Result<Vec<f64>, AppError> {
        if history.len() < self.order {
            return Err(AppError::insufficient(format!(
                "Forecasting an AR({}) needs {} trailing observations, have {}.",
                self.order,
                self.order,
                history.len()
            )));
        }
        let mut window: Vec<f64> = history[history.len() - self.order..].to_vec();
        let mut out = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let mut next = self.intercept;
            for (lag, phi) in self.phi.iter().enumerate() {
                next += phi * window[window.len() - 1 - lag];
            }
            out.push(next);
            if self.order > 0 {
                window.remove(0);
                window.push(next);
            }
        }
        Ok(out)
    }

    /// `c / (1 - sum(phi))`, the level iterated forecasts settle toward.
    ///
    /// `None` when the lag polynomial puts the process at or near a unit
    /// root, where no finite long-run level exists.
    pub fn long_run_mean(&self) -> Option<f64> {
        let denom = 1.0 - self.phi.iter().sum::<f64>();
        if denom.abs() < 1e-8 {
            None
        } else {
            Some(self.intercept / denom)
        }
    }
}

/// Rows `start..n`: response `v[t]`, regressors `1, v[t-1], ..., v[t-order]`.
fn lag_design(values: &[f64], order: usize, start: usize) -> (DMatrix<f64>, DVector<f64>) {
    let rows = values.len() - start;
    let design = DMatrix::from_fn(rows, order + 1, |r, c| {
        if c == 0 {
            1.0
        } else {
            values[start + r - c]
        }
    });
    let response = DVector::from_fn(rows, |r, _| values[start + r]);
    (design, response)
}

fn bic(n: usize, sse: f64, k: usize) -> f64 {
    let n_f = n as f64;
    let sse_per = (sse / n_f).max(1e-12);
    n_f * sse_per.ln() + (k as f64) * n_f.ln()
}

fn select_by_bic(candidates: &[OrderCandidate]) -> usize {
    let mut best = &candidates[0];
    for c in &candidates[1..] {
        if c.bic < best.bic {
            best = c;
        }
    }

    // Prefer the lowest order within 2 BIC points of the best.
    for c in candidates {
        if c.bic <= best.bic + 2.0 {
            return c.order;
        }
    }
    best.order
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn ar2_series(n: usize, c: f64, phi1: f64, phi2: f64, sigma: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, sigma).unwrap();
        let mean = c / (1.0 - phi1 - phi2);
        let mut prev2 = mean;
        let mut prev1 = mean;
        let mut out = Vec::with_capacity(n);
        for i in 0..(n + 300) {
            let next = c + phi1 * prev1 + phi2 * prev2 + noise.sample(&mut rng);
            prev2 = prev1;
            prev1 = next;
            if i >= 300 {
                out.push(next);
            }
        }
        out
    }

    #[test]
    fn recovers_ar2_coefficients() {
        let series = ar2_series(2000, 1.0, 0.5, 0.2, 1.0, 21);
        let fit = fit_ar(&series, 2).unwrap();

        assert!((fit.phi[0] - 0.5).abs() < 0.08, "phi1 {}", fit.phi[0]);
        assert!((fit.phi[1] - 0.2).abs() < 0.08, "phi2 {}", fit.phi[1]);
        assert!((fit.sigma2 - 1.0).abs() < 0.15, "sigma2 {}", fit.sigma2);
        assert_eq!(fit.coef.len(), 3);
        assert_eq!(fit.n_used, 1998);
    }

    #[test]
    fn selection_finds_the_true_order() {
        let series = ar2_series(2000, 1.0, 0.5, 0.2, 1.0, 22);
        let selection = select_ar_order(&series, 6).unwrap();
        assert_eq!(selection.chosen, 2);
        assert_eq!(selection.candidates.len(), 7);
    }

    #[test]
    fn white_noise_prefers_low_order() {
        let mut rng = StdRng::seed_from_u64(23);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let series: Vec<f64> = (0..800).map(|_| noise.sample(&mut rng)).collect();

        let selection = select_ar_order(&series, 4).unwrap();
        assert!(selection.chosen <= 1, "chose {}", selection.chosen);
    }

    #[test]
    fn forecast_settles_at_the_long_run_mean() {
        let series = ar2_series(2000, 1.0, 0.5, 0.2, 1.0, 24);
        let fit = fit_ar(&series, 2).unwrap();
        let mean = fit.long_run_mean().unwrap();

        let path = fit.forecast(&series, 200).unwrap();
        let last = *path.last().unwrap();
        assert!(
            (last - mean).abs() < 1e-3,
            "forecast {last} vs long-run mean {mean}"
        );
    }

    #[test]
    fn order_zero_forecasts_the_intercept() {
        let series = ar2_series(500, 2.0, 0.3, 0.1, 1.0, 25);
        let fit = fit_ar(&series, 0).unwrap();
        let path = fit.forecast(&series, 3).unwrap();
        for v in path {
            assert!((v - fit.intercept).abs() < 1e-12);
        }
    }

    #[test]
    fn short_series_is_rejected() {
        let series = vec![1.0, 2.0, 3.0];
        assert_eq!(fit_ar(&series, 2).unwrap_err().exit_code(), 3);
        assert_eq!(select_ar_order(&series, 2).unwrap_err().exit_code(), 3);
    }
}
