//! Logit regression by maximum likelihood.
//!
//! Coefficients come from L-BFGS on the Bernoulli negative log-likelihood,
//! standard errors from the inverse observed information `(X' V X)^-1` with
//! `V = diag(p(1-p))`, and fit quality from McFadden's pseudo R-squared
//! against the intercept-only likelihood.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use super::CoefRow;
use crate::error::AppError;
use crate::likelihood::{BernoulliLogit, sigmoid};
use crate::math::two_sided_normal_p;
use crate::optim::minimize_lbfgs;

/// A fitted logit model.
#[derive(Debug, Clone, Serialize)]
pub struct LogitFit {
    pub coef: Vec<CoefRow>,
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub mcfadden_r2: f64,
    pub n: usize,
    pub iterations: u64,
    pub converged: bool,
}

/// Fit a logit on a prepared design matrix (intercept column included by the
/// caller). `names` labels the design columns, in order.
///
/// Perfectly separated data drifts toward huge coefficients; the iteration
/// cap turns that into a reported non-convergence rather than a hang.
///
/// # Errors
/// Exit code 3 when rows do not comfortably exceed columns, exit code 4 when
/// the response never varies or the information matrix is singular.
pub fn fit_logit(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    names: &[String],
    max_iters: u64,
) -> Result<LogitFit, AppError> {
    let n = x.nrows();
    let k = x.ncols();
    if n < k + 2 {
        return Err(AppError::insufficient(format!(
            "Logit needs at least {} observations for {k} coefficients, have {n}.",
            k + 2
        )));
    }

    let y_bar = y.iter().sum::<f64>() / n as f64;
    if y_bar <= 0.0 || y_bar >= 1.0 {
        return Err(AppError::runtime(
            "Binary response never varies; the model is not identified.",
        ));
    }

    let nll = BernoulliLogit::new(x, y)?;
    let solved = minimize_lbfgs(&nll, &vec![0.0; k], max_iters)?;
    let beta = solved.params;
    let log_likelihood = -solved.value;

    // Observed information at the optimum.
    let mut info: DMatrix<f64> = DMatrix::zeros(k, k);
    for i in 0..n {
        let mut eta = 0.0;
        for (j, b) in beta.iter().enumerate() {
            eta += x[(i, j)] * b;
        }
        let p = sigmoid(eta);
        let weight = p * (1.0 - p);
        for a in 0..k {
            for b in 0..k {
                info[(a, b)] += weight * x[(i, a)] * x[(i, b)];
            }
        }
    }
    let cov = info.try_inverse().ok_or_else(|| {
        AppError::runtime(
            "Observed information is singular; check for separation or collinearity.",
        )
    })?;

    let mut coef = Vec::with_capacity(k);
    for (j, name) in names.iter().enumerate() {
        let variance = cov[(j, j)];
        if !(variance.is_finite() && variance >= 0.0) {
            return Err(AppError::runtime("Non-finite coefficient variance."));
        }
        let std_err = variance.sqrt();
        let stat = if std_err > 0.0 { beta[j] / std_err } else { 0.0 };
        coef.push(CoefRow {
            name: name.clone(),
            estimate: beta[j],
            std_err,
            stat,
            p_value: two_sided_normal_p(stat)?,
        });
    }

    let null_log_likelihood =
        n as f64 * (y_bar * y_bar.ln() + (1.0 - y_bar) * (1.0 - y_bar).ln());
    let mcfadden_r2 = 1.0 - log_likelihood / null_log_likelihood;

    Ok(LogitFit {
        coef,
        log_likelihood,
        null_log_likelihood,
        mcfadden_r2,
        n,
        iterations: solved.iterations,
        converged: solved.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rand_distr::{Distribution, Normal};

    fn names(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recovers_coefficients_from_simulated_outcomes() {
        let n = 1500;
        let mut rng = StdRng::seed_from_u64(51);
        let x_dist = Normal::new(0.0, 1.0).unwrap();

        let mut design = DMatrix::zeros(n, 2);
        let mut y = DVector::zeros(n);
        for i in 0..n {
            let xi = x_dist.sample(&mut rng);
            design[(i, 0)] = 1.0;
            design[(i, 1)] = xi;
            let p = sigmoid(-0.5 + 1.2 * xi);
            y[i] = if rng.r#gen::<f64>() < p { 1.0 } else { 0.0 };
        }

        let fit = fit_logit(&design, &y, &names(&["const", "x"]), 300).unwrap();
        assert!(
            (fit.coef[0].estimate + 0.5).abs() < 0.2,
            "const {}",
            fit.coef[0].estimate
        );
        assert!(
            (fit.coef[1].estimate - 1.2).abs() < 0.2,
            "slope {}",
            fit.coef[1].estimate
        );
        assert!(fit.converged, "did not converge");
        assert!(fit.mcfadden_r2 > 0.0 && fit.mcfadden_r2 < 1.0);
        assert!(fit.log_likelihood > fit.null_log_likelihood);
        assert!(fit.coef[1].p_value < 1e-6);
    }

    #[test]
    fn intercept_only_model_matches_the_sample_share() {
        let n = 100;
        let design = DMatrix::from_element(n, 1, 1.0);
        let y = DVector::from_fn(n, |i, _| if i < 30 { 1.0 } else { 0.0 });

        let fit = fit_logit(&design, &y, &names(&["const"]), 300).unwrap();
        let want = (0.3f64 / 0.7).ln();
        assert!(
            (fit.coef[0].estimate - want).abs() < 1e-4,
            "const {} want {want}",
            fit.coef[0].estimate
        );
        assert!(fit.mcfadden_r2.abs() < 1e-6, "r2 {}", fit.mcfadden_r2);
    }

    #[test]
    fn constant_response_is_rejected() {
        let design = DMatrix::from_element(10, 1, 1.0);
        let y = DVector::from_element(10, 1.0);
        let err = fit_logit(&design, &y, &names(&["const"]), 100).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
