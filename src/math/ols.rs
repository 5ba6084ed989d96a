//! Ordinary least squares with coefficient inference.
//!
//! Every model in the crate reduces to solving small regression problems:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We use SVD to solve the least-squares problem robustly even when the
//!   design matrix is tall (more rows than columns).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - Parameter dimensions are tiny (2-6 columns), so SVD performance is
//!   acceptable for classroom-scale data.
//! - Standard errors come from `σ̂² (XᵀX)⁻¹` with Student's t p-values; panel
//!   transforms pass an adjusted degrees-of-freedom count.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::AppError;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails. Demographic
    // regressors (log population vs. log income) can be nearly collinear.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// A fitted least-squares regression.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coef: Vec<f64>,
    pub std_err: Vec<f64>,
    pub t_stats: Vec<f64>,
    pub p_values: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Error variance estimate `SSE / df`.
    pub sigma2: f64,
    pub r_squared: f64,
    pub n: usize,
    pub k: usize,
    /// Residual degrees of freedom used for inference.
    pub df: usize,
    /// Coefficient covariance `sigma2 * (X'X)^-1`, row-major `k x k`.
    pub cov: Vec<Vec<f64>>,
}

/// Fit OLS with the default residual degrees of freedom `n - k`.
pub fn fit_ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit, AppError> {
    let df = x.nrows().saturating_sub(x.ncols());
    fit_ols_with_df(x, y, df)
}

/// Fit OLS with an explicit residual degrees of freedom.
///
/// The within-transformation absorbs one mean per unit, so fixed-effects
/// callers pass `n - n_units - k` here to keep standard errors honest.
///
/// # Errors
/// - exit code 3 when there are not enough rows for the requested df
/// - exit code 4 when the design is singular or produces non-finite numbers
pub fn fit_ols_with_df(x: &DMatrix<f64>, y: &DVector<f64>, df: usize) -> Result<OlsFit, AppError> {
    let n = x.nrows();
    let k = x.ncols();
    if y.len() != n {
        return Err(AppError::runtime(format!(
            "Design has {n} rows but the response has {} values.",
            y.len()
        )));
    }
    if df == 0 || n < k + 1 {
        return Err(AppError::insufficient(format!(
            "Need more observations than parameters: n={n}, k={k}."
        )));
    }

    let beta = solve_least_squares(x, y)
        .ok_or_else(|| AppError::runtime("Design matrix is too ill-conditioned to solve."))?;

    let fitted = x * &beta;
    let resid = y - &fitted;
    let sse: f64 = resid.iter().map(|r| r * r).sum();
    let sigma2 = sse / df as f64;

    let xtx = x.transpose() * x;
    let xtx_inv = xtx
        .try_inverse()
        .ok_or_else(|| AppError::runtime("Singular design matrix; check for collinear regressors."))?;

    let mut std_err = Vec::with_capacity(k);
    let mut cov = vec![vec![0.0; k]; k];
    for j in 0..k {
        let v = sigma2 * xtx_inv[(j, j)];
        if !(v.is_finite() && v >= 0.0) {
            return Err(AppError::runtime("Non-finite coefficient variance."));
        }
        std_err.push(v.sqrt());
        for (i, row) in cov.iter_mut().enumerate() {
            row[j] = sigma2 * xtx_inv[(i, j)];
        }
    }

    let t_dist = StudentsT::new(0.0, 1.0, df as f64)
        .map_err(|e| AppError::runtime(format!("Invalid t distribution (df={df}): {e}")))?;
    let mut t_stats = Vec::with_capacity(k);
    let mut p_values = Vec::with_capacity(k);
    for j in 0..k {
        let t = if std_err[j] > 0.0 { beta[j] / std_err[j] } else { 0.0 };
        t_stats.push(t);
        p_values.push(2.0 * (1.0 - t_dist.cdf(t.abs())));
    }

    let y_mean = y.iter().sum::<f64>() / n as f64;
    let tss: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if tss > 1e-12 { 1.0 - sse / tss } else { 0.0 };

    Ok(OlsFit {
        coef: beta.iter().copied().collect(),
        std_err,
        t_stats,
        p_values,
        residuals: resid.iter().copied().collect(),
        sigma2,
        r_squared,
        n,
        k,
        df,
        cov,
    })
}

/// Build a design matrix with a leading intercept column.
pub fn design_with_intercept(regressors: &[Vec<f64>], n: usize) -> Result<DMatrix<f64>, AppError> {
    for (j, col) in regressors.iter().enumerate() {
        if col.len() != n {
            return Err(AppError::runtime(format!(
                "Regressor {j} has {} values, expected {n}.",
                col.len()
            )));
        }
    }
    let k = regressors.len() + 1;
    let mut x = DMatrix::zeros(n, k);
    for i in 0..n {
        x[(i, 0)] = 1.0;
        for (j, col) in regressors.iter().enumerate() {
            x[(i, j + 1)] = col[i];
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn ols_exact_fit_has_unit_r_squared() {
        let xs = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let x = design_with_intercept(&[xs.clone()], 5).unwrap();
        let y = DVector::from_iterator(5, xs.iter().map(|v| 2.0 + 3.0 * v));

        let fit = fit_ols(&x, &y).unwrap();
        assert!((fit.coef[0] - 2.0).abs() < 1e-9);
        assert!((fit.coef[1] - 3.0).abs() < 1e-9);
        assert!((fit.r_squared - 1.0).abs() < 1e-9);
        assert!(fit.residuals.iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn ols_standard_errors_match_closed_form() {
        // Known small example: y on intercept + x.
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = vec![2.1, 3.9, 6.2, 7.8, 10.1];
        let x = design_with_intercept(&[xs.clone()], 5).unwrap();
        let y = DVector::from_vec(ys.clone());

        let fit = fit_ols(&x, &y).unwrap();

        // Closed-form slope SE: sqrt(sigma2 / Σ(x - x̄)²).
        let x_mean = 3.0;
        let sxx: f64 = xs.iter().map(|v| (v - x_mean).powi(2)).sum();
        let expected_se = (fit.sigma2 / sxx).sqrt();
        assert!(
            (fit.std_err[1] - expected_se).abs() < 1e-9,
            "slope SE {} vs closed form {expected_se}",
            fit.std_err[1]
        );
        assert!(fit.p_values[1] < 0.01, "steep slope should be significant");
    }

    #[test]
    fn ols_rejects_underdetermined_systems() {
        let x = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        let err = fit_ols(&x, &y).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
