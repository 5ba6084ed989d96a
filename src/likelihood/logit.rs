//! Bernoulli likelihood with a logistic link.
//!
//! The parameter vector is one coefficient per design column. Log-odds are
//! `eta_i = x_i' beta`; each observation contributes
//! `softplus(eta_i) - y_i * eta_i` to the negative log-likelihood, the
//! numerically stable form of `-y ln p - (1 - y) ln(1 - p)`.

use nalgebra::{DMatrix, DVector};

use super::POINT_PENALTY;
use crate::error::AppError;
use crate::optim::Objective;

/// Negative log-likelihood of a binary-response regression.
#[derive(Debug)]
pub struct BernoulliLogit<'a> {
    x: &'a DMatrix<f64>,
    y: &'a DVector<f64>,
}

impl<'a> BernoulliLogit<'a> {
    /// # Errors
    ///
    /// Exit code 2 when dimensions disagree, exit code 3 when the sample is
    /// empty, exit code 4 when the response contains values other than 0 or 1.
    pub fn new(x: &'a DMatrix<f64>, y: &'a DVector<f64>) -> Result<Self, AppError> {
        if x.nrows() != y.len() {
            return Err(AppError::usage(format!(
                "Design has {} rows, response has {}.",
                x.nrows(),
                y.len()
            )));
        }
        if x.nrows() == 0 {
            return Err(AppError::insufficient(
                "Likelihood needs at least one observation.",
            ));
        }
        if let Some(bad) = y.iter().find(|v| **v != 0.0 && **v != 1.0) {
            return Err(AppError::runtime(format!(
                "Binary response contains {bad}; expected only 0 and 1."
            )));
        }
        Ok(Self { x, y })
    }

    fn log_odds(&self, beta: &[f64], row: usize) -> f64 {
        let mut eta = 0.0;
        for (j, b) in beta.iter().enumerate() {
            eta += self.x[(row, j)] * b;
        }
        eta
    }
}

impl Objective for BernoulliLogit<'_> {
    fn dim(&self) -> usize {
        self.x.ncols()
    }

    fn value(&self, params: &[f64]) -> Result<f64, AppError> {
        if params.len() != self.x.ncols() {
            return Err(AppError::usage(format!(
                "Logit likelihood takes {} coefficients, got {}.",
                self.x.ncols(),
                params.len()
            )));
        }
        let full_penalty = self.x.nrows() as f64 * POINT_PENALTY;
        if !params.iter().all(|b| b.is_finite()) {
            return Ok(full_penalty);
        }

        let mut nll = 0.0;
        for i in 0..self.x.nrows() {
            let eta = self.log_odds(params, i);
            if !eta.is_finite() {
                return Ok(full_penalty);
            }
            nll += softplus(eta) - self.y[i] * eta;
        }
        if nll.is_finite() { Ok(nll) } else { Ok(full_penalty) }
    }

    fn gradient(&self, params: &[f64]) -> Option<Result<Vec<f64>, AppError>> {
        Some(self.gradient_impl(params))
    }
}

impl BernoulliLogit<'_> {
    /// `X' (p - y)` with `p` the fitted probabilities.
    fn gradient_impl(&self, params: &[f64]) -> Result<Vec<f64>, AppError> {
        if params.len() != self.x.ncols() {
            return Err(AppError::usage(format!(
                "Logit gradient takes {} coefficients, got {}.",
                self.x.ncols(),
                params.len()
            )));
        }
        let mut grad = vec![0.0; self.x.ncols()];
        for i in 0..self.x.nrows() {
            let eta = self.log_odds(params, i);
            if !eta.is_finite() {
                return Err(AppError::runtime(
                    "Log-odds overflowed while evaluating the logit gradient.",
                ));
            }
            let slack = sigmoid(eta) - self.y[i];
            for (j, g) in grad.iter_mut().enumerate() {
                *g += self.x[(i, j)] * slack;
            }
        }
        Ok(grad)
    }
}

/// `ln(1 + e^z)` without overflow for large `|z|`.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// Logistic function, evaluated on the side that avoids `exp` overflow.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
