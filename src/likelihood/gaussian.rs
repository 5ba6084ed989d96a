//! Gaussian regression likelihood for the estimation lesson.
//!
//! The parameter vector is `[b0, b1, sigma]`: intercept, slope, and the
//! residual standard deviation. Each observation contributes the log-density
//! of its residual under `Normal(0, sigma)`; the evaluator returns the
//! negated sum.
//!
//! Out-of-range parameters (`sigma <= 0`, non-finite anything) charge
//! [`POINT_PENALTY`](super::POINT_PENALTY) per observation instead of
//! erroring, so a solver wandering off the valid region sees a steep but
//! finite surface and walks back.

use statrs::distribution::{Continuous, Normal};

use super::POINT_PENALTY;
use crate::error::AppError;
use crate::optim::Objective;

/// Negative log-likelihood of a straight-line fit with Gaussian errors.
#[derive(Debug)]
pub struct GaussianNll<'a> {
    x: &'a [f64],
    y: &'a [f64],
}

impl<'a> GaussianNll<'a> {
    /// # Errors
    ///
    /// Exit code 2 when `x` and `y` differ in length, exit code 3 when the
    /// sample is empty.
    pub fn new(x: &'a [f64], y: &'a [f64]) -> Result<Self, AppError> {
        if x.len() != y.len() {
            return Err(AppError::usage(format!(
                "Predictor has {} observations, response has {}.",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(AppError::insufficient(
                "Likelihood needs at least one observation.",
            ));
        }
        Ok(Self { x, y })
    }

    pub fn n(&self) -> usize {
        self.x.len()
    }
}

impl Objective for GaussianNll<'_> {
    fn dim(&self) -> usize {
        3
    }

    fn value(&self, params: &[f64]) -> Result<f64, AppError> {
        if params.len() != 3 {
            return Err(AppError::usage(format!(
                "Gaussian likelihood takes [b0, b1, sigma], got {} parameters.",
                params.len()
            )));
        }
        let (b0, b1, sigma) = (params[0], params[1], params[2]);
        let full_penalty = self.x.len() as f64 * POINT_PENALTY;

        if !b0.is_finite() || !b1.is_finite() || !sigma.is_finite() || sigma <= 0.0 {
            return Ok(full_penalty);
        }
        let normal = match Normal::new(0.0, sigma) {
            Ok(normal) => normal,
            Err(_) => return Ok(full_penalty),
        };

        let mut nll = 0.0;
        for (&xi, &yi) in self.x.iter().zip(self.y.iter()) {
            let residual = yi - (b0 + b1 * xi);
            let log_density = normal.ln_pdf(residual);
            if log_density.is_finite() {
                nll -= log_density;
            } else {
                nll += POINT_PENALTY;
            }
        }
        Ok(nll)
    }
}
