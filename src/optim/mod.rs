//! Generic scalar minimization on top of `argmin`.
//!
//! Likelihood evaluators implement [`Objective`] (value plus optional analytic
//! gradient); the runners wire them into concrete solvers:
//!
//! - Nelder-Mead for objectives with penalty plateaus (no gradient required)
//! - L-BFGS with More-Thuente line search when a gradient is available
//!
//! Both runners normalize results into [`FitOutcome`] and treat non-finite
//! best values as errors rather than silent output.

pub mod adapter;
pub mod runners;

pub use adapter::*;
pub use runners::*;

use crate::error::AppError;

/// A scalar objective to minimize (lower is better).
pub trait Objective {
    /// Number of free parameters.
    fn dim(&self) -> usize;

    /// Objective value at `params`.
    fn value(&self, params: &[f64]) -> Result<f64, AppError>;

    /// Analytic gradient of the objective, when implemented.
    ///
    /// Runners fall back to finite differences when this returns `None`.
    fn gradient(&self, _params: &[f64]) -> Option<Result<Vec<f64>, AppError>> {
        None
    }
}

/// Normalized result of a solver run.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub params: Vec<f64>,
    pub value: f64,
    pub iterations: u64,
    pub converged: bool,
    pub status: String,
}
