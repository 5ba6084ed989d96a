//! Negative log-likelihood evaluators.
//!
//! Each evaluator implements [`crate::optim::Objective`] so the solver layer
//! can drive it without knowing which model it belongs to. Evaluators are
//! pure: same parameters and data, same value, no mutation.

pub mod gaussian;
pub mod logit;

pub use gaussian::*;
pub use logit::*;

/// Per-observation charge applied when parameters leave the valid region or
/// a density underflows. Finite, so simplex ordering stays well defined.
pub(crate) const POINT_PENALTY: f64 = 1e10;
