//! Bridge between [`Objective`] and the `argmin` problem traits.

use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

use super::Objective;

/// Wraps an [`Objective`] so `argmin` solvers can drive it.
///
/// Cost failures surface as solver errors; the finite-difference fallback
/// encodes evaluation failures as NaN and rejects the resulting gradient.
pub struct ObjectiveAdapter<'a, O: Objective> {
    objective: &'a O,
}

impl<'a, O: Objective> ObjectiveAdapter<'a, O> {
    pub fn new(objective: &'a O) -> Self {
        Self { objective }
    }
}

impl<O: Objective> CostFunction for ObjectiveAdapter<'_, O> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, Error> {
        let value = self.objective.value(params)?;
        if !value.is_finite() {
            return Err(Error::msg(format!("non-finite objective value {value}")));
        }
        Ok(value)
    }
}

impl<O: Objective> Gradient for ObjectiveAdapter<'_, O> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> Result<Self::Gradient, Error> {
        if let Some(analytic) = self.objective.gradient(params) {
            let grad = analytic?;
            if grad.len() != self.objective.dim() {
                return Err(Error::msg(format!(
                    "gradient has length {}, expected {}",
                    grad.len(),
                    self.objective.dim()
                )));
            }
            if !grad.iter().all(|g| g.is_finite()) {
                return Err(Error::msg("non-finite analytic gradient"));
            }
            return Ok(grad);
        }

        let f = |theta: &Vec<f64>| -> f64 {
            match self.objective.value(theta) {
                Ok(v) => v,
                Err(_) => f64::NAN,
            }
        };
        let grad = params.central_diff(&f);
        if grad.iter().all(|g| g.is_finite()) {
            return Ok(grad);
        }
        // Central stencils straddle the boundary near constrained regions;
        // a one-sided stencil can still succeed there.
        let grad = params.forward_diff(&f);
        if grad.iter().all(|g| g.is_finite()) {
            Ok(grad)
        } else {
            Err(Error::msg("finite-difference gradient is not finite"))
        }
    }
}
