//! Solver drivers that turn an [`Objective`] plus a start point into a
//! [`FitOutcome`].

use argmin::core::{Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;

use super::{FitOutcome, Objective, ObjectiveAdapter};
use crate::error::AppError;

const LBFGS_MEMORY: usize = 7;
const SIMPLEX_STD_TOLERANCE: f64 = 1e-10;

/// Minimizes `objective` with Nelder-Mead from a simplex built around `init`.
///
/// # Errors
///
/// Exit code 2 when `init` has the wrong length, exit code 4 when the solver
/// fails or returns non-finite output.
pub fn minimize_nelder_mead<O: Objective>(
    objective: &O,
    init: &[f64],
    max_iters: u64,
) -> Result<FitOutcome, AppError> {
    check_init(objective, init)?;
    let solver = NelderMead::new(initial_simplex(init))
        .with_sd_tolerance(SIMPLEX_STD_TOLERANCE)
        .map_err(|err| AppError::runtime(format!("Nelder-Mead setup failed: {err}")))?;
    let result = Executor::new(ObjectiveAdapter::new(objective), solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(|err| AppError::runtime(format!("Nelder-Mead run failed: {err}")))?;
    outcome(result.state())
}

/// Minimizes `objective` with L-BFGS and a More-Thuente line search.
///
/// Uses the analytic gradient when the objective provides one, otherwise the
/// adapter's finite-difference fallback.
///
/// # Errors
///
/// Exit code 2 when `init` has the wrong length, exit code 4 when the solver
/// fails or returns non-finite output.
pub fn minimize_lbfgs<O: Objective>(
    objective: &O,
    init: &[f64],
    max_iters: u64,
) -> Result<FitOutcome, AppError> {
    check_init(objective, init)?;
    let solver = LBFGS::new(MoreThuenteLineSearch::new(), LBFGS_MEMORY);
    let result = Executor::new(ObjectiveAdapter::new(objective), solver)
        .configure(|state| state.param(init.to_vec()).max_iters(max_iters))
        .run()
        .map_err(|err| AppError::runtime(format!("L-BFGS run failed: {err}")))?;
    outcome(result.state())
}

fn check_init<O: Objective>(objective: &O, init: &[f64]) -> Result<(), AppError> {
    if init.len() != objective.dim() {
        return Err(AppError::usage(format!(
            "Start point has {} parameters, objective expects {}.",
            init.len(),
            objective.dim()
        )));
    }
    if !init.iter().all(|v| v.is_finite()) {
        return Err(AppError::usage("Start point contains non-finite values."));
    }
    Ok(())
}

/// One vertex at `init`, plus one per coordinate stepped away from it.
fn initial_simplex(init: &[f64]) -> Vec<Vec<f64>> {
    let mut vertices = Vec::with_capacity(init.len() + 1);
    vertices.push(init.to_vec());
    for i in 0..init.len() {
        let mut vertex = init.to_vec();
        let step = if vertex[i].abs() > 1e-8 {
            0.1 * vertex[i].abs()
        } else {
            0.1
        };
        vertex[i] += step;
        vertices.push(vertex);
    }
    vertices
}

fn outcome<S>(state: &S) -> Result<FitOutcome, AppError>
where
    S: State<Param = Vec<f64>, Float = f64>,
{
    let params = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| AppError::runtime("Solver finished without a best parameter."))?;
    let value = state.get_best_cost();
    if !value.is_finite() || !params.iter().all(|v| v.is_finite()) {
        return Err(AppError::runtime(
            "Solver returned non-finite parameters or objective value.",
        ));
    }
    let (converged, status) = match state.get_termination_status() {
        TerminationStatus::Terminated(reason) => {
            let converged = matches!(
                reason,
                TerminationReason::SolverConverged | TerminationReason::TargetCostReached
            );
            (converged, reason.to_string())
        }
        TerminationStatus::NotTerminated => (false, "not terminated".to_string()),
    };
    Ok(FitOutcome {
        params,
        value,
        iterations: state.get_iter(),
        converged,
        status,
    })
}
