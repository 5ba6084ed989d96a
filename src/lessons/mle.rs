//! Likelihood demonstration: minimize a Gaussian regression NLL by simplex
//! search and set the answer next to the closed-form OLS solution.
//!
//! The point of the lesson is that maximum likelihood under Gaussian errors
//! *is* least squares: the minimizer should land on the OLS coefficients,
//! and the sigma it recovers is the (1/n) residual standard deviation.

use nalgebra::DVector;
use serde::Serialize;

use crate::data::sample;
use crate::domain::MleConfig;
use crate::error::AppError;
use crate::io::write_json;
use crate::likelihood::GaussianNll;
use crate::math::{design_with_intercept, fit_ols, mean, sample_variance};
use crate::optim::minimize_nelder_mead;
use crate::report::section;

/// One parameter triple `(b0, b1, sigma)`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamTriple {
    pub intercept: f64,
    pub slope: f64,
    pub sigma: f64,
}

/// Everything the demonstration computes.
#[derive(Debug, Clone, Serialize)]
pub struct MleOutput {
    pub generating: ParamTriple,
    pub mle: ParamTriple,
    pub ols: ParamTriple,
    pub nll_at_optimum: f64,
    pub iterations: u64,
    pub converged: bool,
    pub n: usize,
}

/// Run the pipeline up to (but not including) presentation.
pub fn analyze(config: &MleConfig) -> Result<MleOutput, AppError> {
    let (x, y) = sample::linear_sample(
        config.n,
        config.intercept,
        config.slope,
        config.sigma,
        config.seed,
    )?;

    // Closed form first, so the comparison target exists even if the search
    // fails.
    let design = design_with_intercept(&[x.clone()], x.len())?;
    let ols_fit = fit_ols(&design, &DVector::from_vec(y.clone()))?;
    let sse: f64 = ols_fit.residuals.iter().map(|r| r * r).sum();
    let ols = ParamTriple {
        intercept: ols_fit.coef[0],
        slope: ols_fit.coef[1],
        // ML variance uses 1/n, not 1/(n-k); that is what the NLL minimum
        // matches.
        sigma: (sse / x.len() as f64).sqrt(),
    };

    let nll = GaussianNll::new(&x, &y)?;
    let start = [mean(&y), 0.0, sample_variance(&y).sqrt().max(1e-3)];
    let fit = minimize_nelder_mead(&nll, &start, config.max_iters)?;

    Ok(MleOutput {
        generating: ParamTriple {
            intercept: config.intercept,
            slope: config.slope,
            sigma: config.sigma,
        },
        mle: ParamTriple {
            intercept: fit.params[0],
            slope: fit.params[1],
            sigma: fit.params[2],
        },
        ols,
        nll_at_optimum: fit.value,
        iterations: fit.iterations,
        converged: fit.converged,
        n: x.len(),
    })
}

/// Full lesson: analyze, print, export.
pub fn run(config: &MleConfig) -> Result<(), AppError> {
    let out = analyze(config)?;

    println!("{}", section("Gaussian likelihood vs. closed-form OLS"));
    println!("n = {} | seed sample from y = b0 + b1 x + N(0, sigma)", out.n);
    println!();
    println!(
        "{:<12} {:>12} {:>12} {:>12}",
        "parameter", "generating", "MLE", "OLS"
    );
    for (name, g, m, o) in [
        ("intercept", out.generating.intercept, out.mle.intercept, out.ols.intercept),
        ("slope", out.generating.slope, out.mle.slope, out.ols.slope),
        ("sigma", out.generating.sigma, out.mle.sigma, out.ols.sigma),
    ] {
        println!("{name:<12} {g:>12.4} {m:>12.4} {o:>12.4}");
    }
    println!();
    println!(
        "NLL at optimum = {:.4} | {} iterations | converged: {}",
        out.nll_at_optimum, out.iterations, out.converged
    );

    if let Some(path) = &config.export_json {
        write_json(path, &out)?;
        println!("Wrote JSON: {}", path.display());
    }
    Ok(())
}
