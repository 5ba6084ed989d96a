//! Spatial lesson: county cross-section with explicit neighbor structure.
//!
//! Pipeline: load the cross-section (offline: a synthetic lattice with a
//! known lag strength; online: 2020 county results joined to ACS income),
//! build weights, test OLS residuals with Moran's I, then fit the
//! spatial-lag model by profiled maximum likelihood.

use std::collections::HashMap;

use nalgebra::DVector;
use serde::Serialize;

use crate::data::census::CensusClient;
use crate::data::elections::ElectionsClient;
use crate::data::sample;
use crate::domain::{AcsVariable, SpatialConfig, WeightsKind};
use crate::error::AppError;
use crate::io::write_json;
use crate::math::{design_with_intercept, fit_ols};
use crate::models::{
    CoefRow, MoranTest, SpatialLagFit, SpatialWeights, coef_rows, fit_spatial_lag, morans_i,
};
use crate::plot::render_scatter;
use crate::report::{format_coef_table, format_moran, section};

/// Everything the spatial lesson computes.
#[derive(Debug, Serialize)]
pub struct SpatialOutput {
    pub ols_coef: Vec<CoefRow>,
    pub ols_r_squared: f64,
    pub moran: MoranTest,
    pub lag: SpatialLagFit,
    pub n: usize,
    /// Rows lost joining the two online sources (0 offline).
    pub dropped_in_join: usize,
    /// (observed y, spatially lagged y), for the scatter.
    #[serde(skip)]
    pub lag_scatter: Vec<(f64, f64)>,
}

struct CrossSection {
    weights: SpatialWeights,
    y: Vec<f64>,
    x_cols: Vec<Vec<f64>>,
    x_names: Vec<String>,
    dropped_in_join: usize,
}

/// Run the pipeline up to (but not including) presentation.
pub fn analyze(config: &SpatialConfig) -> Result<SpatialOutput, AppError> {
    let data = if config.offline {
        offline_cross_section(config)?
    } else {
        online_cross_section(config)?
    };

    let n = data.weights.n();
    let design = design_with_intercept(&data.x_cols, n)?;
    let ols = fit_ols(&design, &DVector::from_vec(data.y.clone()))?;

    let mut names = vec!["const".to_string()];
    names.extend(data.x_names.iter().cloned());
    let ols_coef = coef_rows(&names, &ols);

    let moran = morans_i(&data.weights, &ols.residuals)?;
    let lag = fit_spatial_lag(&data.weights, &data.x_cols, &data.y, &data.x_names)?;

    let wy = data.weights.lag(&data.y)?;
    let lag_scatter: Vec<(f64, f64)> = data.y.iter().copied().zip(wy).collect();

    Ok(SpatialOutput {
        ols_coef,
        ols_r_squared: ols.r_squared,
        moran,
        lag,
        n,
        dropped_in_join: data.dropped_in_join,
        lag_scatter,
    })
}

fn offline_cross_section(config: &SpatialConfig) -> Result<CrossSection, AppError> {
    let sample = sample::lattice(config.lattice_side, 0.5, config.seed)?;
    let weights = match config.weights {
        WeightsKind::Contiguity => {
            SpatialWeights::from_pairs(sample.coords.len(), &sample.pairs)?
        }
        WeightsKind::Knn => SpatialWeights::knn(&sample.coords, config.knn)?,
    };
    Ok(CrossSection {
        weights,
        y: sample.outcome,
        x_cols: vec![sample.covariate],
        x_names: vec!["x".to_string()],
        dropped_in_join: 0,
    })
}

/// Join county vote shares to ACS demographics, then wire the Census
/// adjacency file onto the joined row order.
fn online_cross_section(config: &SpatialConfig) -> Result<CrossSection, AppError> {
    if config.weights == WeightsKind::Knn {
        return Err(AppError::usage(
            "The online sources carry no centroids; use --weights contiguity online.",
        ));
    }

    let elections = ElectionsClient::new();
    let results = elections.fetch_state_results(&config.state_fips)?;
    let adjacency = elections.fetch_state_adjacency(&config.state_fips)?;

    let acs = CensusClient::from_env().fetch_county_table(
        2021,
        &config.state_fips,
        &[AcsVariable::MedianHouseholdIncome, AcsVariable::Population],
    )?;

    let join = results.inner_join(&acs.frame, &["fips"])?;
    let frame = join.frame;

    let fips = frame.text("fips")?;
    let per_gop = frame.numeric("per_gop")?;
    let income = frame.numeric("median_income")?;
    let log_income: Result<Vec<f64>, AppError> = income
        .iter()
        .map(|&v| {
            if v > 0.0 {
                Ok(v.ln())
            } else {
                Err(AppError::runtime(format!("Non-positive median income {v}.")))
            }
        })
        .collect();

    // Adjacency GEOIDs -> joined row indices; pairs touching dropped
    // counties fall away with the join.
    let index: HashMap<&str, usize> = fips
        .iter()
        .enumerate()
        .map(|(i, f)| (f.as_str(), i))
        .collect();
    let pairs: Vec<(usize, usize)> = adjacency
        .iter()
        .filter_map(|(a, b)| Some((*index.get(a.as_str())?, *index.get(b.as_str())?)))
        .collect();
    let weights = SpatialWeights::from_pairs(fips.len(), &pairs)?;

    Ok(CrossSection {
        weights,
        y: per_gop,
        x_cols: vec![log_income?],
        x_names: vec!["ln(income)".to_string()],
        dropped_in_join: join.dropped_left + join.dropped_right,
    })
}

/// Full lesson: analyze, print, plot, export.
pub fn run(config: &SpatialConfig) -> Result<(), AppError> {
    let out = analyze(config)?;

    println!("{}", section("Spatial cross-section"));
    println!("Units: {} | dropped in join: {}", out.n, out.dropped_in_join);

    println!("{}", section("OLS (no spatial term)"));
    print!("{}", format_coef_table(&out.ols_coef, "t"));
    println!("R2 = {:.4}", out.ols_r_squared);

    println!("{}", section("Moran's I on OLS residuals"));
    print!("{}", format_moran(&out.moran));

    println!("{}", section("Spatial lag (profiled ML)"));
    println!(
        "rho = {:.4} (se {:.4}, z {:.3}, p {:.4}) | converged: {} in {} iters",
        out.lag.rho,
        out.lag.rho_std_err,
        out.lag.rho_stat,
        out.lag.rho_p_value,
        out.lag.converged,
        out.lag.iterations
    );
    print!("{}", format_coef_table(&out.lag.coef, "z"));
    println!(
        "sigma2 = {:.4} | log-likelihood = {:.3}",
        out.lag.sigma2, out.lag.log_likelihood
    );

    if config.plot {
        print!(
            "{}",
            render_scatter(
                &out.lag_scatter,
                None,
                config.plot_width,
                config.plot_height,
                "y",
                "W y",
            )
        );
    }

    if let Some(path) = &config.export_json {
        write_json(path, &out)?;
        println!("Wrote JSON: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(weights: WeightsKind) -> SpatialConfig {
        SpatialConfig {
            state_fips: "01".to_string(),
            weights,
            knn: 4,
            offline: true,
            seed: 42,
            lattice_side: 10,
            plot: false,
            plot_width: 80,
            plot_height: 16,
            export_json: None,
        }
    }

    #[test]
    fn offline_lattice_recovers_the_lag_strength() {
        let out = analyze(&config(WeightsKind::Contiguity)).unwrap();
        assert_eq!(out.n, 100);
        // Generated with rho = 0.5.
        assert!((out.lag.rho - 0.5).abs() < 0.15, "rho {}", out.lag.rho);
        assert!(
            (out.lag.coef[1].estimate - 1.5).abs() < 0.2,
            "beta {}",
            out.lag.coef[1].estimate
        );
        assert!(out.lag.converged);
    }

    #[test]
    fn residual_autocorrelation_is_detected() {
        let out = analyze(&config(WeightsKind::Contiguity)).unwrap();
        // OLS ignores the lag term, so its residuals cluster spatially.
        assert!(out.moran.i > out.moran.expected, "I {}", out.moran.i);
        assert!(out.moran.p_value < 0.05, "p {}", out.moran.p_value);
    }

    #[test]
    fn knn_weights_also_work_offline() {
        let out = analyze(&config(WeightsKind::Knn)).unwrap();
        assert_eq!(out.n, 100);
        assert!(out.lag.rho.abs() < 1.0);
    }

    #[test]
    fn knn_online_is_a_usage_error() {
        let mut c = config(WeightsKind::Knn);
        c.offline = false;
        assert_eq!(analyze(&c).unwrap_err().exit_code(), 2);
    }
}
