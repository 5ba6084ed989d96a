//! Seeded synthetic data for offline runs.
//!
//! Each generator mirrors the shape of its online counterpart (same columns,
//! same key structure) so lessons behave identically either way. Seeds mix
//! the user seed with the generator's own parameters, so changing any input
//! changes the draw while reruns stay bit-identical.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Months, NaiveDate};
use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{EconSeries, GrowthTransform, TimeSeries};
use crate::error::AppError;

fn seed_hasher(tag: &str) -> DefaultHasher {
    let mut hasher = DefaultHasher::new();
    tag.hash(&mut hasher);
    hasher
}

fn noise(sigma: f64) -> Result<Normal<f64>, AppError> {
    Normal::new(0.0, sigma)
        .map_err(|e| AppError::runtime(format!("Noise distribution error: {e}")))
}

/// Monthly level series shaped like the FRED registry entry: level series
/// get persistent log growth, rate series mean-revert around a typical level.
pub fn macro_series(series: EconSeries, seed: u64) -> Result<TimeSeries, AppError> {
    let mut hasher = seed_hasher("macro-series");
    series.series_id().hash(&mut hasher);
    seed.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());

    // (mean growth or level, persistence, shock sd, starting level)
    let (mu, phi, sigma, start) = match series {
        EconSeries::RealGdp => (0.25, 0.4, 0.5, 9000.0),
        EconSeries::ConsumerPriceIndex => (0.22, 0.5, 0.25, 130.0),
        EconSeries::UnemploymentRate => (5.6, 0.98, 0.12, 5.6),
        EconSeries::FedFundsRate => (4.0, 0.985, 0.18, 4.0),
    };
    let shocks = noise(sigma)?;

    let months = 420;
    let origin = NaiveDate::from_ymd_opt(1990, 1, 1)
        .ok_or_else(|| AppError::runtime("Calendar origin out of range."))?;
    let mut dates = Vec::with_capacity(months);
    let mut values = Vec::with_capacity(months);

    match series.growth_transform() {
        GrowthTransform::LogDiff => {
            let mut level = start;
            let mut growth = mu;
            for i in 0..months {
                dates.push(month(origin, i)?);
                values.push(level);
                growth = mu + phi * (growth - mu) + shocks.sample(&mut rng);
                level *= (growth / 100.0).exp();
            }
        }
        GrowthTransform::FirstDiff => {
            let mut level = start;
            for i in 0..months {
                dates.push(month(origin, i)?);
                values.push(level);
                level = (mu + phi * (level - mu) + shocks.sample(&mut rng)).max(0.05);
            }
        }
    }

    TimeSeries::new(series.label(), dates, values)
}

fn month(origin: NaiveDate, i: usize) -> Result<NaiveDate, AppError> {
    origin
        .checked_add_months(Months::new(i as u32))
        .ok_or_else(|| AppError::runtime("Calendar month out of range."))
}

/// County panel shaped like stacked ACS extracts: outcome is log median
/// income, covariate is the bachelor's share in percent.
pub struct PanelSample {
    pub unit_keys: Vec<String>,
    pub years: Vec<i32>,
    /// ln(median household income).
    pub outcome: Vec<f64>,
    /// Bachelor's share of adults, percent.
    pub covariate: Vec<f64>,
}

/// The unit effects correlate with the covariate on purpose, so pooled OLS
/// and the within estimator disagree the way the lesson discusses.
pub fn county_panel(units: usize, year_start: i32, periods: usize, seed: u64) -> Result<PanelSample, AppError> {
    if units < 3 || periods < 2 {
        return Err(AppError::usage(format!(
            "Panel generation needs at least 3 units and 2 periods, got {units} and {periods}."
        )));
    }

    let mut hasher = seed_hasher("county-panel");
    units.hash(&mut hasher);
    periods.hash(&mut hasher);
    year_start.hash(&mut hasher);
    seed.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());

    let alpha_dist = noise(0.15)?;
    let share_dist = noise(4.0)?;
    let eps_dist = noise(0.05)?;

    let n = units * periods;
    let mut sample = PanelSample {
        unit_keys: Vec::with_capacity(n),
        years: Vec::with_capacity(n),
        outcome: Vec::with_capacity(n),
        covariate: Vec::with_capacity(n),
    };
    for i in 0..units {
        let alpha = alpha_dist.sample(&mut rng);
        for t in 0..periods {
            let share = (25.0 + 20.0 * alpha + 0.3 * t as f64 + share_dist.sample(&mut rng))
                .clamp(2.0, 80.0);
            sample.unit_keys.push(format!("{:05}", 1000 + 2 * i + 1));
            sample.years.push(year_start + t as i32);
            sample.covariate.push(share);
            sample
                .outcome
                .push(10.4 + 0.012 * share + alpha + eps_dist.sample(&mut rng));
        }
    }
    Ok(sample)
}

/// Square rook lattice with a spatially autocorrelated outcome.
#[derive(Debug)]
pub struct LatticeSample {
    pub side: usize,
    /// Undirected adjacency pairs, row-major cell indices.
    pub pairs: Vec<(usize, usize)>,
    /// Cell centroids, for the knn weights option.
    pub coords: Vec<(f64, f64)>,
    pub covariate: Vec<f64>,
    pub outcome: Vec<f64>,
}

/// `y = (I - rho W)^(-1) (2 + 1.5 x + eps)` on a `side x side` rook lattice
/// with row-standardized W.
pub fn lattice(side: usize, rho: f64, seed: u64) -> Result<LatticeSample, AppError> {
    if side < 3 {
        return Err(AppError::usage(format!(
            "Lattice side must be at least 3, got {side}."
        )));
    }
    if !(rho.is_finite() && rho.abs() < 1.0) {
        return Err(AppError::usage(format!(
            "Lattice autocorrelation must lie in (-1, 1), got {rho}."
        )));
    }

    let mut hasher = seed_hasher("lattice");
    side.hash(&mut hasher);
    rho.to_bits().hash(&mut hasher);
    seed.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());

    let n = side * side;
    let mut pairs = Vec::with_capacity(2 * side * (side - 1));
    let mut coords = Vec::with_capacity(n);
    for r in 0..side {
        for c in 0..side {
            let i = r * side + c;
            coords.push((c as f64, r as f64));
            if c + 1 < side {
                pairs.push((i, i + 1));
            }
            if r + 1 < side {
                pairs.push((i, i + side));
            }
        }
    }

    let mut degree = vec![0usize; n];
    for &(a, b) in &pairs {
        degree[a] += 1;
        degree[b] += 1;
    }
    let mut w = DMatrix::zeros(n, n);
    for &(a, b) in &pairs {
        w[(a, b)] = 1.0 / degree[a] as f64;
        w[(b, a)] = 1.0 / degree[b] as f64;
    }

    let x_dist = noise(1.0)?;
    let eps_dist = noise(0.5)?;
    let covariate: Vec<f64> = (0..n).map(|_| x_dist.sample(&mut rng)).collect();
    let rhs = DVector::from_fn(n, |i, _| {
        2.0 + 1.5 * covariate[i] + eps_dist.sample(&mut rng)
    });
    let system = DMatrix::identity(n, n) - rho * w;
    let outcome = system
        .lu()
        .solve(&rhs)
        .ok_or_else(|| AppError::runtime("Lattice system is singular."))?;

    Ok(LatticeSample {
        side,
        pairs,
        coords,
        covariate,
        outcome: outcome.iter().copied().collect(),
    })
}

/// County-shaped turnout predictors for the logit lesson.
pub struct TurnoutSample {
    pub county: Vec<String>,
    pub median_income: Vec<f64>,
    /// Bachelor's share of adults, percent.
    pub pct_bachelors: Vec<f64>,
    /// Ballots cast over adult population.
    pub turnout_ratio: Vec<f64>,
}

/// A latent prosperity factor drives income, education, and turnout, so the
/// logit has real signal to find.
pub fn turnout(n: usize, seed: u64) -> Result<TurnoutSample, AppError> {
    if n < 10 {
        return Err(AppError::usage(format!(
            "Turnout generation needs at least 10 counties, got {n}."
        )));
    }

    let mut hasher = seed_hasher("turnout");
    n.hash(&mut hasher);
    seed.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());

    let latent = noise(1.0)?;
    let income_noise = noise(0.1)?;
    let share_noise = noise(4.0)?;
    let ratio_noise = noise(0.05)?;

    let mut sample = TurnoutSample {
        county: Vec::with_capacity(n),
        median_income: Vec::with_capacity(n),
        pct_bachelors: Vec::with_capacity(n),
        turnout_ratio: Vec::with_capacity(n),
    };
    for i in 0..n {
        let q = latent.sample(&mut rng);
        let income = (10.9 + 0.25 * q + income_noise.sample(&mut rng)).exp();
        let share = (22.0 + 9.0 * q + share_noise.sample(&mut rng)).clamp(4.0, 70.0);
        let ratio = (0.54 + 0.10 * (income.ln() - 10.9) + 0.004 * (share - 22.0)
            + ratio_noise.sample(&mut rng))
        .clamp(0.15, 0.95);

        sample.county.push(format!("County {:03}", i + 1));
        sample.median_income.push(income);
        sample.pct_bachelors.push(share);
        sample.turnout_ratio.push(ratio);
    }
    Ok(sample)
}

/// Paired observations from `y = b0 + b1 x + Normal(0, sigma)` with `x`
/// uniform on `[0, 50)`, for the likelihood demonstration.
pub fn linear_sample(
    n: usize,
    b0: f64,
    b1: f64,
    sigma: f64,
    seed: u64,
) -> Result<(Vec<f64>, Vec<f64>), AppError> {
    if n < 10 {
        return Err(AppError::usage(format!(
            "Linear sample generation needs at least 10 observations, got {n}."
        )));
    }
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(AppError::usage(format!(
            "Generating sigma must be positive, got {sigma}."
        )));
    }

    let mut hasher = seed_hasher("linear-sample");
    n.hash(&mut hasher);
    b0.to_bits().hash(&mut hasher);
    b1.to_bits().hash(&mut hasher);
    sigma.to_bits().hash(&mut hasher);
    seed.hash(&mut hasher);
    let mut rng = StdRng::seed_from_u64(hasher.finish());

    let eps = noise(sigma)?;
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let xi: f64 = rng.gen_range(0.0..50.0);
        x.push(xi);
        y.push(b0 + b1 * xi + eps.sample(&mut rng));
    }
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_series_is_deterministic_per_seed_and_series() {
        let a = macro_series(EconSeries::RealGdp, 7).unwrap();
        let b = macro_series(EconSeries::RealGdp, 7).unwrap();
        let c = macro_series(EconSeries::RealGdp, 8).unwrap();
        let d = macro_series(EconSeries::ConsumerPriceIndex, 7).unwrap();

        assert_eq!(a.values, b.values);
        assert_ne!(a.values, c.values);
        assert_ne!(a.values, d.values);
        assert_eq!(a.len(), 420);
    }

    #[test]
    fn level_series_stay_positive() {
        for series in EconSeries::ALL {
            let s = macro_series(series, 3).unwrap();
            assert!(s.values.iter().all(|v| *v > 0.0), "{:?}", series);
        }
    }

    #[test]
    fn panel_has_one_row_per_unit_period() {
        let p = county_panel(12, 2015, 5, 9).unwrap();
        assert_eq!(p.unit_keys.len(), 60);
        assert_eq!(p.years.len(), 60);
        assert_eq!(p.years[0], 2015);
        assert_eq!(p.years[4], 2019);
        assert_eq!(p.unit_keys[0], p.unit_keys[4]);
        assert_ne!(p.unit_keys[0], p.unit_keys[5]);
    }

    #[test]
    fn lattice_shapes_line_up() {
        let l = lattice(6, 0.4, 11).unwrap();
        assert_eq!(l.coords.len(), 36);
        assert_eq!(l.covariate.len(), 36);
        assert_eq!(l.outcome.len(), 36);
        assert_eq!(l.pairs.len(), 2 * 6 * 5);
        assert!(l.outcome.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn lattice_rejects_explosive_autocorrelation() {
        assert_eq!(lattice(6, 1.0, 11).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn linear_sample_carries_the_generating_slope() {
        let (x, y) = linear_sample(4000, 20.0, 0.8, 10.0, 42).unwrap();
        assert_eq!(x.len(), 4000);

        // Quick moment check: cov(x, y) / var(x) should be near b1.
        let mx = x.iter().sum::<f64>() / x.len() as f64;
        let my = y.iter().sum::<f64>() / y.len() as f64;
        let cov: f64 = x.iter().zip(&y).map(|(a, b)| (a - mx) * (b - my)).sum();
        let var: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
        let slope = cov / var;
        assert!((slope - 0.8).abs() < 0.05, "slope {slope}");
    }

    #[test]
    fn linear_sample_rejects_bad_sigma() {
        assert_eq!(linear_sample(100, 0.0, 1.0, 0.0, 1).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn turnout_ratios_stay_in_bounds() {
        let t = turnout(200, 13).unwrap();
        assert_eq!(t.county.len(), 200);
        assert!(t.turnout_ratio.iter().all(|r| (0.15..=0.95).contains(r)));
        assert!(t.median_income.iter().all(|v| *v > 0.0));
    }
}
