//! Turnout lesson: which counties turn out, as a logistic regression.
//!
//! The response is "above-median turnout" rather than the raw ratio, which
//! keeps the lesson squarely on binary-outcome maximum likelihood. Online
//! mode derives the ratio as total votes over ACS population; offline mode
//! generates counties from a latent prosperity factor.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use crate::data::census::CensusClient;
use crate::data::elections::ElectionsClient;
use crate::data::sample;
use crate::domain::{AcsVariable, TurnoutConfig};
use crate::error::AppError;
use crate::io::{write_coef_csv, write_json};
use crate::math::median;
use crate::models::{LogitFit, fit_logit};
use crate::report::{format_coef_table, section};

/// Everything the turnout lesson computes.
#[derive(Debug, Serialize)]
pub struct TurnoutOutput {
    pub fit: LogitFit,
    /// Median turnout ratio used as the classification threshold.
    pub threshold: f64,
    /// Share of counties above the threshold.
    pub share_high: f64,
    pub n: usize,
    /// Rows lost joining the two online sources (0 offline).
    pub dropped_in_join: usize,
}

struct TurnoutData {
    /// Ballots over adult population, one entry per county.
    ratio: Vec<f64>,
    log_income: Vec<f64>,
    pct_bachelors: Vec<f64>,
    dropped_in_join: usize,
}

/// Run the pipeline up to (but not including) presentation.
pub fn analyze(config: &TurnoutConfig) -> Result<TurnoutOutput, AppError> {
    let data = if config.offline {
        offline_data(config)?
    } else {
        online_data(config)?
    };

    let n = data.ratio.len();
    let threshold = median(&data.ratio)
        .ok_or_else(|| AppError::insufficient("No turnout observations to classify."))?;

    let mut design = DMatrix::zeros(n, 3);
    let mut response = DVector::zeros(n);
    let mut high = 0usize;
    for i in 0..n {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = data.log_income[i];
        design[(i, 2)] = data.pct_bachelors[i];
        if data.ratio[i] > threshold {
            response[i] = 1.0;
            high += 1;
        }
    }

    let names = ["const", "ln(income)", "pct_bachelors"]
        .map(String::from)
        .to_vec();
    let fit = fit_logit(&design, &response, &names, config.max_iters)?;

    Ok(TurnoutOutput {
        fit,
        threshold,
        share_high: high as f64 / n as f64,
        n,
        dropped_in_join: data.dropped_in_join,
    })
}

fn offline_data(config: &TurnoutConfig) -> Result<TurnoutData, AppError> {
    let s = sample::turnout(config.sample_size, config.seed)?;
    let log_income = s.median_income.iter().map(|v| v.ln()).collect();
    Ok(TurnoutData {
        ratio: s.turnout_ratio,
        log_income,
        pct_bachelors: s.pct_bachelors,
        dropped_in_join: 0,
    })
}

fn online_data(config: &TurnoutConfig) -> Result<TurnoutData, AppError> {
    let Some(state_fips) = &config.state_fips else {
        return Err(AppError::usage(
            "Online mode needs --state <two-digit FIPS> to scope both sources.",
        ));
    };

    let results = ElectionsClient::new().fetch_state_results(state_fips)?;
    let acs = CensusClient::from_env().fetch_county_table(
        2021,
        state_fips,
        &[
            AcsVariable::Population,
            AcsVariable::MedianHouseholdIncome,
            AcsVariable::BachelorsDegrees,
        ],
    )?;

    let join = results.inner_join(&acs.frame, &["fips"])?;
    let frame = join.frame;

    let votes = frame.numeric("total_votes")?;
    let population = frame.numeric("population")?;
    let income = frame.numeric("median_income")?;
    let bachelors = frame.numeric("bachelors")?;

    let mut ratio = Vec::with_capacity(votes.len());
    let mut log_income = Vec::with_capacity(votes.len());
    let mut pct_bachelors = Vec::with_capacity(votes.len());
    let mut dropped = join.dropped_left + join.dropped_right;
    for i in 0..votes.len() {
        if !(population[i] > 0.0 && income[i] > 0.0) {
            dropped += 1;
            continue;
        }
        ratio.push(votes[i] / population[i]);
        log_income.push(income[i].ln());
        pct_bachelors.push(100.0 * bachelors[i] / population[i]);
    }

    Ok(TurnoutData {
        ratio,
        log_income,
        pct_bachelors,
        dropped_in_join: dropped,
    })
}

/// Full lesson: analyze, print, export.
pub fn run(config: &TurnoutConfig) -> Result<(), AppError> {
    let out = analyze(config)?;

    println!("{}", section("Turnout: P(above-median turnout)"));
    println!(
        "Counties: {} | threshold: {:.4} | share high: {:.3} | dropped: {}",
        out.n, out.threshold, out.share_high, out.dropped_in_join
    );

    println!("{}", section("Logit fit (maximum likelihood)"));
    print!("{}", format_coef_table(&out.fit.coef, "z"));
    println!(
        "ln L = {:.3} | ln L(null) = {:.3} | McFadden R2 = {:.4}",
        out.fit.log_likelihood, out.fit.null_log_likelihood, out.fit.mcfadden_r2
    );
    println!(
        "Converged: {} in {} iterations",
        out.fit.converged, out.fit.iterations
    );

    if let Some(path) = &config.export_csv {
        write_coef_csv(path, &out.fit.coef, "z")?;
        println!("Wrote CSV: {}", path.display());
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

    fn config() -> TurnoutConfig {
        TurnoutConfig {
            offline: true,
            seed: 42,
            sample_size: 600,
            state_fips: None,
            max_iters: 500,
            export_csv: None,
            export_json: None,
        }
    }

    #[test]
    fn offline_pipeline_runs_end_to_end() {
        let out = analyze(&config()).unwrap();
        assert_eq!(out.n, 600);
        assert_eq!(out.fit.coef.len(), 3);
        assert!(out.fit.converged);
        // Median split leaves roughly half on each side.
        assert!((out.share_high - 0.5).abs() < 0.05, "share {}", out.share_high);
    }

    #[test]
    fn prosperity_predicts_turnout_in_the_generator() {
        let out = analyze(&config()).unwrap();
        // Income and education both enter the generating ratio positively.
        assert!(out.fit.coef[1].estimate > 0.0, "income {}", out.fit.coef[1].estimate);
        assert!(out.fit.mcfadden_r2 > 0.05, "r2 {}", out.fit.mcfadden_r2);
    }

    #[test]
    fn online_mode_without_a_state_is_a_usage_error() {
        let mut c = config();
        c.offline = false;
        assert_eq!(analyze(&c).unwrap_err().exit_code(), 2);
    }
}
