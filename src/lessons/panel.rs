//! Panel lesson: county income panels under pooled, fixed, and random
//! effects.
//!
//! The generating story (and the offline sample) has unit-level intercepts
//! that correlate with the regressor, so the three estimators disagree in an
//! instructive way and the Hausman test picks a side.

use std::collections::HashMap;

use serde::Serialize;

use crate::data::census::CensusClient;
use crate::data::sample;
use crate::domain::{AcsVariable, PanelConfig};
use crate::error::AppError;
use crate::io::write_json;
use crate::models::{
    HausmanTest, Panel, PooledFit, RandomEffectsFit, WithinFit, fit_pooled, fit_random_effects,
    fit_within, hausman,
};
use crate::report::{format_coef_table, format_hausman, section};

const REGRESSOR: &str = "pct_bachelors";

/// Everything the panel lesson computes.
#[derive(Debug, Serialize)]
pub struct PanelOutput {
    pub pooled: PooledFit,
    pub within: WithinFit,
    pub random: RandomEffectsFit,
    pub hausman: HausmanTest,
    pub n_rows: usize,
    pub n_units: usize,
    pub n_periods: usize,
    /// Units dropped in online mode for not appearing in every year.
    pub dropped_units: usize,
}

/// Run the pipeline up to (but not including) presentation.
pub fn analyze(config: &PanelConfig) -> Result<PanelOutput, AppError> {
    let (panel, periods, dropped_units) = if config.offline {
        let s = sample::county_panel(config.units, config.year_start, config.periods, config.seed)?;
        let panel = Panel::new(&s.unit_keys, s.outcome, vec![s.covariate])?;
        (panel, config.periods, 0)
    } else {
        build_acs_panel(config)?
    };

    let names = vec![REGRESSOR.to_string()];
    let pooled = fit_pooled(&panel, &names)?;
    let within = fit_within(&panel, &names)?;
    let random = fit_random_effects(&panel, &names)?;
    let hausman = hausman(&within, &random)?;

    Ok(PanelOutput {
        pooled,
        within,
        random,
        hausman,
        n_rows: panel.n_rows(),
        n_units: panel.n_units(),
        n_periods: periods,
        dropped_units,
    })
}

/// Stack one ACS county extract per year into a balanced long panel.
///
/// Counties missing from any year are dropped (and counted), since the
/// within-transformation wants every unit observed in every period.
fn build_acs_panel(config: &PanelConfig) -> Result<(Panel, usize, usize), AppError> {
    if config.year_end < config.year_start {
        return Err(AppError::usage(format!(
            "Year range is reversed: {}..{}.",
            config.year_start, config.year_end
        )));
    }
    let years: Vec<i32> = (config.year_start..=config.year_end).collect();
    if years.len() < 2 {
        return Err(AppError::usage(
            "Panel estimation needs at least two years; widen --year-start/--year-end.",
        ));
    }

    let variables = [
        AcsVariable::MedianHouseholdIncome,
        AcsVariable::BachelorsDegrees,
        AcsVariable::Population,
    ];
    let client = CensusClient::from_env();

    // fips -> per-year (outcome, covariate)
    let mut by_county: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
    for (t, &year) in years.iter().enumerate() {
        let table = client.fetch_county_table(year, &config.state_fips, &variables)?;
        let fips = table.frame.text("fips")?;
        let income = table.frame.numeric(AcsVariable::MedianHouseholdIncome.column())?;
        let bachelors = table.frame.numeric(AcsVariable::BachelorsDegrees.column())?;
        let population = table.frame.numeric(AcsVariable::Population.column())?;

        for i in 0..fips.len() {
            if !(income[i] > 0.0 && population[i] > 0.0) {
                continue;
            }
            let entry = by_county.entry(fips[i].clone()).or_default();
            // Keep years aligned; a county absent in an earlier year stays short.
            if entry.len() == t {
                entry.push((income[i].ln(), 100.0 * bachelors[i] / population[i]));
            }
        }
    }

    let mut keys: Vec<String> = by_county.keys().cloned().collect();
    keys.sort_unstable();

    let mut unit_keys = Vec::new();
    let mut outcome = Vec::new();
    let mut covariate = Vec::new();
    let mut dropped_units = 0usize;
    for key in keys {
        let rows = &by_county[&key];
        if rows.len() != years.len() {
            dropped_units += 1;
            continue;
        }
        for &(y, x) in rows {
            unit_keys.push(key.clone());
            outcome.push(y);
            covariate.push(x);
        }
    }
    if unit_keys.is_empty() {
        return Err(AppError::insufficient(format!(
            "No county appears in all years {}..{} for state {}.",
            config.year_start, config.year_end, config.state_fips
        )));
    }

    let panel = Panel::new(&unit_keys, outcome, vec![covariate])?;
    Ok((panel, years.len(), dropped_units))
}

/// Full lesson: analyze, print, export.
pub fn run(config: &PanelConfig) -> Result<(), AppError> {
    let out = analyze(config)?;

    println!("{}", section("Panel: ln(median income) on bachelor's share"));
    println!(
        "Rows: {} | units: {} | periods: {} | dropped (unbalanced): {}",
        out.n_rows, out.n_units, out.n_periods, out.dropped_units
    );

    println!("{}", section("Pooled OLS"));
    print!("{}", format_coef_table(&out.pooled.coef, "t"));
    println!("R2 = {:.4}", out.pooled.r_squared);

    println!("{}", section("Fixed effects (within)"));
    print!("{}", format_coef_table(&out.within.coef, "t"));
    println!(
        "within R2 = {:.4} | sigma2_e = {:.5}",
        out.within.r_squared_within, out.within.sigma2_e
    );

    println!("{}", section("Random effects (Swamy-Arora)"));
    print!("{}", format_coef_table(&out.random.coef, "t"));
    println!(
        "theta = {:.4} | sigma2_u = {:.5} | sigma2_e = {:.5}",
        out.random.theta, out.random.sigma2_u, out.random.sigma2_e
    );

    println!("{}", section("Specification"));
    print!("{}", format_hausman(&out.hausman));

    if let Some(path) = &config.export_json {
        write_json(path, &out)?;
        println!("Wrote JSON: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PanelConfig {
        PanelConfig {
            offline: true,
            seed: 42,
            year_start: 2017,
            year_end: 2021,
            units: 80,
            periods: 6,
            state_fips: "01".to_string(),
            export_json: None,
        }
    }

    #[test]
    fn offline_pipeline_runs_end_to_end() {
        let out = analyze(&config()).unwrap();
        assert_eq!(out.n_rows, 480);
        assert_eq!(out.n_units, 80);
        assert_eq!(out.within.coef.len(), 1);
        assert_eq!(out.random.coef.len(), 2);
        assert_eq!(out.hausman.df, 1);
    }

    #[test]
    fn correlated_effects_bias_the_pooled_slope() {
        let out = analyze(&config()).unwrap();
        let pooled_slope = out.pooled.coef[1].estimate;
        let within_slope = out.within.coef[0].estimate;

        // The generator ties unit effects to the covariate positively, so the
        // pooled slope overshoots and the within slope sits near 0.012.
        assert!(
            pooled_slope > within_slope,
            "pooled {pooled_slope} vs within {within_slope}"
        );
        assert!(
            (within_slope - 0.012).abs() < 0.004,
            "within slope {within_slope}"
        );
    }

    #[test]
    fn random_effects_sits_between_pooled_and_within() {
        let out = analyze(&config()).unwrap();
        let pooled = out.pooled.coef[1].estimate;
        let within = out.within.coef[0].estimate;
        let re = out.random.coef[1].estimate;

        let (lo, hi) = if pooled < within { (pooled, within) } else { (within, pooled) };
        assert!(re > lo - 0.002 && re < hi + 0.002, "re {re} outside [{lo}, {hi}]");
        assert!(out.random.theta > 0.0 && out.random.theta < 1.0);
    }

    #[test]
    fn reversed_year_range_is_a_usage_error() {
        let mut c = config();
        c.offline = false;
        c.year_start = 2021;
        c.year_end = 2017;
        assert_eq!(analyze(&c).unwrap_err().exit_code(), 2);
    }
}
