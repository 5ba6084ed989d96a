//! Time-series lesson: one macro series from level to forecast.
//!
//! Pipeline: fetch the series (or generate it offline), transform to a
//! stationary growth/change series, inspect ACF/PACF, pick an AR order by
//! BIC, fit, and iterate a point forecast.

use serde::Serialize;

use crate::data::fred::FredClient;
use crate::data::sample;
use crate::domain::{TimeSeries, TrendConfig};
use crate::error::AppError;
use crate::io::{write_json, write_series_csv};
use crate::math::{acf, pacf};
use crate::models::{ArFit, OrderSelection, fit_ar, select_ar_order};
use crate::plot::{render_scatter, render_stems, write_svg_chart};
use crate::report::{format_acf_pacf, format_coef_table, format_order_selection, section};

/// Everything the trend lesson computes.
#[derive(Debug, Clone, Serialize)]
pub struct TrendOutput {
    pub series: TimeSeries,
    pub growth: TimeSeries,
    pub acf: Vec<f64>,
    pub pacf: Vec<f64>,
    /// Approximate 95% band `1.96 / sqrt(n)` for the correlograms.
    pub ci: f64,
    pub selection: OrderSelection,
    pub fit: ArFit,
    pub forecast: Vec<f64>,
    pub long_run_mean: Option<f64>,
}

/// Run the pipeline up to (but not including) presentation.
pub fn analyze(config: &TrendConfig) -> Result<TrendOutput, AppError> {
    let series = if config.offline {
        sample::macro_series(config.series, config.seed)?
    } else {
        FredClient::from_env()?.fetch_series(config.series)?
    };

    let growth = series.growth(config.series.growth_transform())?;

    // Correlograms a little past the largest candidate order, so the cutoff
    // (or lack of one) is visible.
    let max_lag = (config.max_order + 4).min(growth.len().saturating_sub(2));
    let acf = acf(&growth.values, max_lag)?;
    let pacf = pacf(&growth.values, max_lag)?;
    let ci = 1.96 / (growth.len() as f64).sqrt();

    let selection = select_ar_order(&growth.values, config.max_order)?;
    let fit = fit_ar(&growth.values, selection.chosen)?;
    let forecast = fit.forecast(&growth.values, config.horizon)?;
    let long_run_mean = fit.long_run_mean();

    Ok(TrendOutput {
        series,
        growth,
        acf,
        pacf,
        ci,
        selection,
        fit,
        forecast,
        long_run_mean,
    })
}

/// Full lesson: analyze, print, plot, export.
pub fn run(config: &TrendConfig) -> Result<(), AppError> {
    let out = analyze(config)?;

    println!("{}", section(&format!("Trend: {}", out.series.name)));
    println!(
        "Observations: {} raw -> {} after differencing ({} .. {})",
        out.series.len(),
        out.growth.len(),
        out.growth.dates[0],
        out.growth.dates[out.growth.len() - 1]
    );

    println!("{}", section("Correlograms"));
    print!("{}", format_acf_pacf(&out.acf, &out.pacf, out.ci));
    if config.plot {
        print!("{}", render_stems(&out.acf[1..], out.ci, config.plot_height.min(15), "ACF"));
        print!("{}", render_stems(&out.pacf, out.ci, config.plot_height.min(15), "PACF"));
    }

    println!("{}", section("Order selection (BIC)"));
    print!("{}", format_order_selection(&out.selection));

    println!("{}", section(&format!("AR({}) fit", out.fit.order)));
    print!("{}", format_coef_table(&out.fit.coef, "t"));
    println!(
        "sigma2 = {:.4} | R2 = {:.4} | n = {}",
        out.fit.sigma2, out.fit.r_squared, out.fit.n_used
    );
    if let Some(mean) = out.long_run_mean {
        println!("Long-run mean: {mean:.4}");
    }

    println!("{}", section(&format!("{}-step forecast", config.horizon)));
    for (h, v) in out.forecast.iter().enumerate() {
        println!("T+{:<3} {v:>10.4}", h + 1);
    }
    if config.plot {
        print!(
            "{}",
            render_scatter(
                &[],
                Some(&path_points(&out)),
                config.plot_width,
                config.plot_height,
                "t",
                &out.growth.name,
            )
        );
    }

    if let Some(path) = &config.export_csv {
        write_series_csv(path, &period_labels(&out), &out.growth.values, &out.forecast)?;
        println!("Wrote series CSV: {}", path.display());
    }
    if let Some(path) = &config.export_json {
        write_json(path, &out)?;
        println!("Wrote JSON: {}", path.display());
    }
    if let Some(path) = &config.svg {
        write_svg_chart(
            path,
            &format!("{} and AR({}) forecast", out.growth.name, out.fit.order),
            &[],
            Some(&path_points(&out)),
            "t",
            &out.growth.name,
        )?;
        println!("Wrote SVG: {}", path.display());
    }
    Ok(())
}

/// Observed series then forecast, on one shared time index.
fn path_points(out: &TrendOutput) -> Vec<(f64, f64)> {
    out.growth
        .values
        .iter()
        .chain(out.forecast.iter())
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect()
}

/// ISO dates for the observed part, `T+h` for the forecast part.
fn period_labels(out: &TrendOutput) -> Vec<String> {
    let mut labels: Vec<String> = out.growth.dates.iter().map(|d| d.to_string()).collect();
    for h in 1..=out.forecast.len() {
        labels.push(format!("T+{h}"));
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EconSeries;

    fn config(series: EconSeries) -> TrendConfig {
        TrendConfig {
            series,
            offline: true,
            seed: 42,
            max_order: 6,
            horizon: 12,
            plot: false,
            plot_width: 80,
            plot_height: 16,
            export_csv: None,
            export_json: None,
            svg: None,
        }
    }

    #[test]
    fn offline_pipeline_runs_end_to_end() {
        let out = analyze(&config(EconSeries::RealGdp)).unwrap();

        assert_eq!(out.growth.len(), out.series.len() - 1);
        assert_eq!(out.forecast.len(), 12);
        assert_eq!(out.acf.len(), 11); // lag 0 plus max_order + 4
        assert_eq!(out.pacf.len(), 10);
        assert!(out.fit.order <= 6);
        assert!(out.forecast.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn persistent_series_selects_a_dynamic_model() {
        // The offline GDP generator has AR(1)-style persistent growth.
        let out = analyze(&config(EconSeries::RealGdp)).unwrap();
        assert!(out.fit.order >= 1, "chose AR({})", out.fit.order);
        assert!(out.acf[1] > 0.2, "lag-1 acf {}", out.acf[1]);
    }

    #[test]
    fn forecast_heads_toward_the_long_run_mean() {
        let out = analyze(&config(EconSeries::UnemploymentRate)).unwrap();
        let Some(mean) = out.long_run_mean else {
            panic!("offline generator is stationary; expected a long-run mean");
        };
        let first_gap = (out.forecast[0] - mean).abs();
        let last_gap = (out.forecast[out.forecast.len() - 1] - mean).abs();
        assert!(last_gap <= first_gap + 1e-9, "{first_gap} -> {last_gap}");
    }

    #[test]
    fn labels_cover_observed_and_forecast() {
        let out = analyze(&config(EconSeries::ConsumerPriceIndex)).unwrap();
        let labels = period_labels(&out);
        assert_eq!(labels.len(), out.growth.len() + out.forecast.len());
        assert_eq!(labels[out.growth.len()], "T+1");
    }
}
