//! Command-line parsing for the policy-methods workbench.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code. Each lesson is one subcommand; the
//! flag structs here map one-to-one onto the typed configs in `domain`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{EconSeries, WeightsKind};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "polmeth", version, about = "Policy-methods lessons: load, reshape, fit, report")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands, one per lesson.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Time-series lesson: growth rates, ACF/PACF, AR(p) by BIC, forecast.
    Trend(TrendArgs),
    /// Panel lesson: pooled OLS, fixed and random effects, Hausman test.
    Panel(PanelArgs),
    /// Spatial lesson: weights, Moran's I, spatial-lag maximum likelihood.
    Spatial(SpatialArgs),
    /// Election turnout lesson: logistic regression by maximum likelihood.
    Turnout(TurnoutArgs),
    /// Likelihood demonstration: Gaussian NLL minimized next to closed-form OLS.
    Mle(MleArgs),
}

/// Options shared by every lesson.
#[derive(Debug, Parser, Clone)]
pub struct CommonArgs {
    /// Use seeded synthetic data instead of remote sources.
    #[arg(long)]
    pub offline: bool,

    /// Random seed for synthetic data generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Export the main result as JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

/// Options for the time-series lesson.
#[derive(Debug, Parser)]
pub struct TrendArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Which registry series to analyze.
    #[arg(short = 's', long, value_enum, default_value_t = EconSeries::RealGdp)]
    pub series: EconSeries,

    /// Largest AR order considered during BIC selection.
    #[arg(long, default_value_t = 8)]
    pub max_order: usize,

    /// Forecast horizon in periods.
    #[arg(long, default_value_t = 12)]
    pub horizon: usize,

    /// Render ASCII plots in the terminal.
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the series and forecast to CSV.
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Write an SVG chart of the series and forecast.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,
}

/// Options for the panel lesson.
#[derive(Debug, Parser)]
pub struct PanelArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// First ACS year fetched in online mode.
    #[arg(long, default_value_t = 2017)]
    pub year_start: i32,

    /// Last ACS year fetched in online mode.
    #[arg(long, default_value_t = 2021)]
    pub year_end: i32,

    /// Two-digit state FIPS fetched in online mode.
    #[arg(long, default_value = "01")]
    pub state: String,

    /// Synthetic unit count in offline mode.
    #[arg(long, default_value_t = 60)]
    pub units: usize,

    /// Synthetic period count in offline mode.
    #[arg(long, default_value_t = 6)]
    pub periods: usize,
}

/// Options for the spatial lesson.
#[derive(Debug, Parser)]
pub struct SpatialArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Two-digit state FIPS fetched in online mode.
    #[arg(long, default_value = "01")]
    pub state: String,

    /// Spatial weights construction scheme.
    #[arg(long, value_enum, default_value_t = WeightsKind::Contiguity)]
    pub weights: WeightsKind,

    /// Neighbor count for the knn scheme.
    #[arg(long, default_value_t = 5)]
    pub knn: usize,

    /// Synthetic lattice side length in offline mode.
    #[arg(long, default_value_t = 12)]
    pub lattice_side: usize,

    /// Render an ASCII residual plot in the terminal.
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Options for the turnout lesson.
#[derive(Debug, Parser)]
pub struct TurnoutArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Synthetic county count in offline mode.
    #[arg(short = 'n', long, default_value_t = 400)]
    pub sample_size: usize,

    /// Optional two-digit state FIPS filter in online mode.
    #[arg(long)]
    pub state: Option<String>,

    /// Solver iteration cap.
    #[arg(long, default_value_t = 500)]
    pub max_iters: u64,

    /// Export the coefficient table to CSV.
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,
}

/// Options for the likelihood demonstration.
///
/// This lesson is synthetic by construction, so it takes no `--offline`.
#[derive(Debug, Parser)]
pub struct MleArgs {
    /// Random seed for the synthetic sample.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Export the comparison as JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Synthetic sample size.
    #[arg(short = 'n', long, default_value_t = 2000)]
    pub sample_size: usize,

    /// Generating intercept.
    #[arg(long, default_value_t = 20.0)]
    pub intercept: f64,

    /// Generating slope.
    #[arg(long, default_value_t = 0.8)]
    pub slope: f64,

    /// Generating error standard deviation.
    #[arg(long, default_value_t = 10.0)]
    pub sigma: f64,

    /// Solver iteration cap.
    #[arg(long, default_value_t = 2000)]
    pub max_iters: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cli = Cli::try_parse_from(["polmeth", "trend"]).unwrap();
        match cli.command {
            Command::Trend(args) => {
                assert_eq!(args.series, EconSeries::RealGdp);
                assert_eq!(args.max_order, 8);
                assert!(!args.common.offline);
            }
            other => panic!("expected trend, got {other:?}"),
        }
    }

    #[test]
    fn offline_and_seed_flags_flatten_in() {
        let cli = Cli::try_parse_from(["polmeth", "panel", "--offline", "--seed", "7"]).unwrap();
        match cli.command {
            Command::Panel(args) => {
                assert!(args.common.offline);
                assert_eq!(args.common.seed, 7);
            }
            other => panic!("expected panel, got {other:?}"),
        }
    }

    #[test]
    fn mle_takes_its_own_seed_and_size() {
        let cli = Cli::try_parse_from(["polmeth", "mle", "--seed", "7", "-n", "500"]).unwrap();
        match cli.command {
            Command::Mle(args) => {
                assert_eq!(args.seed, 7);
                assert_eq!(args.sample_size, 500);
            }
            other => panic!("expected mle, got {other:?}"),
        }
    }

    #[test]
    fn weights_scheme_parses_as_value_enum() {
        let cli =
            Cli::try_parse_from(["polmeth", "spatial", "--weights", "knn", "--knn", "4"]).unwrap();
        match cli.command {
            Command::Spatial(args) => {
                assert_eq!(args.weights, WeightsKind::Knn);
                assert_eq!(args.knn, 4);
            }
            other => panic!("expected spatial, got {other:?}"),
        }
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["polmeth", "regress"]).is_err());
    }
}
