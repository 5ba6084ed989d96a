//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that
//! parses CLI arguments, builds the typed per-lesson config, and hands off
//! to the lesson pipeline. All printing and file output live in the lessons.

use clap::Parser;

use crate::cli::{Cli, Command, MleArgs, PanelArgs, SpatialArgs, TrendArgs, TurnoutArgs};
use crate::domain::{MleConfig, PanelConfig, SpatialConfig, TrendConfig, TurnoutConfig};
use crate::error::AppError;
use crate::lessons;

/// Entry point for the `polmeth` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Trend(args) => lessons::trend::run(&trend_config(args)?),
        Command::Panel(args) => lessons::panel::run(&panel_config(args)?),
        Command::Spatial(args) => lessons::spatial::run(&spatial_config(args)?),
        Command::Turnout(args) => lessons::turnout::run(&turnout_config(args)?),
        Command::Mle(args) => lessons::mle::run(&mle_config(args)),
    }
}

fn check_plot_dims(width: usize, height: usize) -> Result<(), AppError> {
    if width < 10 || height < 5 {
        return Err(AppError::usage(format!(
            "Plot dimensions must be at least 10x5, got {width}x{height}."
        )));
    }
    Ok(())
}

fn check_state_fips(state: &str) -> Result<(), AppError> {
    if state.len() != 2 || !state.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::usage(format!(
            "State FIPS must be two digits, got `{state}`."
        )));
    }
    Ok(())
}

fn trend_config(args: TrendArgs) -> Result<TrendConfig, AppError> {
    if args.max_order == 0 || args.max_order > 24 {
        return Err(AppError::usage(format!(
            "--max-order must be between 1 and 24, got {}.",
            args.max_order
        )));
    }
    if args.horizon == 0 {
        return Err(AppError::usage("--horizon must be at least 1."));
    }
    check_plot_dims(args.width, args.height)?;
    Ok(TrendConfig {
        series: args.series,
        offline: args.common.offline,
        seed: args.common.seed,
        max_order: args.max_order,
        horizon: args.horizon,
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_csv: args.export_csv,
        export_json: args.common.export_json,
        svg: args.svg,
    })
}

fn panel_config(args: PanelArgs) -> Result<PanelConfig, AppError> {
    check_state_fips(&args.state)?;
    Ok(PanelConfig {
        offline: args.common.offline,
        seed: args.common.seed,
        year_start: args.year_start,
        year_end: args.year_end,
        state_fips: args.state,
        units: args.units,
        periods: args.periods,
        export_json: args.common.export_json,
    })
}

fn spatial_config(args: SpatialArgs) -> Result<SpatialConfig, AppError> {
    check_state_fips(&args.state)?;
    check_plot_dims(args.width, args.height)?;
    Ok(SpatialConfig {
        state_fips: args.state,
        weights: args.weights,
        knn: args.knn,
        offline: args.common.offline,
        seed: args.common.seed,
        lattice_side: args.lattice_side,
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_json: args.common.export_json,
    })
}

fn turnout_config(args: TurnoutArgs) -> Result<TurnoutConfig, AppError> {
    if let Some(state) = &args.state {
        check_state_fips(state)?;
    }
    Ok(TurnoutConfig {
        offline: args.common.offline,
        seed: args.common.seed,
        sample_size: args.sample_size,
        state_fips: args.state,
        max_iters: args.max_iters,
        export_csv: args.export_csv,
        export_json: args.common.export_json,
    })
}

fn mle_config(args: MleArgs) -> MleConfig {
    MleConfig {
        n: args.sample_size,
        seed: args.seed,
        intercept: args.intercept,
        slope: args.slope,
        sigma: args.sigma,
        max_iters: args.max_iters,
        export_json: args.export_json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn trend_flags_map_onto_the_config() {
        let Command::Trend(args) = parse(&[
            "polmeth",
            "trend",
            "--offline",
            "--series",
            "unemployment-rate",
            "--no-plot",
        ]) else {
            panic!("expected trend");
        };
        let config = trend_config(args).unwrap();
        assert!(config.offline);
        assert!(!config.plot, "--no-plot wins over the plot default");
        assert_eq!(config.max_order, 8);
    }

    #[test]
    fn zero_max_order_is_rejected() {
        let Command::Trend(args) = parse(&["polmeth", "trend", "--max-order", "0"]) else {
            panic!("expected trend");
        };
        assert_eq!(trend_config(args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn malformed_state_fips_is_rejected() {
        let Command::Spatial(args) = parse(&["polmeth", "spatial", "--state", "1"]) else {
            panic!("expected spatial");
        };
        assert_eq!(spatial_config(args).unwrap_err().exit_code(), 2);

        let Command::Panel(args) = parse(&["polmeth", "panel", "--state", "AL"]) else {
            panic!("expected panel");
        };
        assert_eq!(panel_config(args).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn turnout_state_filter_is_optional() {
        let Command::Turnout(args) = parse(&["polmeth", "turnout", "--offline"]) else {
            panic!("expected turnout");
        };
        let config = turnout_config(args).unwrap();
        assert_eq!(config.state_fips, None);
    }
}
