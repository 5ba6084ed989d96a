//! Shared domain types.
//!
//! The dataset registries here replace ad hoc string-built identifiers: every
//! remote series/table the lessons touch is an enum variant with an explicit
//! remote ID, so loaders can be iterated directly and exhaustively.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Economic time series available from the FRED-style observations API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EconSeries {
    /// Real gross domestic product (quarterly, chained dollars).
    RealGdp,
    /// Civilian unemployment rate (monthly, percent).
    UnemploymentRate,
    /// Consumer price index, all urban consumers (monthly, index).
    ConsumerPriceIndex,
    /// Effective federal funds rate (monthly, percent).
    FedFundsRate,
}

impl EconSeries {
    pub const ALL: [EconSeries; 4] = [
        EconSeries::RealGdp,
        EconSeries::UnemploymentRate,
        EconSeries::ConsumerPriceIndex,
        EconSeries::FedFundsRate,
    ];

    /// Remote series identifier understood by the observations API.
    pub fn series_id(self) -> &'static str {
        match self {
            EconSeries::RealGdp => "GDPC1",
            EconSeries::UnemploymentRate => "UNRATE",
            EconSeries::ConsumerPriceIndex => "CPIAUCSL",
            EconSeries::FedFundsRate => "FEDFUNDS",
        }
    }

    /// Human-readable label for terminal output.
    pub fn label(self) -> &'static str {
        match self {
            EconSeries::RealGdp => "Real GDP",
            EconSeries::UnemploymentRate => "Unemployment rate",
            EconSeries::ConsumerPriceIndex => "CPI (all urban)",
            EconSeries::FedFundsRate => "Federal funds rate",
        }
    }

    /// How to turn the raw series into a stationary one for AR modeling.
    ///
    /// Level series (GDP, CPI) become log-difference growth rates; series
    /// already quoted as rates are first-differenced.
    pub fn growth_transform(self) -> GrowthTransform {
        match self {
            EconSeries::RealGdp | EconSeries::ConsumerPriceIndex => GrowthTransform::LogDiff,
            EconSeries::UnemploymentRate | EconSeries::FedFundsRate => GrowthTransform::FirstDiff,
        }
    }
}

/// ACS 5-year table variables used by the census loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcsVariable {
    /// Total population (B01003_001E).
    Population,
    /// Median household income, dollars (B19013_001E).
    MedianHouseholdIncome,
    /// Population 25+ holding a bachelor's degree (B15003_022E).
    BachelorsDegrees,
}

impl AcsVariable {
    pub const ALL: [AcsVariable; 3] = [
        AcsVariable::Population,
        AcsVariable::MedianHouseholdIncome,
        AcsVariable::BachelorsDegrees,
    ];

    /// Variable code in the ACS detailed tables.
    pub fn code(self) -> &'static str {
        match self {
            AcsVariable::Population => "B01003_001E",
            AcsVariable::MedianHouseholdIncome => "B19013_001E",
            AcsVariable::BachelorsDegrees => "B15003_022E",
        }
    }

    /// Column name used for this variable in loaded frames.
    pub fn column(self) -> &'static str {
        match self {
            AcsVariable::Population => "population",
            AcsVariable::MedianHouseholdIncome => "median_income",
            AcsVariable::BachelorsDegrees => "bachelors",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AcsVariable::Population => "Total population",
            AcsVariable::MedianHouseholdIncome => "Median household income",
            AcsVariable::BachelorsDegrees => "Bachelor's degrees (25+)",
        }
    }
}

/// Transform applied to a raw series before AR modeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthTransform {
    /// `100 * ln(x_t / x_{t-1})` (percent growth for level series).
    LogDiff,
    /// `x_t - x_{t-1}` (for series already quoted as rates).
    FirstDiff,
}

/// Spatial weights construction scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightsKind {
    /// Shared-border contiguity from explicit neighbor pairs.
    Contiguity,
    /// k-nearest neighbors by centroid distance.
    Knn,
}

/// A dated univariate series, ordered oldest to newest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, AppError> {
        if dates.len() != values.len() {
            return Err(AppError::runtime(format!(
                "Series length mismatch: {} dates vs {} values.",
                dates.len(),
                values.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            dates,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Apply a growth transform, dropping the first observation.
    ///
    /// # Errors
    /// Fails with exit code 3 when fewer than two observations remain, and
    /// exit code 4 when a log-difference hits a non-positive level.
    pub fn growth(&self, transform: GrowthTransform) -> Result<TimeSeries, AppError> {
        if self.len() < 2 {
            return Err(AppError::insufficient(format!(
                "Series '{}' has {} observations; need at least 2 to difference.",
                self.name,
                self.len()
            )));
        }

        let mut values = Vec::with_capacity(self.len() - 1);
        for w in self.values.windows(2) {
            let (prev, curr) = (w[0], w[1]);
            let v = match transform {
                GrowthTransform::LogDiff => {
                    if !(prev > 0.0 && curr > 0.0) {
                        return Err(AppError::runtime(format!(
                            "Non-positive level in series '{}'; cannot take log-difference.",
                            self.name
                        )));
                    }
                    100.0 * (curr / prev).ln()
                }
                GrowthTransform::FirstDiff => curr - prev,
            };
            values.push(v);
        }

        let suffix = match transform {
            GrowthTransform::LogDiff => "growth",
            GrowthTransform::FirstDiff => "change",
        };
        TimeSeries::new(
            format!("{} ({suffix})", self.name),
            self.dates[1..].to_vec(),
            values,
        )
    }
}

/// Configuration for the time-series lesson (`polmeth trend`).
#[derive(Debug, Clone)]
pub struct TrendConfig {
    pub series: EconSeries,
    pub offline: bool,
    pub seed: u64,
    /// Largest AR order considered during BIC selection.
    pub max_order: usize,
    /// Forecast horizon in periods.
    pub horizon: usize,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
    pub svg: Option<PathBuf>,
}

/// Configuration for the panel lesson (`polmeth panel`).
#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub offline: bool,
    pub seed: u64,
    /// First and last ACS year fetched in online mode.
    pub year_start: i32,
    pub year_end: i32,
    /// Two-digit state FIPS fetched in online mode.
    pub state_fips: String,
    /// Synthetic panel dimensions in offline mode.
    pub units: usize,
    pub periods: usize,
    pub export_json: Option<PathBuf>,
}

/// Configuration for the spatial lesson (`polmeth spatial`).
#[derive(Debug, Clone)]
pub struct SpatialConfig {
    /// Two-digit state FIPS fetched in online mode.
    pub state_fips: String,
    pub weights: WeightsKind,
    /// Neighbor count for `WeightsKind::Knn`.
    pub knn: usize,
    pub offline: bool,
    pub seed: u64,
    /// Synthetic lattice is `lattice_side x lattice_side` in offline mode.
    pub lattice_side: usize,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_json: Option<PathBuf>,
}

/// Configuration for the election turnout lesson (`polmeth turnout`).
#[derive(Debug, Clone)]
pub struct TurnoutConfig {
    pub offline: bool,
    pub seed: u64,
    /// Synthetic county count in offline mode.
    pub sample_size: usize,
    /// Optional two-digit state FIPS filter in online mode.
    pub state_fips: Option<String>,
    pub max_iters: u64,
    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// Configuration for the likelihood demonstration lesson (`polmeth mle`).
#[derive(Debug, Clone)]
pub struct MleConfig {
    pub n: usize,
    pub seed: u64,
    /// Generating parameters for the synthetic sample.
    pub intercept: f64,
    pub slope: f64,
    pub sigma: f64,
    pub max_iters: u64,
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_log_diff_drops_first_observation() {
        let dates: Vec<NaiveDate> = (1..=3)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        let series = TimeSeries::new("gdp", dates, vec![100.0, 110.0, 121.0]).unwrap();

        let growth = series.growth(GrowthTransform::LogDiff).unwrap();
        assert_eq!(growth.len(), 2);
        let expected = 100.0 * (1.1_f64).ln();
        assert!((growth.values[0] - expected).abs() < 1e-12);
        assert!((growth.values[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn growth_rejects_non_positive_levels() {
        let dates: Vec<NaiveDate> = (1..=2)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        let series = TimeSeries::new("bad", dates, vec![-1.0, 2.0]).unwrap();

        let err = series.growth(GrowthTransform::LogDiff).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn growth_requires_two_observations() {
        let series = TimeSeries::new(
            "short",
            vec![NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()],
            vec![1.0],
        )
        .unwrap();
        let err = series.growth(GrowthTransform::FirstDiff).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn series_registry_ids_are_distinct() {
        let mut ids: Vec<&str> = EconSeries::ALL.iter().map(|s| s.series_id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), EconSeries::ALL.len());
    }
}
