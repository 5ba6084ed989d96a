//! FRED API integration for the macro series registry.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;

use super::parse_value;
use crate::domain::{EconSeries, TimeSeries};
use crate::error::AppError;

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";
const OBS_LIMIT: usize = 10000;

pub struct FredClient {
    client: Client,
    api_key: String,
}

impl FredClient {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("FRED_API_KEY")
            .map_err(|_| AppError::usage("Missing FRED_API_KEY in environment (.env)."))?;
        Ok(Self {
            client: Client::new(),
            api_key,
        })
    }

    /// Fetch the full observation history for one registry series, oldest
    /// first. Placeholder observations (FRED uses `.`) are skipped.
    pub fn fetch_series(&self, series: EconSeries) -> Result<TimeSeries, AppError> {
        let resp = self
            .client
            .get(BASE_URL)
            .query(&[
                ("series_id", series.series_id()),
                ("api_key", &self.api_key),
                ("file_type", "json"),
                ("sort_order", "asc"),
                ("limit", &OBS_LIMIT.to_string()),
            ])
            .send()
            .map_err(|e| AppError::runtime(format!("FRED request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::runtime(format!(
                "FRED request failed with status {}.",
                resp.status()
            )));
        }

        let body: ObservationsResponse = resp
            .json()
            .map_err(|e| AppError::runtime(format!("Failed to parse FRED response: {e}")))?;

        let mut dates = Vec::with_capacity(body.observations.len());
        let mut values = Vec::with_capacity(body.observations.len());
        for obs in body.observations {
            let Some(value) = parse_value(&obs.value) else {
                continue;
            };
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d")
                .map_err(|e| AppError::runtime(format!("Invalid FRED date '{}': {e}", obs.date)))?;
            dates.push(date);
            values.push(value);
        }

        if values.is_empty() {
            return Err(AppError::runtime(format!(
                "No usable observations returned for series {}.",
                series.series_id()
            )));
        }
        TimeSeries::new(series.label(), dates, values)
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}
