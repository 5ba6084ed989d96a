//! Census ACS 5-year estimates over the array-of-arrays JSON API.
//!
//! The API answers with a JSON array of string arrays: the first row is a
//! header, geography columns come last, and any cell may be null. An API key
//! is optional at classroom request volumes, so `CENSUS_API_KEY` is picked up
//! when present and omitted otherwise.

use reqwest::blocking::Client;

use super::parse_value;
use crate::domain::AcsVariable;
use crate::error::AppError;
use crate::table::{Frame, Value};

const BASE_URL: &str = "https://api.census.gov/data";

/// ACS publishes suppressed estimates as large negative sentinel codes
/// (-666666666 and friends); anything at or below this is missing.
const ACS_SENTINEL: f64 = -111_111_111.0;

pub struct CensusClient {
    client: Client,
    api_key: Option<String>,
}

/// One county-level ACS extract plus how many rows were unusable.
#[derive(Debug)]
pub struct AcsTable {
    pub frame: Frame,
    pub dropped: usize,
}

impl CensusClient {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            client: Client::new(),
            api_key: std::env::var("CENSUS_API_KEY").ok(),
        }
    }

    /// County rows for one state and ACS year. The resulting frame is keyed
    /// by the five-digit `fips` column (state + county).
    ///
    /// # Errors
    /// Exit code 2 for a malformed state FIPS, exit code 4 on network or
    /// format problems, exit code 3 when no county row survives.
    pub fn fetch_county_table(
        &self,
        year: i32,
        state_fips: &str,
        variables: &[AcsVariable],
    ) -> Result<AcsTable, AppError> {
        if state_fips.len() != 2 || !state_fips.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::usage(format!(
                "State FIPS must be two digits, got `{state_fips}`."
            )));
        }
        if variables.is_empty() {
            return Err(AppError::usage("Census query needs at least one variable."));
        }

        let get_list: Vec<&str> = std::iter::once("NAME")
            .chain(variables.iter().map(|v| v.code()))
            .collect();
        let mut query = vec![
            ("get".to_string(), get_list.join(",")),
            ("for".to_string(), "county:*".to_string()),
            ("in".to_string(), format!("state:{state_fips}")),
        ];
        if let Some(key) = &self.api_key {
            query.push(("key".to_string(), key.clone()));
        }

        let url = format!("{BASE_URL}/{year}/acs/acs5");
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .map_err(|e| AppError::runtime(format!("Census request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::runtime(format!(
                "Census request failed with status {}.",
                resp.status()
            )));
        }

        let rows: Vec<Vec<Option<String>>> = resp
            .json()
            .map_err(|e| AppError::runtime(format!("Failed to parse Census response: {e}")))?;
        table_from_rows(year, state_fips, variables, rows)
    }
}

/// Build a frame from the raw array-of-arrays payload. Rows with null cells
/// or sentinel values are counted and dropped.
fn table_from_rows(
    year: i32,
    state_fips: &str,
    variables: &[AcsVariable],
    rows: Vec<Vec<Option<String>>>,
) -> Result<AcsTable, AppError> {
    let mut iter = rows.into_iter();
    let header: Vec<String> = iter
        .next()
        .ok_or_else(|| AppError::runtime("Census response contained no header row."))?
        .into_iter()
        .map(|c| c.unwrap_or_default())
        .collect();
    let col = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AppError::runtime(format!("Census response is missing column `{name}`.")))
    };

    let name_idx = col("NAME")?;
    let state_idx = col("state")?;
    let county_idx = col("county")?;
    let var_idx: Vec<usize> = variables
        .iter()
        .map(|v| col(v.code()))
        .collect::<Result<_, _>>()?;

    let mut columns = vec!["fips".to_string(), "name".to_string()];
    columns.extend(variables.iter().map(|v| v.column().to_string()));
    let mut frame = Frame::new(format!("acs{year}/{state_fips}"), columns)?;

    let mut dropped = 0usize;
    for row in iter {
        let cell = |i: usize| row.get(i).cloned().flatten();
        let (Some(name), Some(state), Some(county)) =
            (cell(name_idx), cell(state_idx), cell(county_idx))
        else {
            dropped += 1;
            continue;
        };

        let mut values = Vec::with_capacity(variables.len());
        for &i in &var_idx {
            match cell(i).as_deref().and_then(parse_value) {
                Some(v) if v > ACS_SENTINEL => values.push(Value::num(v)),
                _ => break,
            }
        }
        if values.len() != variables.len() {
            dropped += 1;
            continue;
        }

        let mut out = vec![Value::text(format!("{state}{county}")), Value::text(name)];
        out.extend(values);
        frame.push_row(out)?;
    }

    if frame.n_rows() == 0 {
        return Err(AppError::insufficient(format!(
            "No usable county rows for state FIPS {state_fips} in ACS {year}."
        )));
    }
    Ok(AcsTable { frame, dropped })
}
