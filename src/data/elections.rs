//! County-level 2020 presidential results and the Census adjacency file.
//!
//! Both sources are plain files served over HTTP:
//! - results: a headed CSV, one row per county nationwide
//! - adjacency: tab-delimited four-field rows ("name, GEOID, neighbor name,
//!   neighbor GEOID") where the source county appears only on the first row
//!   of its group and continuation rows leave the first two fields empty

use reqwest::blocking::Client;

use super::parse_value;
use crate::error::AppError;
use crate::table::{Frame, Value};

const RESULTS_URL: &str = "https://raw.githubusercontent.com/tonmcg/US_County_Level_Election_Results_08-24/master/2020_US_County_Level_Presidential_Results.csv";
const ADJACENCY_URL: &str = "https://www2.census.gov/geo/docs/reference/county_adjacency.txt";

pub struct ElectionsClient {
    client: Client,
}

impl ElectionsClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// County vote totals for one state, keyed by five-digit `fips`.
    pub fn fetch_state_results(&self, state_fips: &str) -> Result<Frame, AppError> {
        let text = self.get_text(RESULTS_URL, "Election results")?;
        results_from_csv(state_fips, &text)
    }

    /// Undirected neighbor pairs for one state's counties, as GEOID strings.
    /// The file lists each county as its own first neighbor; callers building
    /// weights drop those self-pairs.
    pub fn fetch_state_adjacency(&self, state_fips: &str) -> Result<Vec<(String, String)>, AppError> {
        let text = self.get_text(ADJACENCY_URL, "County adjacency")?;
        adjacency_pairs(state_fips, &text)
    }

    fn get_text(&self, url: &str, what: &str) -> Result<String, AppError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| AppError::runtime(format!("{what} request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::runtime(format!(
                "{what} request failed with status {}.",
                resp.status()
            )));
        }
        resp.text()
            .map_err(|e| AppError::runtime(format!("{what} body could not be read: {e}")))
    }
}

impl Default for ElectionsClient {
    fn default() -> Self {
        Self::new()
    }
}

fn results_from_csv(state_fips: &str, text: &str) -> Result<Frame, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| AppError::runtime(format!("Results file has no header row: {e}")))?
        .clone();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AppError::runtime(format!("Results file is missing column `{name}`.")))
    };

    let fips_idx = col("county_fips")?;
    let county_idx = col("county_name")?;
    let gop_idx = col("votes_gop")?;
    let dem_idx = col("votes_dem")?;
    let total_idx = col("total_votes")?;
    let per_gop_idx = col("per_gop")?;

    let columns = ["fips", "county", "votes_gop", "votes_dem", "total_votes", "per_gop"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut frame = Frame::new(format!("results2020/{state_fips}"), columns)?;

    for record in reader.records() {
        let record =
            record.map_err(|e| AppError::runtime(format!("Results file is not valid CSV: {e}")))?;
        // Some exports strip the leading zero from the FIPS.
        let fips = format!("{:0>5}", record.get(fips_idx).unwrap_or(""));
        if !fips.starts_with(state_fips) {
            continue;
        }
        let county = record.get(county_idx).unwrap_or("").to_string();
        let parsed: Option<Vec<f64>> = [gop_idx, dem_idx, total_idx, per_gop_idx]
            .iter()
            .map(|&i| record.get(i).and_then(parse_value))
            .collect();
        let Some(nums) = parsed else {
            continue;
        };
        frame.push_row(vec![
            Value::text(fips),
            Value::text(county),
            Value::num(nums[0]),
            Value::num(nums[1]),
            Value::num(nums[2]),
            Value::num(nums[3]),
        ])?;
    }

    if frame.n_rows() == 0 {
        return Err(AppError::insufficient(format!(
            "No county results for state FIPS {state_fips}."
        )));
    }
    Ok(frame)
}

fn adjacency_pairs(state_fips: &str, text: &str) -> Result<Vec<(String, String)>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut current = String::new();
    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| AppError::runtime(format!("Adjacency file is not valid TSV: {e}")))?;
        if let Some(own) = record.get(1) {
            let own = own.trim();
            if !own.is_empty() {
                current = own.to_string();
            }
        }
        let Some(neighbor) = record.get(3).map(str::trim) else {
            continue;
        };
        if current.is_empty() || neighbor.is_empty() {
            continue;
        }
        if current.starts_with(state_fips) && neighbor.starts_with(state_fips) {
            pairs.push((current.clone(), neighbor.to_string()));
        }
    }

    if pairs.is_empty() {
        return Err(AppError::insufficient(format!(
            "No adjacency rows for state FIPS {state_fips}."
        )));
    }
    Ok(pairs)
}
