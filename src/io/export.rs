//! Export fitted results to CSV and JSON.
//!
//! Exports are meant to be easy to consume in spreadsheets or downstream
//! scripts; JSON carries whatever result struct the lesson serializes.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::error::AppError;
use crate::models::CoefRow;

/// Write a coefficient table to CSV, one row per term.
pub fn write_coef_csv(path: &Path, rows: &[CoefRow], stat_label: &str) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::usage(format!("Failed to create CSV '{}': {e}", path.display()))
    })?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(["term", "estimate", "std_err", stat_label, "p_value"])
        .map_err(|e| AppError::runtime(format!("Failed to write CSV header: {e}")))?;
    for row in rows {
        writer
            .write_record([
                row.name.clone(),
                format!("{:.10}", row.estimate),
                format!("{:.10}", row.std_err),
                format!("{:.6}", row.stat),
                format!("{:.8}", row.p_value),
            ])
            .map_err(|e| AppError::runtime(format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::runtime(format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

/// Write an observed series and an appended forecast path to CSV.
///
/// Observed rows carry an empty `forecast` cell and vice versa, so the two
/// segments plot as separate series in a spreadsheet.
pub fn write_series_csv(
    path: &Path,
    labels: &[String],
    observed: &[f64],
    forecast: &[f64],
) -> Result<(), AppError> {
    if labels.len() != observed.len() + forecast.len() {
        return Err(AppError::runtime(format!(
            "Series export got {} labels for {} observed + {} forecast values.",
            labels.len(),
            observed.len(),
            forecast.len()
        )));
    }
    let file = File::create(path).map_err(|e| {
        AppError::usage(format!("Failed to create CSV '{}': {e}", path.display()))
    })?;
    let mut writer = csv::Writer::from_writer(file);

    writer
        .write_record(["period", "observed", "forecast"])
        .map_err(|e| AppError::runtime(format!("Failed to write CSV header: {e}")))?;
    for (i, label) in labels.iter().enumerate() {
        let (obs, fcast) = if i < observed.len() {
            (format!("{:.10}", observed[i]), String::new())
        } else {
            (String::new(), format!("{:.10}", forecast[i - observed.len()]))
        };
        writer
            .write_record([label.clone(), obs, fcast])
            .map_err(|e| AppError::runtime(format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::runtime(format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

/// Write any serializable lesson result as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::usage(format!("Failed to create JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::runtime(format!("Failed to write JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<CoefRow> {
        vec![CoefRow {
            name: "const".to_string(),
            estimate: 1.0,
            std_err: 0.25,
            stat: 4.0,
            p_value: 0.0001,
        }]
    }

    #[test]
    fn coef_csv_round_trips_through_the_csv_crate() {
        let path = std::env::temp_dir().join("polmeth-coef-test.csv");
        write_coef_csv(&path, &rows(), "t").unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec!["term", "estimate", "std_err", "t", "p_value"])
        );
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.get(0), Some("const"));
        assert_eq!(record.get(1).unwrap().parse::<f64>().unwrap(), 1.0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn series_csv_splits_observed_and_forecast_columns() {
        let path = std::env::temp_dir().join("polmeth-series-test.csv");
        let labels: Vec<String> = ["2024-01", "2024-02", "2024-03"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        write_series_csv(&path, &labels, &[1.0, 2.0], &[2.5]).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("2024-01,1."));
        assert!(lines[1].ends_with(','), "observed row has empty forecast");
        assert!(lines[3].starts_with("2024-03,,2.5"), "got: {}", lines[3]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn mismatched_label_count_is_rejected() {
        let path = std::env::temp_dir().join("polmeth-bad-series.csv");
        let err = write_series_csv(&path, &["a".to_string()], &[1.0], &[2.0]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
