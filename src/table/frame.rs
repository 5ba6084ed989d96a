//! A small typed frame for tabular data.
//!
//! Every lesson works on `Frame`s: loaders produce them, reshape steps derive
//! new columns, and models consume numeric column extractions. The frame
//! enforces the tidy-data invariants explicitly rather than leaving them to
//! downstream library calls:
//!
//! - every row has exactly one cell per column
//! - a designated key must be unique across rows
//! - inner joins report how many rows each side lost

use std::collections::{HashMap, HashSet};

use crate::error::AppError;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Num(f64),
    Missing,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn num(v: f64) -> Self {
        Value::Num(v)
    }

    /// Numeric view: `Num` directly, `Text` via parse, `Missing` as `None`.
    ///
    /// Non-finite parses are treated as missing so that sentinel strings like
    /// `"NaN"` never leak into model matrices.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(v) if v.is_finite() => Some(*v),
            Value::Num(_) => None,
            Value::Text(s) => {
                let v = s.trim().parse::<f64>().ok()?;
                if v.is_finite() { Some(v) } else { None }
            }
            Value::Missing => None,
        }
    }

    /// Text view: `Text` directly, `Num` formatted, `Missing` as `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Num(v) => Some(format!("{v}")),
            Value::Missing => None,
        }
    }
}

/// A column-schema'd table of rows.
#[derive(Debug, Clone)]
pub struct Frame {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Create an empty frame with the given column schema.
    ///
    /// # Errors
    /// Fails when the schema is empty or contains duplicate column names.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self, AppError> {
        if columns.is_empty() {
            return Err(AppError::runtime("Frame schema must have at least one column."));
        }
        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.as_str()) {
                return Err(AppError::runtime(format!("Duplicate column name '{c}' in frame schema.")));
            }
        }
        Ok(Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), AppError> {
        if row.len() != self.columns.len() {
            return Err(AppError::runtime(format!(
                "Row has {} cells, frame '{}' expects {}.",
                row.len(),
                self.name,
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    fn col_index(&self, column: &str) -> Result<usize, AppError> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| {
                AppError::runtime(format!("Frame '{}' has no column '{column}'.", self.name))
            })
    }

    /// Extract a numeric column.
    ///
    /// Non-convertible cells are reported with their row numbers (1-based,
    /// first three shown) rather than silently dropped.
    pub fn numeric(&self, column: &str) -> Result<Vec<f64>, AppError> {
        let idx = self.col_index(column)?;
        let mut out = Vec::with_capacity(self.rows.len());
        let mut bad_rows = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            match row[idx].as_num() {
                Some(v) => out.push(v),
                None => bad_rows.push(i + 1),
            }
        }
        if !bad_rows.is_empty() {
            let shown: Vec<String> = bad_rows.iter().take(3).map(|r| r.to_string()).collect();
            return Err(AppError::runtime(format!(
                "Column '{column}' of frame '{}' has {} non-numeric cell(s) (rows {}{}).",
                self.name,
                bad_rows.len(),
                shown.join(", "),
                if bad_rows.len() > 3 { ", ..." } else { "" }
            )));
        }
        Ok(out)
    }

    /// Extract a text column; missing cells are an error.
    pub fn text(&self, column: &str) -> Result<Vec<String>, AppError> {
        let idx = self.col_index(column)?;
        let mut out = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            match row[idx].as_text() {
                Some(s) => out.push(s),
                None => {
                    return Err(AppError::runtime(format!(
                        "Column '{column}' of frame '{}' is missing a value at row {}.",
                        self.name,
                        i + 1
                    )));
                }
            }
        }
        Ok(out)
    }

    /// Append a derived column.
    pub fn add_column(&mut self, column: impl Into<String>, values: Vec<Value>) -> Result<(), AppError> {
        let column = column.into();
        if self.columns.iter().any(|c| *c == column) {
            return Err(AppError::runtime(format!(
                "Frame '{}' already has a column '{column}'.",
                self.name
            )));
        }
        if values.len() != self.rows.len() {
            return Err(AppError::runtime(format!(
                "Derived column '{column}' has {} values, frame '{}' has {} rows.",
                values.len(),
                self.name,
                self.rows.len()
            )));
        }
        self.columns.push(column);
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.push(v);
        }
        Ok(())
    }

    /// Keep only rows whose `column` text equals `value` (case-insensitive).
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Frame, AppError> {
        let idx = self.col_index(column)?;
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                row[idx]
                    .as_text()
                    .is_some_and(|s| s.trim().eq_ignore_ascii_case(value.trim()))
            })
            .cloned()
            .collect();
        Ok(Frame {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Build the composite key string for a row.
    fn row_key(&self, row: &[Value], key_idx: &[usize]) -> Option<String> {
        let mut parts = Vec::with_capacity(key_idx.len());
        for &i in key_idx {
            parts.push(row[i].as_text()?);
        }
        Some(parts.join("|"))
    }

    /// Validate that `key` columns uniquely identify rows and return the
    /// key-to-row-index map.
    ///
    /// # Errors
    /// Fails (exit code 4) on a missing key cell or a duplicate key.
    pub fn key_map(&self, key: &[&str]) -> Result<HashMap<String, usize>, AppError> {
        let key_idx: Vec<usize> = key
            .iter()
            .map(|c| self.col_index(c))
            .collect::<Result<_, _>>()?;

        let mut map = HashMap::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let k = self.row_key(row, &key_idx).ok_or_else(|| {
                AppError::runtime(format!(
                    "Frame '{}' is missing a key value at row {}.",
                    self.name,
                    i + 1
                ))
            })?;
            if map.insert(k.clone(), i).is_some() {
                return Err(AppError::runtime(format!(
                    "Frame '{}' has a duplicate key '{k}' (key columns: {}).",
                    self.name,
                    key.join(", ")
                )));
            }
        }
        Ok(map)
    }

    /// Inner-join two frames on shared key columns.
    ///
    /// The result carries all left columns plus the right's non-key columns.
    /// Unmatched rows are dropped and counted per side so lessons can report
    /// what the join discarded.
    pub fn inner_join(&self, other: &Frame, on: &[&str]) -> Result<JoinOutcome, AppError> {
        let left_keys = self.key_map(on)?;
        let right_keys = other.key_map(on)?;

        let on_set: HashSet<&str> = on.iter().copied().collect();
        let right_extra_idx: Vec<usize> = other
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !on_set.contains(c.as_str()))
            .map(|(i, _)| i)
            .collect();

        let mut columns = self.columns.clone();
        for &i in &right_extra_idx {
            let col = &other.columns[i];
            if columns.contains(col) {
                return Err(AppError::runtime(format!(
                    "Join of '{}' and '{}' would duplicate column '{col}'.",
                    self.name, other.name
                )));
            }
            columns.push(col.clone());
        }

        let mut rows = Vec::new();
        let mut matched_right = 0usize;
        // Iterate left in row order so join output is deterministic.
        let key_idx: Vec<usize> = on
            .iter()
            .map(|c| self.col_index(c))
            .collect::<Result<_, _>>()?;
        for row in &self.rows {
            let Some(k) = self.row_key(row, &key_idx) else {
                continue;
            };
            if let Some(&j) = right_keys.get(&k) {
                matched_right += 1;
                let mut joined = row.clone();
                for &i in &right_extra_idx {
                    joined.push(other.rows[j][i].clone());
                }
                rows.push(joined);
            }
        }

        let frame = Frame {
            name: format!("{}+{}", self.name, other.name),
            columns,
            rows,
        };
        Ok(JoinOutcome {
            dropped_left: left_keys.len() - frame.n_rows(),
            dropped_right: right_keys.len() - matched_right,
            frame,
        })
    }
}

/// Result of an inner join, including what each side lost.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub frame: Frame,
    pub dropped_left: usize,
    pub dropped_right: usize,
}
