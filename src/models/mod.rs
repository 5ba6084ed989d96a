//! Estimators behind the lessons.
//!
//! Each estimator is a pure function from prepared arrays to a result struct
//! so that lessons can own data acquisition and presentation. Nothing here
//! prints or fetches.

pub mod ar;
pub mod logit;
pub mod panel;
pub mod spatial;

pub use ar::*;
pub use logit::*;
pub use panel::*;
pub use spatial::*;

use serde::Serialize;

use crate::math::OlsFit;

/// One line of a coefficient table.
///
/// `stat` is a t or z statistic depending on which estimator produced the
/// row; report code picks the column header.
#[derive(Debug, Clone, Serialize)]
pub struct CoefRow {
    pub name: String,
    pub estimate: f64,
    pub std_err: f64,
    pub stat: f64,
    pub p_value: f64,
}

/// Pair coefficient names with a fitted regression, one row per column.
///
/// # Panics
/// Panics if `names` does not have one entry per design column. Callers build
/// both from the same column list.
pub fn coef_rows(names: &[String], fit: &OlsFit) -> Vec<CoefRow> {
    assert_eq!(names.len(), fit.k, "one name per design column");
    names
        .iter()
        .enumerate()
        .map(|(j, name)| CoefRow {
            name: name.clone(),
            estimate: fit.coef[j],
            std_err: fit.std_err[j],
            stat: fit.t_stats[j],
            p_value: fit.p_values[j],
        })
        .collect()
}
