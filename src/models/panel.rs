//! Panel estimators: pooled OLS, the within (fixed-effects) transform, and
//! Swamy-Arora random effects, plus the Hausman specification test.
//!
//! The panel is long format, one row per unit-period. Estimators share the
//! same regressor columns; the intercept is handled per estimator:
//! - pooled: plain intercept
//! - within: no intercept (absorbed by unit demeaning, df charged `n_units`)
//! - random effects: quasi-demeaned intercept column `1 - theta_i`

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use super::{CoefRow, coef_rows};
use crate::error::AppError;
use crate::math::{design_with_intercept, fit_ols, fit_ols_with_df};

/// Long-format panel data with a dense unit index.
#[derive(Debug)]
pub struct Panel {
    unit: Vec<usize>,
    labels: Vec<String>,
    y: Vec<f64>,
    x: Vec<Vec<f64>>,
}

impl Panel {
    /// Build a panel from parallel arrays. Units are indexed in first
    /// appearance order of `unit_keys`.
    ///
    /// # Errors
    /// Exit code 2 when array lengths disagree or there are no regressors,
    /// exit code 3 when there are fewer than two units or a unit has fewer
    /// than two periods.
    pub fn new(unit_keys: &[String], y: Vec<f64>, x: Vec<Vec<f64>>) -> Result<Self, AppError> {
        let n = unit_keys.len();
        if n == 0 {
            return Err(AppError::insufficient("Panel has no rows."));
        }
        if y.len() != n {
            return Err(AppError::usage(format!(
                "Panel has {n} unit keys but {} responses.",
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(AppError::usage("Panel needs at least one regressor."));
        }
        for (j, col) in x.iter().enumerate() {
            if col.len() != n {
                return Err(AppError::usage(format!(
                    "Regressor column {j} has {} rows, expected {n}.",
                    col.len()
                )));
            }
        }

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut labels = Vec::new();
        let mut unit = Vec::with_capacity(n);
        for key in unit_keys {
            let next = index.len();
            let id = *index.entry(key.as_str()).or_insert(next);
            if id == labels.len() {
                labels.push(key.clone());
            }
            unit.push(id);
        }
        if labels.len() < 2 {
            return Err(AppError::insufficient(
                "Panel estimators need at least two units.",
            ));
        }

        let mut counts = vec![0usize; labels.len()];
        for &u in &unit {
            counts[u] += 1;
        }
        if let Some(thin) = counts.iter().position(|c| *c < 2) {
            return Err(AppError::insufficient(format!(
                "Every unit needs at least two periods; `{}` has {}.",
                labels[thin], counts[thin]
            )));
        }

        Ok(Self {
            unit,
            labels,
            y,
            x,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    pub fn n_units(&self) -> usize {
        self.labels.len()
    }

    pub fn k(&self) -> usize {
        self.x.len()
    }

    fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_units()];
        for &u in &self.unit {
            counts[u] += 1;
        }
        counts
    }

    fn unit_means(&self, values: &[f64]) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_units()];
        let counts = self.counts();
        for (row, &u) in self.unit.iter().enumerate() {
            sums[u] += values[row];
        }
        for (s, &c) in sums.iter_mut().zip(counts.iter()) {
            *s /= c as f64;
        }
        sums
    }

    fn demean(&self, values: &[f64]) -> Vec<f64> {
        let means = self.unit_means(values);
        self.unit
            .iter()
            .enumerate()
            .map(|(row, &u)| values[row] - means[u])
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PooledFit {
    pub coef: Vec<CoefRow>,
    pub r_squared: f64,
    pub sigma2: f64,
    pub n: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithinFit {
    /// Slope rows only; unit intercepts are absorbed.
    pub coef: Vec<CoefRow>,
    pub r_squared_within: f64,
    pub sigma2_e: f64,
    pub n: usize,
    pub n_units: usize,
    #[serde(skip)]
    pub cov: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RandomEffectsFit {
    pub coef: Vec<CoefRow>,
    /// Average quasi-demeaning weight across units.
    pub theta: f64,
    pub sigma2_e: f64,
    pub sigma2_u: f64,
    #[serde(skip)]
    pub cov: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HausmanTest {
    pub stat: f64,
    pub df: usize,
    pub p_value: f64,
}

/// Pooled OLS: ignores the panel structure entirely.
pub fn fit_pooled(panel: &Panel, x_names: &[String]) -> Result<PooledFit, AppError> {
    let design = design_with_intercept(&panel.x, panel.n_rows())?;
    let y = DVector::from_vec(panel.y.clone());
    let fit = fit_ols(&design, &y)?;

    let mut names = vec!["const".to_string()];
    names.extend(x_names.iter().cloned());
    Ok(PooledFit {
        coef: coef_rows(&names, &fit),
        r_squared: fit.r_squared,
        sigma2: fit.sigma2,
        n: fit.n,
    })
}

/// Within estimator: demean y and x by unit, regress without an intercept.
///
/// Degrees of freedom charge one mean per unit on top of the slopes.
pub fn fit_within(panel: &Panel, x_names: &[String]) -> Result<WithinFit, AppError> {
    let n = panel.n_rows();
    let k = panel.k();
    if n <= panel.n_units() + k {
        return Err(AppError::insufficient(format!(
            "Within estimator needs n > units + k: n={n}, units={}, k={k}.",
            panel.n_units()
        )));
    }

    let y_dm = DVector::from_vec(panel.demean(&panel.y));
    let x_dm: Vec<Vec<f64>> = panel.x.iter().map(|col| panel.demean(col)).collect();
    let design = DMatrix::from_fn(n, k, |r, c| x_dm[c][r]);
    let df = n - panel.n_units() - k;
    let fit = fit_ols_with_df(&design, &y_dm, df)?;

    Ok(WithinFit {
        coef: coef_rows(x_names, &fit),
        r_squared_within: fit.r_squared,
        sigma2_e: fit.sigma2,
        n,
        n_units: panel.n_units(),
        cov: fit.cov,
    })
}

/// Swamy-Arora random effects via quasi-demeaning.
///
/// Variance components come from the within fit (`sigma2_e`) and the
/// between regression on unit means (`sigma2_u`, clamped at zero).
pub fn fit_random_effects(
    panel: &Panel,
    x_names: &[String],
) -> Result<RandomEffectsFit, AppError> {
    let within = fit_within(panel, x_names)?;
    let sigma2_e = within.sigma2_e;

    let m = panel.n_units();
    let k = panel.k();
    if m < k + 2 {
        return Err(AppError::insufficient(format!(
            "Between regression needs at least k+2 units: units={m}, k={k}."
        )));
    }

    let y_bar = panel.unit_means(&panel.y);
    let x_bar: Vec<Vec<f64>> = panel.x.iter().map(|col| panel.unit_means(col)).collect();
    let between_design = design_with_intercept(&x_bar, m)?;
    let between = fit_ols(&between_design, &DVector::from_vec(y_bar.clone()))?;
    let sse_between: f64 = between.residuals.iter().map(|r| r * r).sum();
    let sigma2_between = sse_between / (m - k - 1) as f64;

    let t_bar = panel.n_rows() as f64 / m as f64;
    let sigma2_u = (sigma2_between - sigma2_e / t_bar).max(0.0);

    let counts = panel.counts();
    let theta: Vec<f64> = counts
        .iter()
        .map(|&t| 1.0 - (sigma2_e / (sigma2_e + t as f64 * sigma2_u)).sqrt())
        .collect();

    let n = panel.n_rows();
    let y_star = DVector::from_fn(n, |r, _| {
        let u = panel.unit[r];
        panel.y[r] - theta[u] * y_bar[u]
    });
    let design = DMatrix::from_fn(n, k + 1, |r, c| {
        let u = panel.unit[r];
        if c == 0 {
            1.0 - theta[u]
        } else {
            panel.x[c - 1][r] - theta[u] * x_bar[c - 1][u]
        }
    });
    let fit = fit_ols(&design, &y_star)?;

    let mut names = vec!["const".to_string()];
    names.extend(x_names.iter().cloned());
    Ok(RandomEffectsFit {
        coef: coef_rows(&names, &fit),
        theta: theta.iter().sum::<f64>() / theta.len() as f64,
        sigma2_e,
        sigma2_u,
        cov: fit.cov,
    })
}

/// Hausman test of random against fixed effects on the shared slopes.
///
/// Large statistics mean the unit effects correlate with the regressors, so
/// random effects is inconsistent and the within estimator should be read.
///
/// # Errors
/// Exit code 4 when the covariance difference is singular.
pub fn hausman(within: &WithinFit, re: &RandomEffectsFit) -> Result<HausmanTest, AppError> {
    let k = within.coef.len();
    if re.coef.len() != k + 1 {
        return Err(AppError::runtime(format!(
            "Hausman test got {} within slopes but {} random-effects rows.",
            k,
            re.coef.len()
        )));
    }

    let diff = DVector::from_fn(k, |j, _| within.coef[j].estimate - re.coef[j + 1].estimate);
    let v = DMatrix::from_fn(k, k, |i, j| within.cov[i][j] - re.cov[i + 1][j + 1]);
    let v_inv = v.try_inverse().ok_or_else(|| {
        AppError::runtime("Hausman covariance difference is singular; test unavailable.")
    })?;

    // The difference matrix is only asymptotically positive definite, so
    // small samples can push the quadratic form below zero.
    let stat = (diff.transpose() * v_inv * &diff)[(0, 0)].max(0.0);
    let chi = ChiSquared::new(k as f64)
        .map_err(|e| AppError::runtime(format!("Invalid chi-squared (df={k}): {e}")))?;
    Ok(HausmanTest {
        stat,
        df: k,
        p_value: 1.0 - chi.cdf(stat),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    /// Unit effects correlate with x, so pooled OLS is biased upward and
    /// the within estimator is not.
    fn correlated_panel(m: usize, t: usize, seed: u64) -> (Vec<String>, Vec<f64>, Vec<Vec<f64>>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let alpha_dist = Normal::new(0.0, 2.0).unwrap();
        let u_dist = Normal::new(0.0, 1.0).unwrap();
        let eps_dist = Normal::new(0.0, 0.5).unwrap();

        let mut keys = Vec::with_capacity(m * t);
        let mut y = Vec::with_capacity(m * t);
        let mut x = Vec::with_capacity(m * t);
        for i in 0..m {
            let alpha = alpha_dist.sample(&mut rng);
            for _ in 0..t {
                let xi = 0.5 * alpha + u_dist.sample(&mut rng);
                keys.push(format!("unit-{i}"));
                x.push(xi);
                y.push(1.0 + 2.0 * xi + alpha + eps_dist.sample(&mut rng));
            }
        }
        (keys, y, vec![x])
    }

    fn names() -> Vec<String> {
        vec!["x".to_string()]
    }

    #[test]
    fn within_recovers_the_slope_where_pooled_is_biased() {
        let (keys, y, x) = correlated_panel(60, 8, 31);
        let panel = Panel::new(&keys, y, x).unwrap();

        let pooled = fit_pooled(&panel, &names()).unwrap();
        let within = fit_within(&panel, &names()).unwrap();

        assert!(
            (within.coef[0].estimate - 2.0).abs() < 0.1,
            "within slope {}",
            within.coef[0].estimate
        );
        assert!(
            pooled.coef[1].estimate > 2.5,
            "pooled slope {} should absorb the unit effects",
            pooled.coef[1].estimate
        );
    }

    #[test]
    fn within_slopes_ignore_unit_level_shifts() {
        let (keys, y, x) = correlated_panel(40, 6, 32);
        let panel = Panel::new(&keys, y.clone(), x.clone()).unwrap();
        let base = fit_within(&panel, &names()).unwrap();

        let mut shifted = y;
        for (row, key) in keys.iter().enumerate() {
            if key == "unit-0" {
                shifted[row] += 100.0;
            }
        }
        let panel = Panel::new(&keys, shifted, x).unwrap();
        let moved = fit_within(&panel, &names()).unwrap();

        assert!((base.coef[0].estimate - moved.coef[0].estimate).abs() < 1e-6);
    }

    #[test]
    fn random_effects_estimates_both_variance_components() {
        let (keys, y, x) = correlated_panel(60, 8, 33);
        let panel = Panel::new(&keys, y, x).unwrap();
        let re = fit_random_effects(&panel, &names()).unwrap();

        assert!(re.theta > 0.5 && re.theta < 1.0, "theta {}", re.theta);
        assert!(re.sigma2_u > 1.0, "sigma2_u {}", re.sigma2_u);
        assert!(
            (re.sigma2_e - 0.25).abs() < 0.1,
            "sigma2_e {}",
            re.sigma2_e
        );
    }

    #[test]
    fn hausman_rejects_under_correlated_effects() {
        let (keys, y, x) = correlated_panel(60, 8, 34);
        let panel = Panel::new(&keys, y, x).unwrap();

        let within = fit_within(&panel, &names()).unwrap();
        let re = fit_random_effects(&panel, &names()).unwrap();
        let test = hausman(&within, &re).unwrap();

        assert_eq!(test.df, 1);
        assert!(test.stat >= 0.0);
        assert!(test.p_value < 0.01, "p {}", test.p_value);
    }

    #[test]
    fn single_unit_panels_are_rejected() {
        let keys = vec!["a".to_string(); 4];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let x = vec![vec![1.0, 2.0, 3.0, 4.0]];
        assert_eq!(Panel::new(&keys, y, x).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn thin_units_are_rejected() {
        let keys = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        let y = vec![1.0, 2.0, 3.0];
        let x = vec![vec![1.0, 2.0, 3.0]];
        let err = Panel::new(&keys, y, x).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains('b'), "message: {err}");
    }
}
