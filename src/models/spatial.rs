//! Spatial weights, Moran's I, and the spatial-lag model.
//!
//! Weights are neighbor lists applied row-standardized (each neighbor of
//! unit `i` carries weight `1/degree(i)`). The lag model
//!
//! `y = rho * W y + X beta + eps`
//!
//! is estimated by maximum likelihood: concentrate `beta` and `sigma2` out,
//! write the Jacobian `ln|I - rho W|` as a sum over eigenvalues of the
//! symmetrized weight matrix, and search the valid `rho` interval with a
//! golden-section solver.

use std::collections::BTreeSet;

use argmin::core::{CostFunction, Error as SolverError, Executor, State};
use argmin::core::{TerminationReason, TerminationStatus};
use argmin::solver::goldensectionsearch::GoldenSectionSearch;
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::Serialize;

use super::CoefRow;
use crate::error::AppError;
use crate::math::{design_with_intercept, solve_least_squares, two_sided_normal_p};

/// Symmetric contiguity structure over `n` units.
#[derive(Debug)]
pub struct SpatialWeights {
    neighbors: Vec<Vec<usize>>,
}

impl SpatialWeights {
    /// Build weights from undirected adjacency pairs.
    ///
    /// Pairs are symmetrized and deduplicated; self-pairs are skipped because
    /// adjacency files routinely list a unit inside its own neighbor group.
    ///
    /// # Errors
    /// Exit code 3 when `n < 2`, exit code 4 on out-of-range indices or when
    /// any unit ends up with no neighbors.
    pub fn from_pairs(n: usize, pairs: &[(usize, usize)]) -> Result<Self, AppError> {
        if n < 2 {
            return Err(AppError::insufficient(
                "Spatial weights need at least two units.",
            ));
        }
        let mut sets: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for &(a, b) in pairs {
            if a >= n || b >= n {
                return Err(AppError::runtime(format!(
                    "Neighbor pair ({a}, {b}) is out of range for {n} units."
                )));
            }
            if a == b {
                continue;
            }
            sets[a].insert(b);
            sets[b].insert(a);
        }

        let islands = sets.iter().filter(|s| s.is_empty()).count();
        if islands > 0 {
            return Err(AppError::runtime(format!(
                "{islands} unit(s) have no neighbors; row-standardized weights are undefined."
            )));
        }
        Ok(Self {
            neighbors: sets
                .into_iter()
                .map(|s| s.into_iter().collect())
                .collect(),
        })
    }

    /// k-nearest-neighbor weights from point coordinates, symmetrized by
    /// union so the likelihood eigendecomposition stays real.
    ///
    /// # Errors
    /// Exit code 2 when `k` is not in `1..n`, exit code 3 for fewer than two
    /// points.
    pub fn knn(coords: &[(f64, f64)], k: usize) -> Result<Self, AppError> {
        let n = coords.len();
        if n < 2 {
            return Err(AppError::insufficient(
                "Spatial weights need at least two units.",
            ));
        }
        if k == 0 || k >= n {
            return Err(AppError::usage(format!(
                "knn neighbor count must be between 1 and {}, got {k}.",
                n - 1
            )));
        }

        let mut pairs = Vec::with_capacity(n * k);
        for i in 0..n {
            let mut by_distance: Vec<(f64, usize)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let dx = coords[i].0 - coords[j].0;
                    let dy = coords[i].1 - coords[j].1;
                    (dx * dx + dy * dy, j)
                })
                .collect();
            by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            for &(_, j) in by_distance.iter().take(k) {
                pairs.push((i, j));
            }
        }
        Self::from_pairs(n, &pairs)
    }

    pub fn n(&self) -> usize {
        self.neighbors.len()
    }

    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    pub fn degree(&self, i: usize) -> usize {
        self.neighbors[i].len()
    }

    /// Row-standardized spatial lag: the mean over each unit's neighbors.
    ///
    /// # Errors
    /// Exit code 2 when `values` does not have one entry per unit.
    pub fn lag(&self, values: &[f64]) -> Result<Vec<f64>, AppError> {
        if values.len() != self.n() {
            return Err(AppError::usage(format!(
                "Lag input has {} values for {} units.",
                values.len(),
                self.n()
            )));
        }
        Ok(self
            .neighbors
            .iter()
            .map(|nbrs| nbrs.iter().map(|&j| values[j]).sum::<f64>() / nbrs.len() as f64)
            .collect())
    }

    /// Eigenvalues of `D^(-1/2) A D^(-1/2)`, which equal the eigenvalues of
    /// the row-standardized weight matrix.
    fn eigenvalues(&self) -> Vec<f64> {
        let n = self.n();
        let mut s = DMatrix::zeros(n, n);
        for i in 0..n {
            let di = self.degree(i) as f64;
            for &j in self.neighbors(i) {
                s[(i, j)] = 1.0 / (di * self.degree(j) as f64).sqrt();
            }
        }
        SymmetricEigen::new(s).eigenvalues.iter().copied().collect()
    }
}

/// Moran's I with inference under the normality assumption.
#[derive(Debug, Clone, Serialize)]
pub struct MoranTest {
    pub i: f64,
    pub expected: f64,
    pub variance: f64,
    pub z: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Global Moran's I of `values` under row-standardized weights.
///
/// # Errors
/// Exit code 2 on a length mismatch, exit code 3 for fewer than four units,
/// exit code 4 when the values have no variation.
pub fn morans_i(w: &SpatialWeights, values: &[f64]) -> Result<MoranTest, AppError> {
    let n = w.n();
    if values.len() != n {
        return Err(AppError::usage(format!(
            "Moran input has {} values for {n} units.",
            values.len()
        )));
    }
    if n < 4 {
        return Err(AppError::insufficient(
            "Moran's I needs at least four units.",
        ));
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let z: Vec<f64> = values.iter().map(|v| v - mean).collect();
    let ssz: f64 = z.iter().map(|v| v * v).sum();
    if ssz < 1e-12 {
        return Err(AppError::runtime(
            "Moran's I is undefined on a constant variable.",
        ));
    }

    let lag = w.lag(&z)?;
    let numerator: f64 = z.iter().zip(lag.iter()).map(|(zi, li)| zi * li).sum();
    // Row standardization makes S0 = n, so the (n/S0) factor cancels.
    let i_stat = numerator / ssz;

    let n_f = n as f64;
    let s0 = n_f;
    let mut s1 = 0.0;
    let mut col_sums = vec![0.0; n];
    for i in 0..n {
        let wi = 1.0 / w.degree(i) as f64;
        for &j in w.neighbors(i) {
            let wj = 1.0 / w.degree(j) as f64;
            s1 += 0.5 * (wi + wj) * (wi + wj);
            col_sums[j] += wi;
        }
    }
    let s2: f64 = col_sums.iter().map(|c| (1.0 + c) * (1.0 + c)).sum();

    let expected = -1.0 / (n_f - 1.0);
    let variance = (n_f * n_f * s1 - n_f * s2 + 3.0 * s0 * s0) / ((n_f * n_f - 1.0) * s0 * s0)
        - expected * expected;
    if !(variance.is_finite() && variance > 0.0) {
        return Err(AppError::runtime(
            "Moran variance is not positive; weights are degenerate.",
        ));
    }

    let z_score = (i_stat - expected) / variance.sqrt();
    Ok(MoranTest {
        i: i_stat,
        expected,
        variance,
        z: z_score,
        p_value: two_sided_normal_p(z_score)?,
        n,
    })
}

/// A fitted spatial-lag model.
#[derive(Debug, Clone, Serialize)]
pub struct SpatialLagFit {
    pub rho: f64,
    pub rho_std_err: f64,
    pub rho_stat: f64,
    pub rho_p_value: f64,
    pub coef: Vec<CoefRow>,
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub n: usize,
    pub iterations: u64,
    pub converged: bool,
}

/// Concentrated log-likelihood pieces for the golden-section search.
#[derive(Clone)]
struct ProfiledRho {
    e0: Vec<f64>,
    ed: Vec<f64>,
    eigenvalues: Vec<f64>,
    n: f64,
}

impl ProfiledRho {
    fn log_likelihood(&self, rho: f64) -> f64 {
        let mut log_det = 0.0;
        for &lambda in &self.eigenvalues {
            let term = 1.0 - rho * lambda;
            if term <= 0.0 {
                return -1e12;
            }
            log_det += term.ln();
        }
        let sse: f64 = self
            .e0
            .iter()
            .zip(self.ed.iter())
            .map(|(a, b)| {
                let r = a - rho * b;
                r * r
            })
            .sum();
        let sigma2 = (sse / self.n).max(1e-12);
        -0.5 * self.n * ((2.0 * std::f64::consts::PI).ln() + sigma2.ln() + 1.0) + log_det
    }
}

impl CostFunction for ProfiledRho {
    type Param = f64;
    type Output = f64;

    fn cost(&self, rho: &Self::Param) -> Result<Self::Output, SolverError> {
        Ok(-self.log_likelihood(*rho))
    }
}

/// Fit `y = rho W y + X beta + eps` by profiled maximum likelihood.
///
/// Slope standard errors are conditional on the estimated `rho`; the `rho`
/// standard error comes from the curvature of the profile likelihood.
///
/// # Errors
/// Exit code 2 on shape mismatches, exit code 3 when there are too few units
/// for the regressor count, exit code 4 when the design is singular or the
/// search fails.
pub fn fit_spatial_lag(
    w: &SpatialWeights,
    x_cols: &[Vec<f64>],
    y: &[f64],
    x_names: &[String],
) -> Result<SpatialLagFit, AppError> {
    let n = w.n();
    let k = x_cols.len() + 1;
    if y.len() != n {
        return Err(AppError::usage(format!(
            "Response has {} values for {n} units.",
            y.len()
        )));
    }
    if n < k + 3 {
        return Err(AppError::insufficient(format!(
            "Spatial lag model needs at least {} units for {} coefficients, have {n}.",
            k + 3,
            k
        )));
    }

    let design = design_with_intercept(x_cols, n)?;
    let y_vec = DVector::from_vec(y.to_vec());
    let wy = DVector::from_vec(w.lag(y)?);

    let b0 = solve_least_squares(&design, &y_vec)
        .ok_or_else(|| AppError::runtime("Design matrix is too ill-conditioned to solve."))?;
    let bd = solve_least_squares(&design, &wy)
        .ok_or_else(|| AppError::runtime("Design matrix is too ill-conditioned to solve."))?;
    let e0 = &y_vec - &design * &b0;
    let ed = &wy - &design * &bd;

    let eigenvalues = w.eigenvalues();
    let lambda_min = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    let lambda_max = eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(lambda_min < 0.0 && lambda_max > 0.0) {
        return Err(AppError::runtime(
            "Weight matrix eigenvalues do not bracket zero; cannot bound rho.",
        ));
    }
    let rho_lo = 1.0 / lambda_min + 1e-6;
    let rho_hi = 1.0 / lambda_max - 1e-6;

    let profile = ProfiledRho {
        e0: e0.iter().copied().collect(),
        ed: ed.iter().copied().collect(),
        eigenvalues,
        n: n as f64,
    };

    let solver = GoldenSectionSearch::new(rho_lo, rho_hi)
        .map_err(|e| AppError::runtime(format!("Golden-section setup failed: {e}")))?
        .with_tolerance(1e-7)
        .map_err(|e| AppError::runtime(format!("Golden-section setup failed: {e}")))?;
    let result = Executor::new(profile.clone(), solver)
        .configure(|state| state.param(0.0).max_iters(200))
        .run()
        .map_err(|e| AppError::runtime(format!("Golden-section search failed: {e}")))?;

    let state = result.state();
    let rho = *state
        .get_best_param()
        .ok_or_else(|| AppError::runtime("Golden-section search returned no parameter."))?;
    let iterations = state.get_iter();
    let converged = matches!(
        state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
    );

    // Back out the concentrated parameters at the chosen rho.
    let beta = &b0 - rho * &bd;
    let residual = &e0 - rho * &ed;
    let sse: f64 = residual.iter().map(|r| r * r).sum();
    let sigma2 = sse / n as f64;
    let log_likelihood = profile.log_likelihood(rho);

    // Conditional-on-rho slope covariance.
    let xtx_inv = (design.transpose() * &design).try_inverse().ok_or_else(|| {
        AppError::runtime("Singular design matrix; check for collinear regressors.")
    })?;
    let mut names = vec!["const".to_string()];
    names.extend(x_names.iter().cloned());
    let mut coef = Vec::with_capacity(k);
    for (j, name) in names.iter().enumerate() {
        let variance = sigma2 * xtx_inv[(j, j)];
        if !(variance.is_finite() && variance >= 0.0) {
            return Err(AppError::runtime("Non-finite coefficient variance."));
        }
        let std_err = variance.sqrt();
        let stat = if std_err > 0.0 { beta[j] / std_err } else { 0.0 };
        coef.push(CoefRow {
            name: name.clone(),
            estimate: beta[j],
            std_err,
            stat,
            p_value: two_sided_normal_p(stat)?,
        });
    }

    // Curvature of the profile likelihood at the optimum.
    let h = 1e-4_f64.min((rho_hi - rho).min(rho - rho_lo) / 2.0).max(1e-8);
    let second = (profile.log_likelihood(rho + h) - 2.0 * log_likelihood
        + profile.log_likelihood(rho - h))
        / (h * h);
    let curvature = (-second).max(1e-10);
    let rho_std_err = (1.0 / curvature).sqrt();
    let rho_stat = if rho_std_err > 0.0 { rho / rho_std_err } else { 0.0 };

    Ok(SpatialLagFit {
        rho,
        rho_std_err,
        rho_stat,
        rho_p_value: two_sided_normal_p(rho_stat)?,
        coef,
        sigma2,
        log_likelihood,
        n,
        iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    fn rook_pairs(side: usize) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for r in 0..side {
            for c in 0..side {
                let i = r * side + c;
                if c + 1 < side {
                    pairs.push((i, i + 1));
                }
                if r + 1 < side {
                    pairs.push((i, i + side));
                }
            }
        }
        pairs
    }

    #[test]
    fn path_graph_lag_averages_neighbors() {
        let w = SpatialWeights::from_pairs(3, &[(0, 1), (1, 2)]).unwrap();
        let lag = w.lag(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(lag, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn island_units_are_rejected() {
        let err = SpatialWeights::from_pairs(3, &[(0, 1)]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("no neighbors"));
    }

    #[test]
    fn self_pairs_are_skipped_and_duplicates_collapse() {
        let w = SpatialWeights::from_pairs(2, &[(0, 0), (0, 1), (1, 0)]).unwrap();
        assert_eq!(w.neighbors(0), &[1]);
        assert_eq!(w.neighbors(1), &[0]);
    }

    #[test]
    fn knn_union_is_symmetric() {
        let coords = vec![(0.0, 0.0), (1.0, 0.0), (2.2, 0.0), (3.6, 0.0)];
        let w = SpatialWeights::knn(&coords, 1).unwrap();
        assert_eq!(w.neighbors(0), &[1]);
        assert_eq!(w.neighbors(1), &[0, 2]);
        assert_eq!(w.neighbors(2), &[1, 3]);
        assert_eq!(w.neighbors(3), &[2]);
    }

    #[test]
    fn rook_lattice_degrees() {
        let w = SpatialWeights::from_pairs(9, &rook_pairs(3)).unwrap();
        assert_eq!(w.degree(0), 2);
        assert_eq!(w.degree(1), 3);
        assert_eq!(w.degree(4), 4);
    }

    #[test]
    fn moran_is_near_its_null_mean_on_noise() {
        let w = SpatialWeights::from_pairs(100, &rook_pairs(10)).unwrap();
        let mut rng = StdRng::seed_from_u64(41);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let values: Vec<f64> = (0..100).map(|_| noise.sample(&mut rng)).collect();

        let test = morans_i(&w, &values).unwrap();
        assert!((test.expected + 1.0 / 99.0).abs() < 1e-12);
        assert!(test.z.abs() < 3.0, "z {}", test.z);
    }

    #[test]
    fn moran_detects_a_spatial_gradient() {
        let w = SpatialWeights::from_pairs(100, &rook_pairs(10)).unwrap();
        let values: Vec<f64> = (0..100).map(|i| (i / 10) as f64).collect();

        let test = morans_i(&w, &values).unwrap();
        assert!(test.i > 0.5, "I {}", test.i);
        assert!(test.p_value < 1e-6, "p {}", test.p_value);
    }

    #[test]
    fn constant_variable_is_rejected() {
        let w = SpatialWeights::from_pairs(9, &rook_pairs(3)).unwrap();
        let err = morans_i(&w, &[1.0; 9]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn recovers_rho_and_slopes_on_a_lattice() {
        let side = 15;
        let n = side * side;
        let w = SpatialWeights::from_pairs(n, &rook_pairs(side)).unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let x_dist = Normal::new(0.0, 1.0).unwrap();
        let eps_dist = Normal::new(0.0, 0.5).unwrap();
        let x: Vec<f64> = (0..n).map(|_| x_dist.sample(&mut rng)).collect();

        // y = (I - rho W)^(-1) (X beta + eps)
        let rho_true = 0.5;
        let mut w_dense = DMatrix::zeros(n, n);
        for i in 0..n {
            for &j in w.neighbors(i) {
                w_dense[(i, j)] = 1.0 / w.degree(i) as f64;
            }
        }
        let a = DMatrix::identity(n, n) - rho_true * w_dense;
        let rhs = DVector::from_fn(n, |i, _| 2.0 + 1.5 * x[i] + eps_dist.sample(&mut rng));
        let y = a
            .lu()
            .solve(&rhs)
            .expect("lattice system is invertible");

        let names = vec!["x".to_string()];
        let fit = fit_spatial_lag(&w, &[x], y.as_slice(), &names).unwrap();

        assert!((fit.rho - rho_true).abs() < 0.12, "rho {}", fit.rho);
        assert!(
            (fit.coef[1].estimate - 1.5).abs() < 0.2,
            "slope {}",
            fit.coef[1].estimate
        );
        assert!(fit.rho_p_value < 0.01, "rho p {}", fit.rho_p_value);
        assert!((fit.sigma2 - 0.25).abs() < 0.12, "sigma2 {}", fit.sigma2);
        assert!(fit.converged, "did not converge");
        assert!(fit.log_likelihood.is_finite());
    }
}
