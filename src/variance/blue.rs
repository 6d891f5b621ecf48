//! variance::blue — the MLBLUE linear system over model subsets.
//!
//! Purpose
//! -------
//! Assemble `Psi(m) = Σ_k m_k R_kᵀ Σ_k⁻¹ R_k + reg·I`, where `R_k` restricts
//! the model vector to subset `S_k` and `Σ_k` is the covariance of that
//! subset, and evaluate the variance `aᵀ Psi⁻¹ a` of the best linear
//! unbiased estimator of `aᵀ μ`, its gradient with respect to the subset
//! weights `m`, and the estimate itself.
//!
//! Key behaviors
//! -------------
//! - Subset inverses are computed once at construction.
//! - [`BlueSystem::variance_and_gradient`] uses
//!   `∂(aᵀPsi⁻¹a)/∂m_k = −w_{S_k}ᵀ Σ_k⁻¹ w_{S_k}` with `w = Psi⁻¹ a`.
//! - [`BlueSystem::estimate`] applies a truncated symmetric-eigen
//!   pseudo-inverse, so subsets without samples do not break the solve.
//!
//! Invariants & assumptions
//! ------------------------
//! - Subsets are non-empty, strictly increasing and in range.
//! - `m` is non-negative. With `m_k = x_k / cost_k` and `Σ x_k = 1` the
//!   variance is the unit-budget variance; with `m_k = n_k` it is the
//!   variance of the realized allocation.
use crate::{
    errors::{MfError, MfResult},
    utils::{cholesky_inverse, cholesky_solve, pinv_symmetric},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

#[derive(Debug, Clone)]
pub struct BlueSystem {
    nmodels: usize,
    subsets: Vec<Vec<usize>>,
    subset_inverses: Vec<Array2<f64>>,
    reg: f64,
}

impl BlueSystem {
    /// Build the system for `subsets` of the models described by `cov`.
    ///
    /// # Errors
    /// - `InvalidSubset` for empty, unsorted or out-of-range subsets.
    /// - `SingularSystem` when a subset covariance is not positive definite.
    pub fn new(cov: ArrayView2<f64>, subsets: Vec<Vec<usize>>, reg: f64) -> MfResult<Self> {
        let nmodels = cov.nrows();
        let mut subset_inverses = Vec::with_capacity(subsets.len());
        for subset in &subsets {
            let sorted = subset.windows(2).all(|w| w[0] < w[1]);
            if subset.is_empty() || !sorted || subset.iter().any(|&i| i >= nmodels) {
                return Err(MfError::InvalidSubset {
                    subset: subset.clone(),
                    reason: "Subsets must be non-empty, strictly increasing and in range.",
                });
            }
            let sub = Array2::from_shape_fn((subset.len(), subset.len()), |(i, j)| {
                cov[[subset[i], subset[j]]]
            });
            subset_inverses.push(cholesky_inverse(sub.view(), "subset covariance")?);
        }
        Ok(Self { nmodels, subsets, subset_inverses, reg })
    }

    pub fn subsets(&self) -> &[Vec<usize>] {
        &self.subsets
    }

    pub fn nmodels(&self) -> usize {
        self.nmodels
    }

    /// `Psi(m) = Σ_k m_k R_kᵀ Σ_k⁻¹ R_k + reg·I`.
    pub fn psi(&self, weights: ArrayView1<f64>) -> Array2<f64> {
        let mut psi = Array2::<f64>::eye(self.nmodels) * self.reg;
        for ((subset, inv), &m) in self.subsets.iter().zip(&self.subset_inverses).zip(weights.iter()) {
            if m == 0.0 {
                continue;
            }
            for (a, &i) in subset.iter().enumerate() {
                for (b, &j) in subset.iter().enumerate() {
                    psi[[i, j]] += m * inv[[a, b]];
                }
            }
        }
        psi
    }

    /// Variance `aᵀ Psi(m)⁻¹ a`.
    ///
    /// # Errors
    /// - `SingularSystem` when `Psi(m)` is not positive definite (e.g. a
    ///   model in the sketch is never sampled and `reg = 0`).
    pub fn variance(&self, sketch: ArrayView1<f64>, weights: ArrayView1<f64>) -> MfResult<f64> {
        let w = cholesky_solve(self.psi(weights).view(), sketch, "BLUE Psi")?;
        Ok(sketch.dot(&w))
    }

    /// Variance and its gradient with respect to `m`.
    pub fn variance_and_gradient(
        &self, sketch: ArrayView1<f64>, weights: ArrayView1<f64>,
    ) -> MfResult<(f64, Array1<f64>)> {
        let w = cholesky_solve(self.psi(weights).view(), sketch, "BLUE Psi")?;
        let grad = Array1::from_iter(self.subsets.iter().zip(&self.subset_inverses).map(|(subset, inv)| {
            let ws = Array1::from_iter(subset.iter().map(|&i| w[i]));
            -ws.dot(&inv.dot(&ws))
        }));
        Ok((sketch.dot(&w), grad))
    }

    /// estimate — BLUE estimate of `aᵀ μ` from per-subset values.
    ///
    /// Parameters
    /// ----------
    /// - `sketch`: the vector `a`, length `M`.
    /// - `values_per_subset`: for subset `k`, an `n_k × |S_k|` array of model
    ///   outputs (columns in subset order).
    ///
    /// Returns
    /// -------
    /// `aᵀ Psi(n)⁺ Σ_k R_kᵀ Σ_k⁻¹ (Σ_rows y_k)`.
    ///
    /// Errors
    /// ------
    /// - `DimensionMismatch` when the number of value blocks or a block's
    ///   width disagrees with the subsets.
    pub fn estimate(&self, sketch: ArrayView1<f64>, values_per_subset: &[Array2<f64>]) -> MfResult<f64> {
        if values_per_subset.len() != self.subsets.len() {
            return Err(MfError::DimensionMismatch {
                what: "value blocks per subset",
                expected: self.subsets.len(),
                found: values_per_subset.len(),
            });
        }
        let mut counts = Array1::<f64>::zeros(self.subsets.len());
        let mut rhs = Array1::<f64>::zeros(self.nmodels);
        for (k, (subset, values)) in self.subsets.iter().zip(values_per_subset).enumerate() {
            if values.nrows() == 0 {
                continue;
            }
            if values.ncols() != subset.len() {
                return Err(MfError::DimensionMismatch {
                    what: "subset value columns",
                    expected: subset.len(),
                    found: values.ncols(),
                });
            }
            counts[k] = values.nrows() as f64;
            let sums = values.sum_axis(Axis(0));
            let local = self.subset_inverses[k].dot(&sums);
            for (a, &i) in subset.iter().enumerate() {
                rhs[i] += local[a];
            }
        }
        let psi_pinv = pinv_symmetric(self.psi(counts.view()).view());
        Ok(sketch.dot(&psi_pinv.dot(&rhs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::model_subsets;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Reduction to plain Monte Carlo when only the high-fidelity subset is
    //   sampled.
    // - The analytic gradient against central differences.
    // - The estimate on exactly known data.
    // -------------------------------------------------------------------------

    fn cov2() -> Array2<f64> {
        array![[2.0, 0.9], [0.9, 1.0]]
    }

    #[test]
    // Purpose
    // -------
    // Sampling only {0} gives the Monte Carlo variance C_00 / n.
    //
    // Given
    // -----
    // - Subsets [[0], [1], [0, 1]], m = (10, 0, 0), reg = 0.
    //
    // Expect
    // ------
    // - Variance of a = e_0 is 2/10. Psi is singular in model 1 directions,
    //   so a tiny regularization is used.
    fn single_subset_reduces_to_monte_carlo() {
        let system = BlueSystem::new(cov2().view(), model_subsets(2), 1e-12).expect("valid system");
        let var = system
            .variance(array![1.0, 0.0].view(), array![10.0, 0.0, 0.0].view())
            .expect("PD Psi");
        assert!((var - 0.2).abs() < 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Analytic gradient agrees with central differences.
    //
    // Given
    // -----
    // - Three-model covariance, all seven subsets, positive weights.
    //
    // Expect
    // ------
    // - Componentwise agreement to 1e-6 (relative).
    fn gradient_matches_finite_differences() {
        // Arrange
        let cov = array![[1.0, 0.8, 0.5], [0.8, 1.0, 0.6], [0.5, 0.6, 1.0]];
        let system = BlueSystem::new(cov.view(), model_subsets(3), 1e-12).expect("valid system");
        let a = array![1.0, 0.0, 0.0];
        let m = array![0.3, 1.2, 2.0, 0.4, 0.5, 0.7, 0.2];
        let h = 1e-6;

        // Act
        let (_, grad) = system.variance_and_gradient(a.view(), m.view()).expect("PD Psi");

        // Assert
        for k in 0..m.len() {
            let mut mp = m.clone();
            let mut mm = m.clone();
            mp[k] += h;
            mm[k] -= h;
            let fd = (system.variance(a.view(), mp.view()).unwrap()
                - system.variance(a.view(), mm.view()).unwrap())
                / (2.0 * h);
            assert!((fd - grad[k]).abs() < 1e-6 * (1.0 + fd.abs()), "k={k}: {fd} vs {}", grad[k]);
        }
    }

    #[test]
    // Purpose
    // -------
    // The estimate of μ_0 from high-fidelity-only data is the sample mean.
    //
    // Given
    // -----
    // - Subset {0} with values (1, 2, 3); the other subsets empty.
    //
    // Expect
    // ------
    // - Estimate 2.
    fn estimate_reduces_to_sample_mean() {
        let system = BlueSystem::new(cov2().view(), model_subsets(2), 1e-12).expect("valid system");
        let values = vec![array![[1.0], [2.0], [3.0]], Array2::zeros((0, 1)), Array2::zeros((0, 2))];
        let est = system.estimate(array![1.0, 0.0].view(), &values).expect("consistent blocks");
        assert!((est - 2.0).abs() < 1e-9);
    }

    #[test]
    // Purpose
    // -------
    // Reject malformed subsets.
    //
    // Given
    // -----
    // - Subset [1, 0] (unsorted).
    //
    // Expect
    // ------
    // - `InvalidSubset`.
    fn new_rejects_unsorted_subsets() {
        let err = BlueSystem::new(cov2().view(), vec![vec![1, 0]], 0.0).unwrap_err();
        assert!(matches!(err, MfError::InvalidSubset { .. }));
    }
}
