//! variance::weights — control-variate weights and estimator variance.
//!
//! Purpose
//! -------
//! Solve for the minimum-variance control-variate weights from the
//! discrepancy covariances, express the resulting variance reduction as
//! `r²`, and provide the closed forms for MLMC and MFMC.
//!
//! Key behaviors
//! -------------
//! - [`acv_weights`]: `η = −CF⁻¹ cf` by Cholesky; failure is a
//!   `SingularSystem` error.
//! - [`rsquared`]: `r² = −cf·η / C_00`, the same for every family because
//!   `(CF, cf)` are scaled by the high-fidelity count.
//! - [`rsquared_mlmc`] / [`rsquared_mfmc`]: closed forms in the ratios.
//! - [`acv_variance_with_weights`]: variance for arbitrary weights on an
//!   arbitrary allocation.
//! - [`check_mfmc_model_costs_and_correlations`]: the MFMC ordering
//!   condition, checked when an MFMC estimator is built.
//!
//! Conventions
//! -----------
//! - Estimator variance at `N` high-fidelity samples is
//!   `C_00 (1 − r²) / N`.
use crate::{
    allocation::AllocationMatrix,
    errors::{MfError, MfResult},
    utils::{cholesky_solve, covariance_to_correlation},
    variance::discrepancy::discrepancy_covariances_generic,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// acv_weights — minimum-variance weights `η = −CF⁻¹ cf`.
///
/// Errors
/// ------
/// - `MfError::SingularSystem` when `CF` is not positive definite.
pub fn acv_weights(cf_mat: ArrayView2<f64>, cf_vec: ArrayView1<f64>) -> MfResult<Array1<f64>> {
    let sol = cholesky_solve(cf_mat, cf_vec, "discrepancy covariance CF")?;
    Ok(-sol)
}

/// Variance reduction `r² = −cf·η / C_00`.
pub fn rsquared(cf_vec: ArrayView1<f64>, weights: ArrayView1<f64>, cov00: f64) -> f64 {
    -cf_vec.dot(&weights) / cov00
}

/// Estimator variance `C_00 (1 − r²) / N`.
pub fn variance_from_rsquared(cov00: f64, rsquared: f64, nhf: f64) -> f64 {
    cov00 * (1.0 - rsquared) / nhf
}

/// MLMC weights: every discrepancy enters with weight −1.
pub fn mlmc_weights(nmodels: usize) -> Array1<f64> {
    Array1::from_elem(nmodels.saturating_sub(1), -1.0)
}

/// MFMC weights `η_i = −C_0i / C_ii`.
pub fn mfmc_weights(cov: ArrayView2<f64>) -> Array1<f64> {
    Array1::from_shape_fn(cov.nrows() - 1, |i| -cov[[0, i + 1]] / cov[[i + 1, i + 1]])
}

/// rsquared_mlmc — variance reduction of MLMC for given ratios.
///
/// The level partitions satisfy `P_0 = N`, `P_l = (r_l − r̂_{l−1}) N`, so with
/// `r̂_0 = 1`, `r̂_l = r_l − r̂_{l−1}` and `v_l = C_ll + C_{l+1,l+1} − 2C_{l,l+1}`
///
/// `1 − r² = (Σ_{l<M−1} v_l / r̂_l + C_{M−1,M−1} / r̂_{M−1}) / C_00`.
pub fn rsquared_mlmc(cov: ArrayView2<f64>, ratios: ArrayView1<f64>) -> f64 {
    let nmodels = cov.nrows();
    let mut rhat = Array1::<f64>::ones(nmodels);
    for i in 1..nmodels {
        rhat[i] = ratios[i - 1] - rhat[i - 1];
    }
    let mut gamma = 0.0;
    for l in 0..nmodels - 1 {
        let vd = cov[[l, l]] + cov[[l + 1, l + 1]] - 2.0 * cov[[l, l + 1]];
        gamma += vd / rhat[l];
    }
    gamma += cov[[nmodels - 1, nmodels - 1]] / rhat[nmodels - 1];
    1.0 - gamma / cov[[0, 0]]
}

/// rsquared_mfmc — `Σ ρ²_0i (r_i − r_{i−1}) / (r_i r_{i−1})` with `r_0 = 1`.
pub fn rsquared_mfmc(cov: ArrayView2<f64>, ratios: ArrayView1<f64>) -> f64 {
    let corr = covariance_to_correlation(cov);
    let mut prev = 1.0;
    let mut total = 0.0;
    for (i, &r) in ratios.iter().enumerate() {
        total += corr[[0, i + 1]].powi(2) * (r - prev) / (r * prev);
        prev = r;
    }
    total
}

/// acv_variance_with_weights — variance of `Q_0 + Σ η_i Δ_i` on an allocation.
///
/// Parameters
/// ----------
/// - `cov`: model covariance.
/// - `mat`, `npartition_samples`: the allocation.
/// - `weights`: arbitrary weights, length `M − 1`.
///
/// Returns
/// -------
/// `(C_00 + 2 cf·η + ηᵀ CF η) / N` with `N = |z_0|`.
pub fn acv_variance_with_weights(
    cov: ArrayView2<f64>, mat: &AllocationMatrix, npartition_samples: ArrayView1<f64>,
    weights: ArrayView1<f64>,
) -> f64 {
    let (cf_mat, cf_vec): (Array2<f64>, Array1<f64>) =
        discrepancy_covariances_generic(cov, mat, npartition_samples);
    let nhf = mat.subset_sizes(npartition_samples)[1];
    let quad = weights.dot(&cf_mat.dot(&weights));
    (cov[[0, 0]] + 2.0 * cf_vec.dot(&weights) + quad) / nhf
}

/// check_mfmc_model_costs_and_correlations — MFMC ordering condition.
///
/// With `ρ_i = corr(Q_0, Q_i)` and `ρ_M = 0`, every low-fidelity model `i`
/// must satisfy `ρ_i² > ρ_{i+1}²` and
/// `(ρ_{i−1}² − ρ_i²) / (ρ_i² − ρ_{i+1}²) < c_{i−1} / c_i`.
///
/// Errors
/// ------
/// - `MfError::UnacceptableMfmcModels` naming the first offending model.
pub fn check_mfmc_model_costs_and_correlations(cov: ArrayView2<f64>, costs: ArrayView1<f64>) -> MfResult<()> {
    let corr = covariance_to_correlation(cov);
    let nmodels = costs.len();
    let rho2 = |i: usize| if i < nmodels { corr[[0, i]].powi(2) } else { 0.0 };
    for model in 1..nmodels {
        if rho2(model) > rho2(model - 1) {
            return Err(MfError::UnacceptableMfmcModels {
                model,
                reason: "Correlations with the high-fidelity model must decrease.",
            });
        }
        let denom = rho2(model) - rho2(model + 1);
        if denom <= 0.0 {
            return Err(MfError::UnacceptableMfmcModels {
                model,
                reason: "Squared correlations must be strictly decreasing.",
            });
        }
        let corr_ratio = (rho2(model - 1) - rho2(model)) / denom;
        if corr_ratio >= costs[model - 1] / costs[model] {
            return Err(MfError::UnacceptableMfmcModels {
                model,
                reason: "Cost ratio is too small for the correlation gain.",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        allocation::{
            RecursionIndex, npartition_samples_acvmf, npartition_samples_mfmc, npartition_samples_mlmc,
        },
        variance::discrepancy::discrepancy_covariances_mf,
    };
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Weights and r² from the Cholesky solve.
    // - MLMC/MFMC closed forms against the generic allocation path.
    // - The MFMC acceptability check.
    // -------------------------------------------------------------------------

    fn cov3() -> Array2<f64> {
        array![[1.0, 0.9, 0.8], [0.9, 1.0, 0.85], [0.8, 0.85, 1.0]]
    }

    #[test]
    // Purpose
    // -------
    // MLMC closed-form r² equals the generic variance with weights −1.
    //
    // Given
    // -----
    // - Counts [3, 12, 27] (ratios [4, 9]) on the MLMC allocation.
    //
    // Expect
    // ------
    // - C_00 (1 − r²)/N equals `acv_variance_with_weights(…, −1)`.
    fn mlmc_closed_form_matches_generic_variance() {
        // Arrange
        let cov = array![[1.0, 0.5, 0.25], [0.5, 1.0, 0.5], [0.25, 0.5, 4.0]];
        let counts = array![3.0, 12.0, 27.0];
        let partitions = npartition_samples_mlmc(counts.view()).expect("valid partitions");
        let mat = AllocationMatrix::mlmc(3);

        // Act
        let generic = acv_variance_with_weights(cov.view(), &mat, partitions.view(), mlmc_weights(3).view());
        let r2 = rsquared_mlmc(cov.view(), array![4.0, 9.0].view());

        // Assert
        let closed = variance_from_rsquared(1.0, r2, 3.0);
        assert!((generic - closed).abs() < 1e-12, "{generic} vs {closed}");
        assert!((closed - 1.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // MFMC weights and r² coincide with the optimal weights on the MFMC
    // allocation.
    //
    // Given
    // -----
    // - Counts [10, 20, 40] on the MFMC (chain) allocation.
    //
    // Expect
    // ------
    // - Optimal generic weights = −C_0i/C_ii; r² equal to the closed form.
    fn mfmc_closed_form_matches_generic_weights() {
        // Arrange
        let cov = cov3();
        let counts = array![10.0, 20.0, 40.0];
        let partitions = npartition_samples_mfmc(counts.view()).expect("valid partitions");
        let mat = AllocationMatrix::mfmc(3);

        // Act
        let (cf_mat, cf_vec) = discrepancy_covariances_generic(cov.view(), &mat, partitions.view());
        let weights = acv_weights(cf_mat.view(), cf_vec.view()).expect("SPD system");
        let r2 = rsquared(cf_vec.view(), weights.view(), 1.0);

        // Assert
        let closed_w = mfmc_weights(cov.view());
        for (a, b) in weights.iter().zip(closed_w.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
        assert!((r2 - rsquared_mfmc(cov.view(), array![2.0, 4.0].view())).abs() < 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Optimal weights beat any other weights on the same allocation.
    //
    // Given
    // -----
    // - ACVMF allocation with counts [10, 20, 30].
    //
    // Expect
    // ------
    // - Variance with optimal weights ≤ variance with perturbed weights, and
    //   equal to C_00 (1 − r²)/N.
    fn optimal_weights_minimize_variance() {
        let cov = cov3();
        let counts = array![10.0, 20.0, 30.0];
        let rec = RecursionIndex::zeros(3);
        let mat = AllocationMatrix::acvmf(&rec).reorder_acvgmf(counts.view(), &rec);
        let partitions = npartition_samples_acvmf(counts.view()).expect("valid partitions");
        let (cf_mat, cf_vec) = discrepancy_covariances_mf(cov.view(), array![2.0, 3.0].view());
        let weights = acv_weights(cf_mat.view(), cf_vec.view()).expect("SPD system");
        let best = acv_variance_with_weights(cov.view(), &mat, partitions.view(), weights.view());
        let r2 = rsquared(cf_vec.view(), weights.view(), 1.0);
        assert!((best - variance_from_rsquared(1.0, r2, 10.0)).abs() < 1e-12);
        let perturbed = &weights + &array![0.05, -0.05];
        assert!(best < acv_variance_with_weights(cov.view(), &mat, partitions.view(), perturbed.view()));
    }

    #[test]
    // Purpose
    // -------
    // A singular discrepancy system is reported, not silently solved.
    //
    // Given
    // -----
    // - CF = 0.
    //
    // Expect
    // ------
    // - `SingularSystem`.
    fn acv_weights_rejects_singular_system() {
        let err = acv_weights(Array2::zeros((2, 2)).view(), array![1.0, 1.0].view()).unwrap_err();
        assert!(matches!(err, MfError::SingularSystem { .. }));
    }

    #[test]
    // Purpose
    // -------
    // MFMC acceptability depends on correlation order and cost ratios.
    //
    // Given
    // -----
    // - Decreasing correlations with steep costs; the same with flat costs;
    //   increasing correlations.
    //
    // Expect
    // ------
    // - Ok, then UnacceptableMfmcModels twice.
    fn mfmc_check_enforces_ordering() {
        let cov = cov3();
        assert!(check_mfmc_model_costs_and_correlations(cov.view(), array![100.0, 10.0, 1.0].view()).is_ok());
        assert!(matches!(
            check_mfmc_model_costs_and_correlations(cov.view(), array![1.0, 1.0, 1.0].view()),
            Err(MfError::UnacceptableMfmcModels { .. })
        ));
        let swapped = array![[1.0, 0.8, 0.9], [0.8, 1.0, 0.85], [0.9, 0.85, 1.0]];
        assert!(matches!(
            check_mfmc_model_costs_and_correlations(swapped.view(), array![100.0, 10.0, 1.0].view()),
            Err(MfError::UnacceptableMfmcModels { model: 1, .. })
        ));
    }
}
