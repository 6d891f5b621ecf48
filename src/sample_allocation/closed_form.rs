//! sample_allocation::closed_form — analytic MLMC and MFMC allocations.
//!
//! Purpose
//! -------
//! MLMC and MFMC admit closed-form optimal sample counts, so no solver is
//! involved.
//!
//! Key behaviors
//! -------------
//! - MLMC: with level variances `V_l = Var(f_l − f_{l+1})` (`V_{M−1} =
//!   Var(f_{M−1})`) and level costs `C_l = c_l + c_{l+1}` (`C_{M−1} =
//!   c_{M−1}`), the level sample sizes are `D_l = μ √(V_l / C_l)` with
//!   `μ = T / Σ_l √(V_l C_l)`. Model `i` appears in levels `i − 1` and `i`,
//!   so `N_i = D_{i−1} + D_i` and `N_0 = D_0`.
//! - MFMC: `r_i = √(c_0 (ρ_i² − ρ_{i+1}²) / (c_i (1 − ρ_1²)))` with
//!   `ρ_M = 0`, and `N_0 = T / (c_0 + Σ r_i c_i)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - MFMC inputs must have passed
//!   [`check_mfmc_model_costs_and_correlations`](crate::variance::check_mfmc_model_costs_and_correlations);
//!   otherwise the ratios may be non-finite and `InvalidRatio` is returned.
use crate::{
    allocation::nhf_samples,
    errors::{MfError, MfResult},
    optimization::numerical_stability::safe_log10,
    sample_allocation::types::ContinuousAllocation,
    utils::covariance_to_correlation,
    variance::{VarianceModel, ratios_of},
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::debug;

/// allocate_samples_mlmc — optimal continuous MLMC allocation.
///
/// Parameters
/// ----------
/// - `cov`: model covariance, `M × M`.
/// - `costs`: per-model costs, length `M`.
/// - `target_cost`: budget `T`.
///
/// Returns
/// -------
/// Counts spending exactly `T` and the log-variance `log10 Σ_l V_l / D_l`.
///
/// Errors
/// ------
/// - `InvalidRatio` when a level variance vanishes and a ratio becomes
///   non-finite.
pub fn allocate_samples_mlmc(
    cov: ArrayView2<f64>, costs: ArrayView1<f64>, target_cost: f64,
) -> MfResult<ContinuousAllocation> {
    let nmodels = costs.len();
    let level_var = Array1::from_shape_fn(nmodels, |l| {
        if l + 1 < nmodels {
            cov[[l, l]] + cov[[l + 1, l + 1]] - 2.0 * cov[[l, l + 1]]
        } else {
            cov[[l, l]]
        }
    });
    let level_cost =
        Array1::from_shape_fn(nmodels, |l| if l + 1 < nmodels { costs[l] + costs[l + 1] } else { costs[l] });
    let multiplier = target_cost / level_var.iter().zip(level_cost.iter()).map(|(v, c)| (v * c).sqrt()).sum::<f64>();
    let per_level = Array1::from_shape_fn(nmodels, |l| multiplier * (level_var[l] / level_cost[l]).sqrt());
    let nsamples = Array1::from_shape_fn(nmodels, |i| if i == 0 { per_level[0] } else { per_level[i - 1] + per_level[i] });
    let ratios = ratios_of(nsamples.view());
    check_ratios(ratios.view())?;
    let variance: f64 = level_var.iter().zip(per_level.iter()).map(|(v, d)| v / d).sum();
    debug!("MLMC closed-form allocation: nhf = {:.3}, variance = {:.6e}", nsamples[0], variance);
    Ok(ContinuousAllocation { ratios, nsamples, log10_variance: safe_log10(variance), iterations: 0 })
}

/// allocate_samples_mfmc — optimal continuous MFMC allocation.
///
/// Errors
/// ------
/// - `InvalidRatio` when `ρ_1² = 1` or the correlations are not strictly
///   decreasing.
pub fn allocate_samples_mfmc(
    cov: ArrayView2<f64>, costs: ArrayView1<f64>, target_cost: f64,
) -> MfResult<ContinuousAllocation> {
    let nmodels = costs.len();
    let corr = covariance_to_correlation(cov);
    let rho2 = |i: usize| if i < nmodels { corr[[0, i]].powi(2) } else { 0.0 };
    let ratios = Array1::from_shape_fn(nmodels - 1, |k| {
        let i = k + 1;
        (costs[0] * (rho2(i) - rho2(i + 1)) / (costs[i] * (1.0 - rho2(1)))).sqrt()
    });
    check_ratios(ratios.view())?;
    let nhf = nhf_samples(target_cost, costs, ratios.view());
    let mut nsamples = Array1::<f64>::zeros(nmodels);
    nsamples[0] = nhf;
    for (k, &r) in ratios.iter().enumerate() {
        nsamples[k + 1] = r * nhf;
    }
    let variance = VarianceModel::Mfmc.variance(cov, nsamples.view())?;
    debug!("MFMC closed-form allocation: nhf = {:.3}, variance = {:.6e}", nhf, variance);
    Ok(ContinuousAllocation { ratios, nsamples, log10_variance: safe_log10(variance), iterations: 0 })
}

fn check_ratios(ratios: ArrayView1<f64>) -> MfResult<()> {
    match ratios.iter().position(|r| !r.is_finite() || *r <= 0.0) {
        Some(index) => Err(MfError::InvalidRatio {
            index,
            value: ratios[index],
            reason: "Closed-form sample ratios must be finite and positive.",
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The MLMC reference allocation (T = 81 → counts [3, 12, 27],
    //   variance 1) and its agreement with the generic variance.
    // - MFMC ratios that increase and spend the budget exactly.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Reproduce the three-model MLMC reference allocation.
    //
    // Given
    // -----
    // - cov = [[1,.5,.25],[.5,1,.5],[.25,.5,4]], costs [6,3,1], T = 81.
    //
    // Expect
    // ------
    // - Counts [3, 12, 27]; variance 1 both from the closed form and from
    //   the MLMC variance model.
    fn mlmc_reference_allocation() {
        // Arrange
        let cov = array![[1.0, 0.5, 0.25], [0.5, 1.0, 0.5], [0.25, 0.5, 4.0]];
        let costs = array![6.0, 3.0, 1.0];

        // Act
        let alloc = allocate_samples_mlmc(cov.view(), costs.view(), 81.0).unwrap();

        // Assert
        for (n, expected) in alloc.nsamples.iter().zip([3.0, 12.0, 27.0]) {
            assert!((n - expected).abs() < 1e-10);
        }
        assert!(alloc.log10_variance.abs() < 1e-12);
        let generic = VarianceModel::Mlmc.variance(cov.view(), alloc.nsamples.view()).unwrap();
        assert!((generic - 1.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // MFMC ratios increase and the counts cost exactly T.
    //
    // Given
    // -----
    // - Correlations 0.9, 0.7 with costs [1, 0.1, 0.01], T = 50.
    //
    // Expect
    // ------
    // - 1 < r_1 < r_2 and Σ c N = T.
    fn mfmc_ratios_are_increasing_and_budget_exact() {
        let cov = array![[1.0, 0.9, 0.7], [0.9, 1.0, 0.6], [0.7, 0.6, 1.0]];
        let costs = array![1.0, 0.1, 0.01];
        let alloc = allocate_samples_mfmc(cov.view(), costs.view(), 50.0).unwrap();
        assert!(alloc.ratios[0] > 1.0 && alloc.ratios[1] > alloc.ratios[0]);
        assert!((costs.dot(&alloc.nsamples) - 50.0).abs() < 1e-9);
        assert!(alloc.log10_variance < (1.0f64 / 50.0).log10());
    }
}
