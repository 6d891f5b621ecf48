//! variance::discrepancy — covariances of control-variate discrepancies.
//!
//! Purpose
//! -------
//! Build `CF` (`(M−1) × (M−1)`) and `cf` (length `M−1`), the covariance
//! between the discrepancies `Δ_i = Q_i(z_i*) − Q_i(z_i)` and the covariance
//! of each discrepancy with the high-fidelity mean, for every allocation.
//!
//! Key behaviors
//! -------------
//! - Closed forms in the sample ratios for ACVMF ([`discrepancy_covariances_mf`])
//!   and ACVIS ([`discrepancy_covariances_is`]).
//! - A generic path ([`discrepancy_covariances_generic`]) from any allocation
//!   matrix and partition sizes by inclusion/exclusion over set
//!   intersections.
//! - Ratio derivatives of the closed-form multiplier matrices for analytic
//!   optimizer gradients.
//!
//! Conventions
//! -----------
//! - All outputs are scaled by the high-fidelity sample count `N = |z_0|`,
//!   so the closed forms and the generic path agree and depend only on the
//!   ratios. The estimator variance is `(C_00 + cf·η) / N`.
//! - Empty sets contribute zero (`0/0 = 0`).
use crate::{allocation::AllocationMatrix, utils::safe_div};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};

/// Multiplier matrix `F` and vector `f` such that `CF = F ∘ C[1:,1:]` and
/// `cf = f ∘ C[0,1:]`.
pub type Multipliers = (Array2<f64>, Array1<f64>);

/// Apply multipliers to a covariance: `(F ∘ C[1:,1:], f ∘ C[0,1:])`.
pub fn pool_discrepancy_covariances(cov: ArrayView2<f64>, factors: &Multipliers) -> (Array2<f64>, Array1<f64>) {
    let lf = cov.slice(s![1.., 1..]);
    let c0 = cov.slice(s![0, 1..]);
    (&factors.0 * &lf, &factors.1 * &c0)
}

/// ACVMF multipliers: `F_ij = (m − 1)/m`, `m = min(r_i, r_j)`, `f = diag(F)`.
pub fn multipliers_mf(ratios: ArrayView1<f64>) -> Multipliers {
    let k = ratios.len();
    let fmat = Array2::from_shape_fn((k, k), |(i, j)| {
        let m = ratios[i].min(ratios[j]);
        (m - 1.0) / m
    });
    let fvec = fmat.diag().to_owned();
    (fmat, fvec)
}

/// ACVIS multipliers: `F_ii = (r_i − 1)/r_i`,
/// `F_ij = (r_i − 1)(r_j − 1)/(r_i r_j)`, `f = diag(F)`.
pub fn multipliers_is(ratios: ArrayView1<f64>) -> Multipliers {
    let k = ratios.len();
    let fmat = Array2::from_shape_fn((k, k), |(i, j)| {
        let a = (ratios[i] - 1.0) / ratios[i];
        if i == j { a } else { a * (ratios[j] - 1.0) / ratios[j] }
    });
    let fvec = fmat.diag().to_owned();
    (fmat, fvec)
}

/// discrepancy_covariances_mf — closed-form `(CF, cf)` for ACVMF.
pub fn discrepancy_covariances_mf(cov: ArrayView2<f64>, ratios: ArrayView1<f64>) -> (Array2<f64>, Array1<f64>) {
    pool_discrepancy_covariances(cov, &multipliers_mf(ratios))
}

/// discrepancy_covariances_is — closed-form `(CF, cf)` for ACVIS.
pub fn discrepancy_covariances_is(cov: ArrayView2<f64>, ratios: ArrayView1<f64>) -> (Array2<f64>, Array1<f64>) {
    pool_discrepancy_covariances(cov, &multipliers_is(ratios))
}

/// multipliers_generic — `(G, g)` for an arbitrary allocation.
///
/// Parameters
/// ----------
/// - `mat`: allocation matrix (`M × 2M`).
/// - `npartition_samples`: partition sizes, length `M`.
///
/// Returns
/// -------
/// With `I` the intersection counts and `S` the set sizes,
///
/// - `g_i = N [ I(z_i*, z_0)/(S_i* S_0) − I(z_i, z_0)/(S_i S_0) ]`
/// - `G_ij = N [ I(z_i*, z_j*)/(S_i* S_j*) − I(z_i*, z_j)/(S_i* S_j)
///   − I(z_i, z_j*)/(S_i S_j*) + I(z_i, z_j)/(S_i S_j) ]`
///
/// for low-fidelity models `i, j ≥ 1`, where `N = S_0 = |z_0|`.
pub fn multipliers_generic(mat: &AllocationMatrix, npartition_samples: ArrayView1<f64>) -> Multipliers {
    let inter = mat.intersect(npartition_samples);
    let sizes = inter.diag().to_owned();
    let nhf = sizes[1];
    let term = |a: usize, b: usize| safe_div(inter[[a, b]], sizes[a] * sizes[b]);
    let k = mat.nmodels() - 1;
    let gmat = Array2::from_shape_fn((k, k), |(i, j)| {
        let (si, zi) = (2 * (i + 1), 2 * (i + 1) + 1);
        let (sj, zj) = (2 * (j + 1), 2 * (j + 1) + 1);
        nhf * (term(si, sj) - term(si, zj) - term(zi, sj) + term(zi, zj))
    });
    let gvec = Array1::from_shape_fn(k, |i| {
        let (si, zi) = (2 * (i + 1), 2 * (i + 1) + 1);
        nhf * (term(si, 1) - term(zi, 1))
    });
    (gmat, gvec)
}

/// discrepancy_covariances_generic — `(CF, cf)` from an allocation matrix.
pub fn discrepancy_covariances_generic(
    cov: ArrayView2<f64>, mat: &AllocationMatrix, npartition_samples: ArrayView1<f64>,
) -> (Array2<f64>, Array1<f64>) {
    pool_discrepancy_covariances(cov, &multipliers_generic(mat, npartition_samples))
}

/// dfactors_mf — `∂F/∂r_k` for every ratio `k` (ACVMF).
///
/// `F_ij` depends only on `m = min(r_i, r_j)`, with derivative `1/m²` with
/// respect to the minimizing ratio. Ties are attributed to the lower index.
pub fn dfactors_mf(ratios: ArrayView1<f64>) -> Vec<Array2<f64>> {
    let k = ratios.len();
    (0..k)
        .map(|kk| {
            Array2::from_shape_fn((k, k), |(i, j)| {
                let argmin = if ratios[i] <= ratios[j] { i } else { j };
                if argmin == kk {
                    let m = ratios[argmin];
                    1.0 / (m * m)
                } else {
                    0.0
                }
            })
        })
        .collect()
}

/// dfactors_is — `∂F/∂r_k` for every ratio `k` (ACVIS).
///
/// `∂F_kk/∂r_k = 1/r_k²` and `∂F_kj/∂r_k = (1/r_k²)(r_j − 1)/r_j` for
/// `j ≠ k` (symmetric); all other entries vanish.
pub fn dfactors_is(ratios: ArrayView1<f64>) -> Vec<Array2<f64>> {
    let k = ratios.len();
    (0..k)
        .map(|kk| {
            let d = 1.0 / (ratios[kk] * ratios[kk]);
            let mut out = Array2::<f64>::zeros((k, k));
            out[[kk, kk]] = d;
            for j in (0..k).filter(|&j| j != kk) {
                let v = d * (ratios[j] - 1.0) / ratios[j];
                out[[kk, j]] = v;
                out[[j, kk]] = v;
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{
        RecursionIndex, npartition_samples_acvis, npartition_samples_acvmf, nsamples_per_model,
    };
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Agreement of the generic inclusion/exclusion path with the ACVMF and
    //   ACVIS closed forms at integer allocations.
    // - The multiplier derivatives against central differences.
    // -------------------------------------------------------------------------

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>, tol: f64) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < tol, "{x} vs {y}");
        }
    }

    #[test]
    // Purpose
    // -------
    // Generic multipliers reproduce the ACVMF closed form.
    //
    // Given
    // -----
    // - T = 100, unit costs, ratios [2, 3, 4] (counts [10, 20, 30, 40]).
    //
    // Expect
    // ------
    // - G = F and g = f.
    fn generic_matches_mf_closed_form() {
        // Arrange
        let ratios = array![2.0, 3.0, 4.0];
        let counts = nsamples_per_model(100.0, array![1.0, 1.0, 1.0, 1.0].view(), ratios.view(), true);
        let rec = RecursionIndex::zeros(4);
        let mat = AllocationMatrix::acvmf(&rec).reorder_acvgmf(counts.view(), &rec);
        let partitions = npartition_samples_acvmf(counts.view()).expect("valid partitions");

        // Act
        let (gmat, gvec) = multipliers_generic(&mat, partitions.view());
        let (fmat, fvec) = multipliers_mf(ratios.view());

        // Assert
        assert_close(&gmat, &fmat, 1e-12);
        for (a, b) in gvec.iter().zip(fvec.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Generic multipliers reproduce the ACVIS closed form.
    //
    // Given
    // -----
    // - Counts [10, 20, 30, 40] with the zero recursion index.
    //
    // Expect
    // ------
    // - G = F_IS and g = f_IS.
    fn generic_matches_is_closed_form() {
        let counts = array![10.0, 20.0, 30.0, 40.0];
        let rec = RecursionIndex::zeros(4);
        let mat = AllocationMatrix::acvis(&rec);
        let partitions = npartition_samples_acvis(counts.view(), &rec).expect("valid partitions");
        let (gmat, gvec) = multipliers_generic(&mat, partitions.view());
        let (fmat, fvec) = multipliers_is(array![2.0, 3.0, 4.0].view());
        assert_close(&gmat, &fmat, 1e-12);
        for (a, b) in gvec.iter().zip(fvec.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Multiplier derivatives agree with central differences.
    //
    // Given
    // -----
    // - Distinct ratios [2.5, 1.7, 4.1].
    //
    // Expect
    // ------
    // - Every entry of dF/dr_k within 1e-6 of the finite difference.
    fn dfactors_match_finite_differences() {
        let ratios = array![2.5, 1.7, 4.1];
        let h = 1e-6;
        let families: [(fn(ArrayView1<f64>) -> Multipliers, fn(ArrayView1<f64>) -> Vec<Array2<f64>>); 2] =
            [(multipliers_mf, dfactors_mf), (multipliers_is, dfactors_is)];
        for (mult, dfac) in families {
            let analytic = dfac(ratios.view());
            for k in 0..ratios.len() {
                let mut rp = ratios.clone();
                let mut rm = ratios.clone();
                rp[k] += h;
                rm[k] -= h;
                let fd = (mult(rp.view()).0 - mult(rm.view()).0) / (2.0 * h);
                assert_close(&analytic[k], &fd, 1e-6);
            }
        }
    }
}
