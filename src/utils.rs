//! utils — small linear-algebra and counting helpers shared across modules.
//!
//! Purpose
//! -------
//! Bridge `ndarray` containers to `nalgebra` factorizations and collect the
//! numeric conventions (tolerant flooring, eigenvalue truncation, safe
//! division) that the allocation, variance and estimator layers share.
//!
//! Conventions
//! -----------
//! - Symmetric matrices are copied into `DMatrix` column by column; no
//!   symmetrization is performed.
//! - Pseudo-inverses drop eigenvalues with magnitude at most [`EIGEN_EPS`].
//! - Cholesky failures surface as [`MfError::SingularSystem`] naming the
//!   system that failed.
use crate::{
    errors::{MfError, MfResult},
    optimization::numerical_stability::transformations::EIGEN_EPS,
};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Slack used when converting continuous sample counts to integers so that
/// values like `11.999999999` floor to 12.
pub const COUNT_FLOOR_TOL: f64 = 1e-8;

/// floor_count — floor a non-negative continuous count with tolerance.
///
/// Returns `floor(x + COUNT_FLOOR_TOL)`; negative inputs map to `0.0`.
pub fn floor_count(x: f64) -> f64 {
    (x + COUNT_FLOOR_TOL).floor().max(0.0)
}

/// Divide `num` by `den`, returning zero when the denominator vanishes.
///
/// Used for averages over possibly empty sample sets: an empty set carries
/// no information, so its contribution is zero.
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

/// fill_dmatrix — copy a square `ndarray` matrix into a `nalgebra::DMatrix`.
///
/// Parameters
/// ----------
/// - `mat`: `ArrayView2<f64>`
///   Square matrix. Shape mismatches are programmer errors.
///
/// Returns
/// -------
/// `DMatrix<f64>` with identical entries.
pub fn fill_dmatrix(mat: ArrayView2<f64>) -> DMatrix<f64> {
    let (rows, cols) = mat.dim();
    let mut out = DMatrix::<f64>::zeros(rows, cols);
    for j in 0..cols {
        for i in 0..rows {
            out[(i, j)] = mat[[i, j]];
        }
    }
    out
}

/// Copy a `DMatrix` back into an owned `ndarray` matrix.
pub fn from_dmatrix(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

/// cholesky_solve — solve `A x = b` for symmetric positive-definite `A`.
///
/// Errors
/// ------
/// - `MfError::SingularSystem { what }` when the Cholesky factorization
///   fails or the solution is not finite.
pub fn cholesky_solve(a: ArrayView2<f64>, b: ArrayView1<f64>, what: &'static str) -> MfResult<Array1<f64>> {
    let chol = fill_dmatrix(a).cholesky().ok_or(MfError::SingularSystem { what })?;
    let rhs = DVector::from_iterator(b.len(), b.iter().copied());
    let sol = chol.solve(&rhs);
    if sol.iter().any(|v| !v.is_finite()) {
        return Err(MfError::SingularSystem { what });
    }
    Ok(Array1::from_iter(sol.iter().copied()))
}

/// cholesky_inverse — inverse of a symmetric positive-definite matrix.
///
/// Errors
/// ------
/// - `MfError::SingularSystem { what }` when `a` is not positive definite.
pub fn cholesky_inverse(a: ArrayView2<f64>, what: &'static str) -> MfResult<Array2<f64>> {
    let chol = fill_dmatrix(a).cholesky().ok_or(MfError::SingularSystem { what })?;
    let inv = from_dmatrix(&chol.inverse());
    if inv.iter().any(|v| !v.is_finite()) {
        return Err(MfError::SingularSystem { what });
    }
    Ok(inv)
}

/// pinv_symmetric — Moore–Penrose pseudo-inverse of a symmetric matrix.
///
/// Notes
/// -----
/// - Uses the symmetric eigendecomposition `A = Q Λ Qᵀ` and keeps only
///   eigenvalues with `|λ| > EIGEN_EPS`:
///   `A⁺ = Σ_{k: |λ_k| > EIGEN_EPS} q_k q_kᵀ / λ_k`.
/// - No explicit inverse is formed for the truncated directions, so nearly
///   singular systems stay finite.
pub fn pinv_symmetric(a: ArrayView2<f64>) -> Array2<f64> {
    let n = a.nrows();
    let eigen = fill_dmatrix(a).symmetric_eigen();
    let q = eigen.eigenvectors;
    let mut out = Array2::<f64>::zeros((n, n));
    for (k, &lambda) in eigen.eigenvalues.iter().enumerate() {
        if lambda.abs() <= EIGEN_EPS {
            continue;
        }
        for i in 0..n {
            let coeff = q[(i, k)] / lambda;
            for j in 0..n {
                out[[i, j]] += coeff * q[(j, k)];
            }
        }
    }
    out
}

/// Correlation matrix `ρ_ij = C_ij / sqrt(C_ii C_jj)`.
pub fn covariance_to_correlation(cov: ArrayView2<f64>) -> Array2<f64> {
    let sd = cov.diag().mapv(f64::sqrt);
    Array2::from_shape_fn(cov.dim(), |(i, j)| safe_div(cov[[i, j]], sd[i] * sd[j]))
}

/// Unbiased (ddof = 1) covariance of the columns of `values` (`n × d`).
pub fn sample_covariance(values: ArrayView2<f64>) -> Array2<f64> {
    let n = values.nrows();
    let d = values.ncols();
    if n < 2 {
        return Array2::zeros((d, d));
    }
    let mean = values.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
    let centered = &values - &mean.insert_axis(Axis(0));
    centered.t().dot(&centered) / (n as f64 - 1.0)
}

/// Arithmetic mean, zero for an empty view.
pub fn mean_or_zero(values: ArrayView1<f64>) -> f64 {
    safe_div(values.sum(), values.len() as f64)
}

/// Population variance (ddof = 0), zero for an empty view.
pub fn population_variance(values: ArrayView1<f64>) -> f64 {
    let mean = mean_or_zero(values);
    safe_div(values.iter().map(|v| (v - mean).powi(2)).sum(), values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Tolerant flooring of continuous counts.
    // - Cholesky solves/inverses and their singular-system errors.
    // - Eigen pseudo-inverse on a rank-deficient matrix.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Floating noise just below an integer must not lose a sample.
    //
    // Given
    // -----
    // - 11.9999999999 and 2.7.
    //
    // Expect
    // ------
    // - 12 and 2.
    fn floor_count_absorbs_rounding_noise() {
        assert_eq!(floor_count(11.999_999_999_9), 12.0);
        assert_eq!(floor_count(2.7), 2.0);
        assert_eq!(floor_count(-0.5), 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Verify the SPD solve and the error path for an indefinite matrix.
    //
    // Given
    // -----
    // - A = diag(4, 1), b = (2, 3).
    // - An indefinite matrix.
    //
    // Expect
    // ------
    // - x = (0.5, 3); SingularSystem for the indefinite case.
    fn cholesky_solve_handles_spd_and_rejects_indefinite() {
        // Arrange
        let a = array![[4.0, 0.0], [0.0, 1.0]];
        let b = array![2.0, 3.0];
        let bad = array![[1.0, 2.0], [2.0, 1.0]];

        // Act
        let x = cholesky_solve(a.view(), b.view(), "test").expect("SPD solve should succeed");
        let err = cholesky_solve(bad.view(), b.view(), "test").unwrap_err();

        // Assert
        assert!((x[0] - 0.5).abs() < 1e-12 && (x[1] - 3.0).abs() < 1e-12);
        assert_eq!(err, MfError::SingularSystem { what: "test" });
    }

    #[test]
    // Purpose
    // -------
    // The pseudo-inverse of a rank-one projector is the projector itself.
    //
    // Given
    // -----
    // - P = v vᵀ with v = (1, 1)/√2.
    //
    // Expect
    // ------
    // - pinv(P) ≈ P.
    fn pinv_symmetric_inverts_projector() {
        // Arrange
        let p = array![[0.5, 0.5], [0.5, 0.5]];

        // Act
        let pinv = pinv_symmetric(p.view());

        // Assert
        for (a, b) in pinv.iter().zip(p.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }

    #[test]
    // Purpose
    // -------
    // Sample covariance uses ddof = 1.
    //
    // Given
    // -----
    // - Columns (1, 2, 3) and (2, 4, 6).
    //
    // Expect
    // ------
    // - [[1, 2], [2, 4]].
    fn sample_covariance_is_unbiased() {
        let values = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let cov = sample_covariance(values.view());
        assert!((cov[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((cov[[0, 1]] - 2.0).abs() < 1e-12);
        assert!((cov[[1, 1]] - 4.0).abs() < 1e-12);
    }
}
