//! Numerical stability utilities.
//!
//! Provides the guarded transforms used to move between the unconstrained
//! optimizer space and constrained allocation quantities (simplex weights,
//! positive variances).
//!
//! # Provided items
//! - [`EIGEN_EPS`]: eigenvalues with magnitude at most this value are
//!   treated as zero by pseudo-inverses.
//! - [`GENERAL_TOL`]: generic relative tolerance for symmetry and tie checks.
//! - [`MIN_SIMPLEX_WEIGHT`]: floor applied when mapping simplex weights back
//!   to logits, so that `ln(0)` never occurs.
//! - [`safe_softmax`]: max-shifted softmax of `[0, θ]`, mapping `R^{k}` onto
//!   the interior of the `k+1` simplex.
//! - [`safe_softmax_deriv`]: vector–Jacobian product of that softmax.
//! - [`softmax_logits`]: inverse map from simplex weights to logits.
//! - [`safe_log10`]: `log10` that rejects non-positive inputs with `NaN`
//!   instead of `-inf`.
use ndarray::{Array1, ArrayView1};

/// Eigenvalue truncation threshold for symmetric pseudo-inverses.
pub const EIGEN_EPS: f64 = 1e-12;

/// Generic relative tolerance for symmetry and equality checks.
pub const GENERAL_TOL: f64 = 1e-8;

/// Smallest simplex weight allowed when computing logits.
pub const MIN_SIMPLEX_WEIGHT: f64 = 1e-12;

/// Numerically stable softmax of the augmented logit vector `[0, θ]`.
///
/// The first weight corresponds to the fixed zero logit, which removes the
/// shift invariance of softmax so that `θ ∈ R^k` maps one-to-one onto the
/// open `k+1` simplex. The maximum logit is subtracted before
/// exponentiation, so large `θ` never overflows.
///
/// # Parameters
/// - `theta`: free logits, length `k`.
///
/// # Returns
/// - Weights `w` of length `k + 1` with `w_i > 0` and `Σ w_i = 1`.
pub fn safe_softmax(theta: ArrayView1<f64>) -> Array1<f64> {
    let max = theta.iter().copied().fold(0.0_f64, f64::max);
    let mut w = Array1::<f64>::zeros(theta.len() + 1);
    w[0] = (-max).exp();
    for (i, &t) in theta.iter().enumerate() {
        w[i + 1] = (t - max).exp();
    }
    let total = w.sum();
    w /= total;
    w
}

/// Vector–Jacobian product of [`safe_softmax`].
///
/// Given the softmax output `w` (length `k+1`) and an upstream gradient
/// `g = ∂f/∂w`, returns `∂f/∂θ` (length `k`):
///
/// `∂f/∂θ_j = w_{j+1} (g_{j+1} − Σ_i w_i g_i)`.
pub fn safe_softmax_deriv(w: ArrayView1<f64>, upstream: ArrayView1<f64>) -> Array1<f64> {
    let inner = w.dot(&upstream);
    Array1::from_shape_fn(w.len() - 1, |j| w[j + 1] * (upstream[j + 1] - inner))
}

/// Inverse of [`safe_softmax`]: logits `θ_j = ln(w_{j+1} / w_0)`.
///
/// Weights are floored at [`MIN_SIMPLEX_WEIGHT`] first, so boundary points
/// map to large but finite logits.
pub fn softmax_logits(w: ArrayView1<f64>) -> Array1<f64> {
    let w0 = w[0].max(MIN_SIMPLEX_WEIGHT);
    Array1::from_shape_fn(w.len() - 1, |j| (w[j + 1].max(MIN_SIMPLEX_WEIGHT) / w0).ln())
}

/// `log10(x)` for `x > 0`, `NaN` otherwise.
///
/// The optimizer adapter rejects non-finite costs, so a `NaN` here turns a
/// degenerate allocation into a recoverable objective error.
pub fn safe_log10(x: f64) -> f64 {
    if x > 0.0 && x.is_finite() { x.log10() } else { f64::NAN }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Mass conservation and overflow safety of `safe_softmax`.
    // - `safe_softmax_deriv` against central finite differences.
    // - `softmax_logits` as a left inverse of `safe_softmax`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Softmax weights must be positive and sum to one, even for huge logits.
    //
    // Given
    // -----
    // - θ = (800, -3, 0.5).
    //
    // Expect
    // ------
    // - Finite weights summing to 1.
    fn safe_softmax_conserves_mass_without_overflow() {
        // Arrange
        let theta = array![800.0, -3.0, 0.5];

        // Act
        let w = safe_softmax(theta.view());

        // Assert
        assert_eq!(w.len(), 4);
        assert!(w.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Check the vector–Jacobian product numerically.
    //
    // Given
    // -----
    // - θ = (0.3, -0.7), f(w) = g·w with g = (1, 2, -1).
    //
    // Expect
    // ------
    // - Analytic and central-difference gradients agree to 1e-7.
    fn safe_softmax_deriv_matches_finite_differences() {
        // Arrange
        let theta = array![0.3, -0.7];
        let g = array![1.0, 2.0, -1.0];
        let f = |t: &Array1<f64>| safe_softmax(t.view()).dot(&g);
        let h = 1e-6;

        // Act
        let w = safe_softmax(theta.view());
        let analytic = safe_softmax_deriv(w.view(), g.view());

        // Assert
        for j in 0..theta.len() {
            let mut tp = theta.clone();
            let mut tm = theta.clone();
            tp[j] += h;
            tm[j] -= h;
            let fd = (f(&tp) - f(&tm)) / (2.0 * h);
            assert!((fd - analytic[j]).abs() < 1e-7, "component {j}: fd {fd} vs {}", analytic[j]);
        }
    }

    #[test]
    // Purpose
    // -------
    // Logits recovered from softmax weights reproduce the original θ.
    //
    // Given
    // -----
    // - θ = (1.5, -2.0, 0.0).
    //
    // Expect
    // ------
    // - softmax_logits(safe_softmax(θ)) ≈ θ.
    fn softmax_logits_inverts_softmax() {
        let theta = array![1.5, -2.0, 0.0];
        let back = softmax_logits(safe_softmax(theta.view()).view());
        for (a, b) in back.iter().zip(theta.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }
}
