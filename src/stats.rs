//! stats — validated model covariance and cost inputs.
//!
//! Every estimator is built from a covariance matrix between model outputs
//! and a per-model cost vector. [`ModelStats`] checks them once, at
//! construction, so the allocation and variance layers can assume:
//!
//! - `cov` is square `M × M`, finite, symmetric to a relative tolerance and
//!   has a non-negative diagonal;
//! - `costs` has length `M` with finite, strictly positive entries;
//! - model 0 is the high-fidelity model.
use crate::{
    errors::{MfError, MfResult},
    optimization::numerical_stability::GENERAL_TOL,
};
use ndarray::{Array1, Array2};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelStats {
    cov: Array2<f64>,
    costs: Array1<f64>,
}

impl ModelStats {
    /// Validate and store a covariance/cost pair.
    ///
    /// # Errors
    /// - `CovarianceNotSquare`, `InvalidCovariance`, `CovarianceNotSymmetric`
    ///   for malformed covariances.
    /// - `DimensionMismatch` when `costs.len() != cov.nrows()`.
    /// - `InvalidCost` for non-finite or non-positive costs.
    /// - `TooFewModels` when no model is supplied.
    pub fn new(cov: Array2<f64>, costs: Array1<f64>) -> MfResult<Self> {
        let (rows, cols) = cov.dim();
        if rows != cols {
            return Err(MfError::CovarianceNotSquare { rows, cols });
        }
        if rows == 0 {
            return Err(MfError::TooFewModels { nmodels: 0, required: 1 });
        }
        if costs.len() != rows {
            return Err(MfError::DimensionMismatch {
                what: "costs",
                expected: rows,
                found: costs.len(),
            });
        }
        for ((row, col), &value) in cov.indexed_iter() {
            if !value.is_finite() {
                return Err(MfError::InvalidCovariance {
                    row,
                    col,
                    value,
                    reason: "Entries must be finite.",
                });
            }
            if row == col && value < 0.0 {
                return Err(MfError::InvalidCovariance {
                    row,
                    col,
                    value,
                    reason: "Variances must be non-negative.",
                });
            }
            if col > row {
                let other = cov[[col, row]];
                let scale = value.abs().max(other.abs()).max(1.0);
                if (value - other).abs() > GENERAL_TOL * scale {
                    return Err(MfError::CovarianceNotSymmetric { row, col });
                }
            }
        }
        for (index, &value) in costs.iter().enumerate() {
            if !value.is_finite() || value <= 0.0 {
                return Err(MfError::InvalidCost { index, value });
            }
        }
        Ok(Self { cov, costs })
    }

    pub fn cov(&self) -> &Array2<f64> {
        &self.cov
    }

    pub fn costs(&self) -> &Array1<f64> {
        &self.costs
    }

    pub fn nmodels(&self) -> usize {
        self.costs.len()
    }

    /// Variance of the high-fidelity model, `C[0, 0]`.
    pub fn hf_variance(&self) -> f64 {
        self.cov[[0, 0]]
    }

    /// Restrict the statistics to the models in `indices` (in that order).
    pub fn select(&self, indices: &[usize]) -> MfResult<Self> {
        let m = self.nmodels();
        if indices.is_empty() || indices.iter().any(|&i| i >= m) {
            return Err(MfError::InvalidSubset {
                subset: indices.to_vec(),
                reason: "Subset must be non-empty with indices below the model count.",
            });
        }
        let cov = Array2::from_shape_fn((indices.len(), indices.len()), |(i, j)| {
            self.cov[[indices[i], indices[j]]]
        });
        let costs = Array1::from_iter(indices.iter().map(|&i| self.costs[i]));
        Self::new(cov, costs)
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
    // - Acceptance of a valid covariance/cost pair.
    // - Each validation error path.
    // - Sub-selection of models.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Reject inconsistent shapes and invalid entries.
    //
    // Given
    // -----
    // - Non-square covariance, mismatched costs, asymmetric covariance,
    //   negative cost.
    //
    // Expect
    // ------
    // - The matching validation variant for each case.
    fn new_rejects_malformed_inputs() {
        let cov = array![[1.0, 0.5], [0.5, 1.0]];
        assert_eq!(
            ModelStats::new(Array2::zeros((2, 3)), array![1.0, 1.0]).unwrap_err(),
            MfError::CovarianceNotSquare { rows: 2, cols: 3 }
        );
        assert!(matches!(
            ModelStats::new(cov.clone(), array![1.0]).unwrap_err(),
            MfError::DimensionMismatch { expected: 2, found: 1, .. }
        ));
        assert_eq!(
            ModelStats::new(array![[1.0, 0.5], [0.4, 1.0]], array![1.0, 1.0]).unwrap_err(),
            MfError::CovarianceNotSymmetric { row: 0, col: 1 }
        );
        assert_eq!(
            ModelStats::new(cov, array![1.0, -0.1]).unwrap_err(),
            MfError::InvalidCost { index: 1, value: -0.1 }
        );
    }

    #[test]
    // Purpose
    // -------
    // Selecting models keeps the corresponding rows/columns and costs.
    //
    // Given
    // -----
    // - Three models; select [0, 2].
    //
    // Expect
    // ------
    // - 2×2 covariance [[1, .25], [.25, 4]] and costs [6, 1].
    fn select_restricts_models() {
        let stats = ModelStats::new(
            array![[1.0, 0.5, 0.25], [0.5, 1.0, 0.5], [0.25, 0.5, 4.0]],
            array![6.0, 3.0, 1.0],
        )
        .expect("valid stats");
        let sub = stats.select(&[0, 2]).expect("valid selection");
        assert_eq!(sub.cov(), &array![[1.0, 0.25], [0.25, 4.0]]);
        assert_eq!(sub.costs(), &array![6.0, 1.0]);
    }
}
