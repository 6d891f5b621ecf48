//! estimators::options — estimator configuration.
//!
//! [`EstimatorOptions`] collects the knobs shared by every family. Setters
//! that validate their input return `MfResult<Self>` so options can be
//! chained with `?`:
//!
//! ```ignore
//! let opts = EstimatorOptions::default().with_tree_depth(2)?.with_blue_reg(1e-10)?;
//! ```
//!
//! Settings a family does not use are ignored by it.
use crate::{
    allocation::RecursionIndex,
    errors::{MfError, MfResult},
    optimization::minimizer::AllocationOptions,
};
use ndarray::Array1;

/// Default Tikhonov regularization of the MLBLUE `Psi` matrix.
pub const DEFAULT_BLUE_REG: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorOptions {
    /// Tree for ACVGMF; `None` means the all-zeros tree.
    pub recursion_index: Option<RecursionIndex>,
    /// Maximum tree depth searched by ACVGMFB; `None` means unrestricted.
    pub tree_depth: Option<usize>,
    /// MLBLUE sketch `a`; `None` means `e_0` (the high-fidelity mean).
    pub sketch: Option<Array1<f64>>,
    pub blue_reg: f64,
    pub allocation: AllocationOptions,
    /// Starting ratios for numerical ACV allocations.
    pub initial_guess: Option<Array1<f64>>,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            recursion_index: None,
            tree_depth: None,
            sketch: None,
            blue_reg: DEFAULT_BLUE_REG,
            allocation: AllocationOptions::default(),
            initial_guess: None,
        }
    }
}

impl EstimatorOptions {
    /// `rec` is already a valid tree; its model count is checked against the
    /// covariance when the estimator is built.
    pub fn with_recursion_index(mut self, rec: RecursionIndex) -> Self {
        self.recursion_index = Some(rec);
        self
    }

    /// # Errors
    /// - `InvalidOption` for a depth of zero.
    pub fn with_tree_depth(mut self, depth: usize) -> MfResult<Self> {
        if depth == 0 {
            return Err(MfError::InvalidOption { name: "tree_depth", reason: "Tree depth must be at least 1." });
        }
        self.tree_depth = Some(depth);
        Ok(self)
    }

    /// # Errors
    /// - `InvalidOption` for an empty or non-finite sketch.
    pub fn with_sketch(mut self, sketch: Array1<f64>) -> MfResult<Self> {
        if sketch.is_empty() || sketch.iter().any(|v| !v.is_finite()) {
            return Err(MfError::InvalidOption { name: "sketch", reason: "Sketch must be non-empty and finite." });
        }
        self.sketch = Some(sketch);
        Ok(self)
    }

    /// # Errors
    /// - `InvalidOption` for a negative or non-finite regularization.
    pub fn with_blue_reg(mut self, reg: f64) -> MfResult<Self> {
        if !reg.is_finite() || reg < 0.0 {
            return Err(MfError::InvalidOption {
                name: "blue_reg",
                reason: "Regularization must be finite and non-negative.",
            });
        }
        self.blue_reg = reg;
        Ok(self)
    }

    pub fn with_allocation(mut self, allocation: AllocationOptions) -> MfResult<Self> {
        self.allocation = allocation;
        Ok(self)
    }

    /// # Errors
    /// - `InvalidRatio` when a ratio is non-finite or below one.
    pub fn with_initial_guess(mut self, ratios: Array1<f64>) -> MfResult<Self> {
        validate_ratios(&ratios)?;
        self.initial_guess = Some(ratios);
        Ok(self)
    }
}

/// Sample ratios must be finite and at least one.
pub(crate) fn validate_ratios(ratios: &Array1<f64>) -> MfResult<()> {
    match ratios.iter().position(|r| !r.is_finite() || *r < 1.0) {
        Some(index) => Err(MfError::InvalidRatio {
            index,
            value: ratios[index],
            reason: "Sample ratios must be finite and at least one.",
        }),
        None => Ok(()),
    }
}
