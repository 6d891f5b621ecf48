//! variance — estimator variance engine.
//!
//! Purpose
//! -------
//! Turn a model covariance and an allocation into estimator variances and
//! the weights that minimize them.
//!
//! Key behaviors
//! -------------
//! - [`discrepancy`]: `(CF, cf)` for closed-form and generic allocations,
//!   plus the multiplier derivatives used by the optimizer.
//! - [`weights`]: control-variate weights, `r²`, MLMC/MFMC closed forms.
//! - [`families`]: [`VarianceModel`], the per-family glue from sample
//!   counts to partitions, weights and variance.
//! - [`blue`]: the MLBLUE subset system.
//!
//! Conventions
//! -----------
//! - Discrepancy covariances are scaled by the high-fidelity sample count,
//!   so `r²` is computed identically for every ACV family.

pub mod blue;
pub mod discrepancy;
pub mod families;
pub mod weights;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::blue::BlueSystem;
pub use self::discrepancy::{
    discrepancy_covariances_generic, discrepancy_covariances_is, discrepancy_covariances_mf,
};
pub use self::families::{VarianceModel, ratios_of};
pub use self::weights::{
    acv_variance_with_weights, acv_weights, check_mfmc_model_costs_and_correlations, mfmc_weights,
    mlmc_weights, rsquared, rsquared_mfmc, rsquared_mlmc, variance_from_rsquared,
};
