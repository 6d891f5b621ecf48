//! estimators — multi-fidelity Monte Carlo estimators of a high-fidelity
//! mean.
//!
//! Purpose
//! -------
//! Combine a covariance between model outputs and per-sample costs into
//! optimal sample allocations, then turn model values drawn on those
//! allocations into unbiased estimates of `E[Q_0]`.
//!
//! Key behaviors
//! -------------
//! - [`mc`]: single-fidelity Monte Carlo, the baseline.
//! - [`acv`]: MLMC, MFMC, ACVMF, ACVIS, ACVGMF and ACVGMFB in one
//!   approximate-control-variate estimator.
//! - [`mlblue`]: the multilevel best linear unbiased estimator.
//! - [`aetc`]: AETC-BLUE, which learns model statistics from a pilot
//!   sample before spending the rest of the budget with MLBLUE.
//! - [`estimator`] / [`factory`]: the closed [`Estimator`] union, name-based
//!   construction, model-subset search and budget comparison.
//! - [`allocation`]: integer allocations returned by every family.
//! - [`options`]: shared configuration.
//!
//! Invariants & assumptions
//! ------------------------
//! - Model 0 is always the high-fidelity model.
//! - Estimators never mutate after construction; allocations are values
//!   that are passed back in for data generation and estimation.

pub mod acv;
pub mod aetc;
pub mod allocation;
pub mod estimator;
pub mod factory;
pub mod mc;
pub mod mlblue;
pub mod options;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::acv::{AcvEstimator, AcvFamily};
pub use self::aetc::{AETC_DEFAULT_ALPHA, AETC_DEFAULT_REG, AetcBlue, AetcEstimate, ExploreResult};
pub use self::allocation::{Allocation, AllocationResult, BlueAllocation};
pub use self::estimator::{Estimator, EstimatorKind};
pub use self::factory::{BestModels, compare_estimator_variances, get_best_models_for_acv_estimator, get_estimator};
pub use self::mc::MonteCarloEstimator;
pub use self::mlblue::MlblueEstimator;
pub use self::options::{DEFAULT_BLUE_REG, EstimatorOptions};
