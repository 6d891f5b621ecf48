//! rust_multifidelity — multi-fidelity Monte Carlo estimation of a
//! high-fidelity mean.
//!
//! Purpose
//! -------
//! Estimate `E[Q_0]` of an expensive model cheaply by combining it with
//! correlated low-fidelity models. Given the covariance between model
//! outputs and their per-sample costs, the crate chooses how many samples
//! each model (or model subset) receives under a budget, generates the
//! samples, and combines the values into an unbiased estimate.
//!
//! Key behaviors
//! -------------
//! - [`estimators`]: Monte Carlo, MLMC, MFMC, ACVMF, ACVIS, ACVGMF, ACVGMFB,
//!   MLBLUE and AETC-BLUE, plus name-based construction and comparison.
//! - [`allocation`] / [`variance`]: allocation matrices, recursion trees,
//!   integer rounding and the variance formulas that score them.
//! - [`sample_allocation`] / [`optimization`]: closed-form and L-BFGS
//!   allocation solvers.
//! - [`sampling`] / [`data`]: input sampling, model evaluation, bootstrap
//!   resampling and repeated-trial variance checks.
//!
//! Invariants & assumptions
//! ------------------------
//! - Model 0 is the high-fidelity model; costs are strictly positive.
//! - Covariances are symmetric positive semi-definite with a positive
//!   high-fidelity variance.
//! - Every fallible operation returns [`errors::MfResult`]; nothing panics on
//!   invalid user input.
//!
//! Conventions
//! -----------
//! - Samples are `nvars × n` matrices (one column per sample); model outputs
//!   are `n × nqoi` and only the first quantity of interest is used.
//! - Sample ratios `r_i = N_i / N_0` exclude the high-fidelity model.
//! - Logging goes through `tracing`; install a subscriber to see allocation
//!   and tree-search decisions.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module; `tests/` holds end-to-end checks
//!   of the allocation, estimation and variance pipeline.

pub mod allocation;
pub mod data;
pub mod errors;
pub mod estimators;
pub mod optimization;
pub mod sample_allocation;
pub mod sampling;
pub mod stats;
pub mod utils;
pub mod variance;

// ---- Optional convenience prelude for downstream crates -------------------
//
//     use rust_multifidelity::prelude::*;

pub mod prelude {
    pub use crate::allocation::{AllocationMatrix, RecursionIndex};
    pub use crate::data::{BootstrapSummary, VarianceTrials, estimate_variance};
    pub use crate::errors::{MfError, MfResult};
    pub use crate::estimators::{
        AetcBlue, Allocation, AllocationResult, BlueAllocation, Estimator, EstimatorKind, EstimatorOptions,
        compare_estimator_variances, get_best_models_for_acv_estimator, get_estimator,
    };
    pub use crate::optimization::minimizer::{AllocationOptions, Tolerances};
    pub use crate::sampling::{IndependentVariable, Marginal, Model, ModelRef, SampleGenerator, Sampler, SamplingMethod};
    pub use crate::stats::ModelStats;
}
