//! allocation — combinatorial structure of multi-fidelity sample allocations.
//!
//! Purpose
//! -------
//! Describe how samples are shared between models: recursion trees, the
//! partition-membership matrices of each ACV family, and the integer sample
//! and partition counts those matrices are applied to.
//!
//! Key behaviors
//! -------------
//! - [`recursion`]: validated recursion trees, tree enumeration and model
//!   subset enumeration.
//! - [`matrix`]: allocation matrices, their reordering and intersection
//!   counting.
//! - [`samples`]: ratios → counts, budget-respecting rounding and partition
//!   sizes.
//!
//! Invariants & assumptions
//! ------------------------
//! - Model 0 is high fidelity; ratios are `n_i / n_0` for `i ≥ 1`.
//! - For every family the partition sizes reconstruct the per-model totals
//!   through the family's matrix (`|z_i* ∪ z_i| = n_i`).
//!
//! Downstream usage
//! ----------------
//! - The variance engine evaluates discrepancy covariances on these
//!   matrices; the estimator facade draws one sample block per partition.

pub mod matrix;
pub mod recursion;
pub mod samples;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::matrix::AllocationMatrix;
pub use self::recursion::{RecursionIndex, model_subsets, recursion_indices};
pub use self::samples::{
    RoundedAllocation, allocation_cost, enforce_nested_counts, nhf_samples,
    npartition_samples_acvis, npartition_samples_acvmf, npartition_samples_mfmc,
    npartition_samples_mlmc, nsamples_per_model, round_nsample_ratios,
};
