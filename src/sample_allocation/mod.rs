//! sample_allocation — continuous sample allocation for every estimator
//! family.
//!
//! Purpose
//! -------
//! Decide how a budget is spread across models (or model subsets) before
//! integer rounding. Closed forms cover MLMC and MFMC; the remaining ACV
//! families and MLBLUE are solved numerically with the L-BFGS minimizer of
//! [`crate::optimization`].
//!
//! Key behaviors
//! -------------
//! - [`closed_form`]: analytic MLMC and MFMC allocations.
//! - [`transform`]: [`BudgetTree`], the budget-exact reparameterization of
//!   nested recursion-tree counts.
//! - [`acv_objective`] / [`acv_optimizer`]: `log10 Var` over the budget tree
//!   for ACVMF, ACVIS and ACVGMF.
//! - [`tree_search`]: minimum-variance selection over recursion-tree
//!   candidates (ACVGMFB).
//! - [`blue_allocation`]: MLBLUE fractions on the unit-budget simplex and
//!   their integer counts.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are validated [`ModelStats`](crate::stats::ModelStats) arrays.
//! - Every continuous allocation spends the target cost exactly.

pub mod acv_objective;
pub mod acv_optimizer;
pub mod blue_allocation;
pub mod closed_form;
pub mod transform;
pub mod tree_search;
pub mod types;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::acv_objective::AcvObjective;
pub use self::acv_optimizer::allocate_samples_acv;
pub use self::blue_allocation::{BlueObjective, allocate_samples_mlblue, nsamples_per_subset, subset_costs};
pub use self::closed_form::{allocate_samples_mfmc, allocate_samples_mlmc};
pub use self::transform::BudgetTree;
pub use self::tree_search::{BestCandidate, search_best_candidate};
pub use self::types::{ContinuousAllocation, SubsetFractions};
