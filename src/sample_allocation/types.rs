//! sample_allocation::types — results of the continuous allocation step.
//!
//! Continuous allocations are later rounded to integer counts by the
//! estimator layer; these types carry what the rounding and reporting need.
use ndarray::Array1;

/// Continuous optimum of an ACV-type allocation problem.
///
/// - `ratios`: `N_i / N_0` for the low-fidelity models (length `M − 1`).
/// - `nsamples`: continuous counts `N` (length `M`), spending the budget
///   exactly.
/// - `log10_variance`: `log10` of the estimator variance at `nsamples`.
/// - `iterations`: solver iterations (0 for closed forms).
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousAllocation {
    pub ratios: Array1<f64>,
    pub nsamples: Array1<f64>,
    pub log10_variance: f64,
    pub iterations: usize,
}

/// Continuous optimum of the MLBLUE subset allocation.
///
/// - `fractions`: share `x_k` of the budget spent on subset `k` (sums to 1).
/// - `unit_variance`: BLUE variance for a unit budget.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetFractions {
    pub fractions: Array1<f64>,
    pub unit_variance: f64,
    pub iterations: usize,
}
