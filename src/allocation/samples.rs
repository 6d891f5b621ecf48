//! allocation::samples — sample counts, integer rounding and partition sizes.
//!
//! Purpose
//! -------
//! Translate sample ratios `r_i = n_i / n_0` and a target cost into sample
//! counts, round them to integers that respect the budget, and split the
//! per-model totals into the disjoint partition sizes the allocation
//! matrices refer to.
//!
//! Key behaviors
//! -------------
//! - [`nhf_samples`] / [`nsamples_per_model`]: continuous counts from ratios.
//! - [`round_nsample_ratios`]: floor `n_0` and every `r_i n_0`, recompute the
//!   ratios and the cost actually spent. [`enforce_nested_counts`] bumps
//!   children past their parents afterwards for recursion-tree families.
//! - `npartition_samples_*`: partition sizes per family.
//!
//! Invariants & assumptions
//! ------------------------
//! - Rounded counts never exceed the continuous counts before nesting is
//!   enforced; nesting may add at most one sample per tree level.
//! - Negative partition sizes are reported as `NonPositivePartition`; empty
//!   padding partitions are allowed only where the family produces them
//!   (ACVMF with tied counts).
use crate::{
    allocation::recursion::RecursionIndex,
    errors::{MfError, MfResult},
    utils::floor_count,
};
use ndarray::{Array1, ArrayView1};

/// Integer-feasible counts derived from continuous ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundedAllocation {
    /// Ratios `n_i / n_0` of the rounded counts (length `M − 1`).
    pub ratios: Array1<f64>,
    /// Integer-valued counts per model (length `M`).
    pub nsamples: Array1<f64>,
    /// Cost of evaluating the rounded counts.
    pub cost: f64,
}

/// Number of high-fidelity samples `T / (c_0 + Σ r_i c_i)`.
pub fn nhf_samples(target_cost: f64, costs: ArrayView1<f64>, ratios: ArrayView1<f64>) -> f64 {
    let lf_cost: f64 = ratios.iter().zip(costs.iter().skip(1)).map(|(r, c)| r * c).sum();
    target_cost / (costs[0] + lf_cost)
}

/// nsamples_per_model — `[n_0, r_1 n_0, …]` for a target cost.
///
/// When `round` is set the counts are floored (with a small tolerance so
/// that values like `11.999999` become 12).
pub fn nsamples_per_model(
    target_cost: f64, costs: ArrayView1<f64>, ratios: ArrayView1<f64>, round: bool,
) -> Array1<f64> {
    let mut nhf = nhf_samples(target_cost, costs, ratios);
    if round {
        nhf = floor_count(nhf);
    }
    let mut out = Array1::<f64>::zeros(ratios.len() + 1);
    out[0] = nhf;
    for (i, &r) in ratios.iter().enumerate() {
        out[i + 1] = if round { floor_count(r * nhf) } else { r * nhf };
    }
    out
}

/// Cost of evaluating `nsamples[i]` samples of every model.
pub fn allocation_cost(costs: ArrayView1<f64>, nsamples: ArrayView1<f64>) -> f64 {
    costs.dot(&nsamples)
}

/// round_nsample_ratios — budget-respecting integer counts.
///
/// Parameters
/// ----------
/// - `target_cost`: total budget `T > 0`.
/// - `costs`: per-model costs, length `M`.
/// - `ratios`: continuous ratios `r_i ≥ 1`, length `M − 1`.
///
/// Returns
/// -------
/// [`RoundedAllocation`] with `n_0 = ⌊n_hf⌋`, `n_i = ⌊r_i n_0⌋`, the ratios
/// `n_i / n_0` and the cost `Σ c_i n_i ≤ T`.
///
/// Errors
/// ------
/// - `MfError::InfeasibleBudget` when `⌊n_hf⌋ < 1`.
pub fn round_nsample_ratios(
    target_cost: f64, costs: ArrayView1<f64>, ratios: ArrayView1<f64>,
) -> MfResult<RoundedAllocation> {
    let nhf = floor_count(nhf_samples(target_cost, costs, ratios));
    if nhf < 1.0 {
        let lf_cost: f64 = ratios.iter().zip(costs.iter().skip(1)).map(|(r, c)| r * c).sum();
        return Err(MfError::InfeasibleBudget {
            target_cost,
            required_cost: costs[0] + lf_cost,
        });
    }
    let nsamples = nsamples_per_model(target_cost, costs, ratios, true);
    Ok(RoundedAllocation {
        ratios: nsamples.slice(ndarray::s![1..]).mapv(|n| n / nhf),
        cost: allocation_cost(costs, nsamples.view()),
        nsamples,
    })
}

/// enforce_nested_counts — give every child at least one more sample than
/// its parent.
///
/// Children are visited in topological order so a bump propagates down the
/// tree. Ratios and cost of `rounded` are refreshed; the cost may exceed the
/// original target by the bumped samples.
pub fn enforce_nested_counts(rounded: &mut RoundedAllocation, costs: ArrayView1<f64>, rec: &RecursionIndex) {
    for model in rec.topological_order().into_iter().skip(1) {
        let floor = rounded.nsamples[rec.parent(model)] + 1.0;
        if rounded.nsamples[model] < floor {
            rounded.nsamples[model] = floor;
        }
    }
    let nhf = rounded.nsamples[0];
    rounded.ratios = rounded.nsamples.slice(ndarray::s![1..]).mapv(|n| n / nhf);
    rounded.cost = allocation_cost(costs, rounded.nsamples.view());
}

/// MLMC partitions: `P_0 = n_0`, `P_i = n_i − P_{i−1}`.
pub fn npartition_samples_mlmc(nsamples_per_model: ArrayView1<f64>) -> MfResult<Array1<f64>> {
    let mut out = Array1::<f64>::zeros(nsamples_per_model.len());
    out[0] = nsamples_per_model[0];
    for i in 1..out.len() {
        out[i] = nsamples_per_model[i] - out[i - 1];
    }
    check_partitions(out)
}

/// MFMC partitions: `P_0 = n_0`, `P_i = n_i − n_{i−1}`.
pub fn npartition_samples_mfmc(nsamples_per_model: ArrayView1<f64>) -> MfResult<Array1<f64>> {
    let mut out = Array1::<f64>::zeros(nsamples_per_model.len());
    out[0] = nsamples_per_model[0];
    for i in 1..out.len() {
        out[i] = nsamples_per_model[i] - nsamples_per_model[i - 1];
    }
    check_partitions(out)
}

/// npartition_samples_acvmf — partitions of ACVMF/ACVGMF allocations.
///
/// `P_0 = n_0`, followed by the consecutive differences of
/// `[n_0, sorted unique(n_1, …, n_{M−1})]`, zero-padded to length `M`. Pairs
/// with [`AllocationMatrix::reorder_acvgmf`](crate::allocation::AllocationMatrix::reorder_acvgmf).
pub fn npartition_samples_acvmf(nsamples_per_model: ArrayView1<f64>) -> MfResult<Array1<f64>> {
    let nmodels = nsamples_per_model.len();
    let mut unique: Vec<f64> = nsamples_per_model.iter().skip(1).copied().collect();
    unique.sort_by(f64::total_cmp);
    unique.dedup();
    let mut out = Array1::<f64>::zeros(nmodels);
    out[0] = nsamples_per_model[0];
    let mut prev = nsamples_per_model[0];
    for (k, &n) in unique.iter().enumerate() {
        out[k + 1] = n - prev;
        prev = n;
    }
    check_partitions(out)
}

/// ACVIS partitions: `P_0 = n_0`, `P_i = n_i − P_{rec[i−1]}`.
pub fn npartition_samples_acvis(
    nsamples_per_model: ArrayView1<f64>, rec: &RecursionIndex,
) -> MfResult<Array1<f64>> {
    let mut out = Array1::<f64>::zeros(nsamples_per_model.len());
    out[0] = nsamples_per_model[0];
    for model in rec.topological_order().into_iter().skip(1) {
        out[model] = nsamples_per_model[model] - out[rec.parent(model)];
    }
    check_partitions(out)
}

fn check_partitions(partitions: Array1<f64>) -> MfResult<Array1<f64>> {
    if partitions[0] <= 0.0 {
        return Err(MfError::NonPositivePartition { index: 0, value: partitions[0] });
    }
    if let Some((index, &value)) = partitions.iter().enumerate().find(|(_, v)| **v < 0.0) {
        return Err(MfError::NonPositivePartition { index, value });
    }
    Ok(partitions)
}
