//! data::bootstrap — resampling estimates of estimator variance.
//!
//! Each replicate resamples the existing model values with replacement and
//! recomputes the estimate; the result is the mean of the replicate
//! estimates and their population variance (`ddof = 0`).
//!
//! - Monte Carlo: plain resampling of one value vector.
//! - ACV: indices are drawn once per partition and applied to every model
//!   that evaluates that partition, so the coupling between models survives
//!   resampling.
//! - MLBLUE: rows are resampled within each subset block.
use crate::{
    data::generation::{estimate_from_values_per_model, separate_model_values},
    errors::{MfError, MfResult},
    estimators::AllocationResult,
    utils::{mean_or_zero, population_variance},
    variance::BlueSystem,
};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

/// Bootstrap summary: mean and variance of the replicate estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapSummary {
    pub mean: f64,
    pub variance: f64,
}

impl BootstrapSummary {
    fn from_estimates(estimates: &Array1<f64>) -> Self {
        Self { mean: mean_or_zero(estimates.view()), variance: population_variance(estimates.view()) }
    }
}

fn check_nbootstraps(nbootstraps: usize) -> MfResult<()> {
    if nbootstraps == 0 {
        return Err(MfError::InvalidOption {
            name: "nbootstraps",
            reason: "At least one bootstrap replicate is required.",
        });
    }
    Ok(())
}

fn resample_indices<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

/// bootstrap_monte_carlo_estimator — bootstrap the sample mean.
///
/// # Errors
/// - `InvalidOption` when `nbootstraps == 0` or `values` is empty.
pub fn bootstrap_monte_carlo_estimator<R: Rng + ?Sized>(
    values: ArrayView1<f64>, nbootstraps: usize, rng: &mut R,
) -> MfResult<BootstrapSummary> {
    check_nbootstraps(nbootstraps)?;
    if values.is_empty() {
        return Err(MfError::InvalidOption { name: "values", reason: "Cannot bootstrap an empty sample." });
    }
    let estimates = Array1::from_shape_fn(nbootstraps, |_| {
        let idx = resample_indices(values.len(), rng);
        idx.iter().map(|&i| values[i]).sum::<f64>() / values.len() as f64
    });
    Ok(BootstrapSummary::from_estimates(&estimates))
}

/// bootstrap_acv_estimator — bootstrap an ACV estimate partition by
/// partition.
///
/// Parameters
/// ----------
/// - `alloc`: the allocation that produced the values.
/// - `values_per_model`: raw outputs laid out as by
///   [`generate_sample_allocations`](crate::data::generate_sample_allocations).
/// - `nbootstraps`: number of replicates (≥ 1).
/// - `rng`: random source for the resampling indices.
///
/// Errors
/// ------
/// - `InvalidOption` when `nbootstraps == 0`.
/// - `DimensionMismatch` / `ValueCountMismatch` when the values do not match
///   the allocation.
pub fn bootstrap_acv_estimator<R: Rng + ?Sized>(
    alloc: &AllocationResult, values_per_model: &[Array1<f64>], nbootstraps: usize, rng: &mut R,
) -> MfResult<BootstrapSummary> {
    check_nbootstraps(nbootstraps)?;
    separate_model_values(alloc, values_per_model)?;

    let sizes = alloc.npartition_samples();
    let mat = alloc.allocation_matrix();
    let mut estimates = Array1::<f64>::zeros(nbootstraps);
    for estimate in estimates.iter_mut() {
        let draws: Vec<Vec<usize>> = sizes.iter().map(|&n| resample_indices(n, rng)).collect();
        let resampled: Vec<Array1<f64>> = values_per_model
            .iter()
            .enumerate()
            .map(|(model, values)| {
                let mut out = Vec::with_capacity(values.len());
                let mut offset = 0;
                for p in mat.model_partitions(model) {
                    out.extend(draws[p].iter().map(|&j| values[offset + j]));
                    offset += sizes[p];
                }
                Array1::from_vec(out)
            })
            .collect();
        *estimate = estimate_from_values_per_model(alloc, &resampled)?;
    }
    Ok(BootstrapSummary::from_estimates(&estimates))
}

/// bootstrap_mlblue_estimator — bootstrap the BLUE estimate by resampling
/// rows within each subset block.
///
/// # Errors
/// - `InvalidOption` when `nbootstraps == 0`.
/// - `DimensionMismatch` from [`BlueSystem::estimate`].
pub fn bootstrap_mlblue_estimator<R: Rng + ?Sized>(
    system: &BlueSystem, sketch: ArrayView1<f64>, values_per_subset: &[Array2<f64>], nbootstraps: usize,
    rng: &mut R,
) -> MfResult<BootstrapSummary> {
    check_nbootstraps(nbootstraps)?;
    let mut estimates = Array1::<f64>::zeros(nbootstraps);
    for estimate in estimates.iter_mut() {
        let resampled: Vec<Array2<f64>> = values_per_subset
            .iter()
            .map(|block| {
                let idx = resample_indices(block.nrows(), rng);
                block.select(Axis(0), &idx)
            })
            .collect();
        *estimate = system.estimate(sketch, &resampled)?;
    }
    Ok(BootstrapSummary::from_estimates(&estimates))
}
