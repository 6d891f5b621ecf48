//! data::generation — sample sets, model values and ACV/BLUE estimates.
//!
//! Purpose
//! -------
//! Turn an integer allocation into concrete inputs, evaluate the models on
//! them and combine the outputs into an estimate.
//!
//! Key behaviors
//! -------------
//! - One block of fresh samples is drawn per disjoint partition `P_p`,
//!   in partition order. Model `i` receives the concatenation of the blocks
//!   of its partitions `z_i* ∪ z_i`, ascending, so the column layout of its
//!   samples is a pure function of the allocation.
//! - [`separate_model_values`] splits each model's outputs into the values
//!   on `z_i*` and on `z_i`. A partition that belongs to both sets
//!   contributes to both.
//! - The ACV estimate is
//!   `Q_0(z_0) + Σ_{i≥1} η_i (Q_i(z_i*) − Q_i(z_i))` with sample means.
//! - MLBLUE data are one independent `n_k × |S_k|` block per subset.
//!
//! Invariants & assumptions
//! ------------------------
//! - Samples drawn for a partition are shared by every model using it.
//! - Only the first quantity of interest of every model is used.
use crate::{
    errors::{MfError, MfResult},
    estimators::AllocationResult,
    sampling::{ModelRef, SampleGenerator, evaluate_first_qoi},
    utils::mean_or_zero,
};
use ndarray::{Array1, Array2, ArrayView1, s};

/// Samples of every model with the partition each column came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleAllocation {
    pub samples_per_model: Vec<Array2<f64>>,
    pub partition_ids_per_model: Vec<Vec<usize>>,
}

/// Outputs of one model split into its control sets.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitValues {
    /// Values on `z_i*` (empty for model 0).
    pub star: Array1<f64>,
    /// Values on `z_i`.
    pub own: Array1<f64>,
}

/// Partition id of every sample column of `model`.
pub fn partition_ids(alloc: &AllocationResult, model: usize) -> Vec<usize> {
    let sizes = alloc.npartition_samples();
    alloc
        .allocation_matrix()
        .model_partitions(model)
        .into_iter()
        .flat_map(|p| std::iter::repeat(p).take(sizes[p]))
        .collect()
}

/// generate_sample_allocations — draw the samples of every model.
///
/// Parameters
/// ----------
/// - `alloc`: integer allocation.
/// - `sampler`: source of `nvars × n` samples.
///
/// Returns
/// -------
/// [`SampleAllocation`] with `alloc.nsamples_per_model()[i]` columns for
/// model `i`.
///
/// Errors
/// ------
/// - `DimensionMismatch` if the sampler returns the wrong number of samples.
/// - Any sampler error.
pub fn generate_sample_allocations<G: SampleGenerator + ?Sized>(
    alloc: &AllocationResult, sampler: &mut G,
) -> MfResult<SampleAllocation> {
    let nvars = sampler.nvars();
    let mut blocks = Vec::with_capacity(alloc.nmodels());
    for &size in alloc.npartition_samples().iter() {
        let block = sampler.generate(size)?;
        if block.dim() != (nvars, size) {
            return Err(MfError::DimensionMismatch {
                what: "generated samples",
                expected: size,
                found: block.ncols(),
            });
        }
        blocks.push(block);
    }

    let mut samples_per_model = Vec::with_capacity(alloc.nmodels());
    let mut partition_ids_per_model = Vec::with_capacity(alloc.nmodels());
    for model in 0..alloc.nmodels() {
        let ids = partition_ids(alloc, model);
        let mut samples = Array2::<f64>::zeros((nvars, ids.len()));
        let mut col = 0;
        for p in alloc.allocation_matrix().model_partitions(model) {
            let width = blocks[p].ncols();
            samples.slice_mut(s![.., col..col + width]).assign(&blocks[p]);
            col += width;
        }
        samples_per_model.push(samples);
        partition_ids_per_model.push(ids);
    }
    Ok(SampleAllocation { samples_per_model, partition_ids_per_model })
}

/// separate_model_values — split raw outputs into `(z_i*, z_i)` values.
///
/// # Errors
/// - `DimensionMismatch` when fewer than `M` value vectors are given.
/// - `ValueCountMismatch` when a model's values do not match its sample
///   count.
pub fn separate_model_values(alloc: &AllocationResult, values_per_model: &[Array1<f64>]) -> MfResult<Vec<SplitValues>> {
    if values_per_model.len() != alloc.nmodels() {
        return Err(MfError::DimensionMismatch {
            what: "value vectors per model",
            expected: alloc.nmodels(),
            found: values_per_model.len(),
        });
    }
    let mat = alloc.allocation_matrix();
    values_per_model
        .iter()
        .enumerate()
        .map(|(model, values)| {
            let ids = partition_ids(alloc, model);
            if values.len() != ids.len() {
                return Err(MfError::ValueCountMismatch { model, expected: ids.len(), found: values.len() });
            }
            let pick = |col: usize| -> Array1<f64> {
                ids.iter().zip(values.iter()).filter(|(p, _)| mat.contains(**p, col)).map(|(_, v)| *v).collect()
            };
            Ok(SplitValues { star: pick(2 * model), own: pick(2 * model + 1) })
        })
        .collect()
}

/// Evaluate every model on its samples.
///
/// # Errors
/// - `DimensionMismatch` when fewer models than the allocation needs are
///   supplied.
/// - Model and sampler errors.
pub fn generate_data<G: SampleGenerator + ?Sized>(
    alloc: &AllocationResult, models: &[ModelRef<'_>], sampler: &mut G,
) -> MfResult<Vec<Array1<f64>>> {
    if models.len() < alloc.nmodels() {
        return Err(MfError::DimensionMismatch {
            what: "models",
            expected: alloc.nmodels(),
            found: models.len(),
        });
    }
    let samples = generate_sample_allocations(alloc, sampler)?;
    samples
        .samples_per_model
        .iter()
        .enumerate()
        .map(|(model, x)| evaluate_first_qoi(models[model], model, x))
        .collect()
}

/// `Q_0(z_0) + Σ η_i (Q_i(z_i*) − Q_i(z_i))`.
///
/// Empty sets contribute a zero mean.
pub fn estimate_acv(weights: ArrayView1<f64>, splits: &[SplitValues]) -> f64 {
    let mut estimate = mean_or_zero(splits[0].own.view());
    for (eta, split) in weights.iter().zip(splits.iter().skip(1)) {
        estimate += eta * (mean_or_zero(split.star.view()) - mean_or_zero(split.own.view()));
    }
    estimate
}

/// Estimate from raw per-model outputs laid out as in
/// [`generate_sample_allocations`].
pub fn estimate_from_values_per_model(alloc: &AllocationResult, values_per_model: &[Array1<f64>]) -> MfResult<f64> {
    let splits = separate_model_values(alloc, values_per_model)?;
    Ok(estimate_acv(alloc.weights(), &splits))
}

/// generate_blue_data — one value block per model subset.
///
/// Parameters
/// ----------
/// - `subsets`: model subsets `S_k`.
/// - `nsamples_per_subset`: counts `n_k`.
/// - `models`, `sampler`: as for [`generate_data`].
///
/// Returns
/// -------
/// For subset `k`, an `n_k × |S_k|` block whose column `j` holds model
/// `S_k[j]` on the subset's own samples.
pub fn generate_blue_data<G: SampleGenerator + ?Sized>(
    subsets: &[Vec<usize>], nsamples_per_subset: ArrayView1<usize>, models: &[ModelRef<'_>], sampler: &mut G,
) -> MfResult<Vec<Array2<f64>>> {
    if nsamples_per_subset.len() != subsets.len() {
        return Err(MfError::DimensionMismatch {
            what: "subset sample counts",
            expected: subsets.len(),
            found: nsamples_per_subset.len(),
        });
    }
    let mut blocks = Vec::with_capacity(subsets.len());
    for (subset, &n) in subsets.iter().zip(nsamples_per_subset.iter()) {
        let mut block = Array2::<f64>::zeros((n, subset.len()));
        if n > 0 {
            let samples = sampler.generate(n)?;
            for (j, &model) in subset.iter().enumerate() {
                let handle = models.get(model).ok_or(MfError::DimensionMismatch {
                    what: "models",
                    expected: model + 1,
                    found: models.len(),
                })?;
                block.column_mut(j).assign(&evaluate_first_qoi(*handle, model, &samples)?);
            }
        }
        blocks.push(block);
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::round_nsample_ratios;
    use crate::sampling::{IndependentVariable, Sampler};
    use crate::variance::VarianceModel;
    use ndarray::{Axis, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Sample counts per model and sharing of partition blocks.
    // - Splitting of values into control sets and the ACV estimate on
    //   hand-built values.
    // - MLBLUE block shapes.
    // -------------------------------------------------------------------------

    fn mfmc_alloc() -> AllocationResult {
        let cov = array![[1.0, 0.9], [0.9, 1.0]];
        let costs = array![1.0, 0.5];
        let rounded = round_nsample_ratios(5.0, costs.view(), array![2.5].view()).unwrap();
        AllocationResult::from_rounded(&VarianceModel::Mfmc, cov.view(), 5.0, rounded, None).unwrap()
    }

    fn sum_model(x: &Array2<f64>) -> MfResult<Array2<f64>> {
        Ok(x.sum_axis(Axis(0)).insert_axis(Axis(1)))
    }

    #[test]
    // Purpose
    // -------
    // Each model receives its counted samples and shares partition blocks.
    //
    // Given
    // -----
    // - MFMC with counts [2, 5] on U(0, 1)².
    //
    // Expect
    // ------
    // - 2 and 5 columns; the first two columns of model 1 equal model 0's.
    fn samples_are_shared_across_models() {
        let alloc = mfmc_alloc();
        assert_eq!(alloc.nsamples_per_model(), array![2usize, 5].view());
        let mut sampler = Sampler::random(IndependentVariable::uniform_box(2, 0.0, 1.0).unwrap(), 3);
        let out = generate_sample_allocations(&alloc, &mut sampler).unwrap();
        assert_eq!(out.samples_per_model[0].ncols(), 2);
        assert_eq!(out.samples_per_model[1].ncols(), 5);
        assert_eq!(out.samples_per_model[1].slice(s![.., 0..2]), out.samples_per_model[0]);
        assert_eq!(out.partition_ids_per_model[1], vec![0, 0, 1, 1, 1]);
    }

    #[test]
    // Purpose
    // -------
    // Values split into z_1* = P_0 and z_1 = P_0 ∪ P_1 and combine into the
    // MFMC estimate.
    //
    // Given
    // -----
    // - Q_0 = [1, 3], Q_1 = [2, 4, 6, 8, 10], weight η.
    //
    // Expect
    // ------
    // - star = [2, 4], own = Q_1; estimate 2 + η (3 − 6).
    fn split_and_estimate_on_known_values() {
        let alloc = mfmc_alloc();
        let values = vec![array![1.0, 3.0], array![2.0, 4.0, 6.0, 8.0, 10.0]];
        let splits = separate_model_values(&alloc, &values).unwrap();
        assert_eq!(splits[1].star, array![2.0, 4.0]);
        assert_eq!(splits[1].own, values[1]);
        let eta = alloc.weights()[0];
        let est = estimate_from_values_per_model(&alloc, &values).unwrap();
        assert!((est - (2.0 + eta * (3.0 - 6.0))).abs() < 1e-14);

        let short = vec![array![1.0, 3.0], array![2.0]];
        assert_eq!(
            separate_model_values(&alloc, &short).unwrap_err(),
            MfError::ValueCountMismatch { model: 1, expected: 5, found: 1 }
        );
    }

    #[test]
    // Purpose
    // -------
    // Model values are evaluated per model; missing models are rejected.
    //
    // Given
    // -----
    // - The MFMC allocation and a sum model.
    //
    // Expect
    // ------
    // - Value lengths [2, 5]; a single model gives `DimensionMismatch`.
    fn generate_data_evaluates_every_model() {
        let alloc = mfmc_alloc();
        let mut sampler = Sampler::random(IndependentVariable::uniform_box(2, 0.0, 1.0).unwrap(), 11);
        let model: ModelRef<'_> = &sum_model;
        let models = vec![model, model];
        let values = generate_data(&alloc, &models, &mut sampler).unwrap();
        assert_eq!(values[0].len(), 2);
        assert_eq!(values[1].len(), 5);
        assert_eq!(values[1].slice(s![0..2]), values[0]);
        assert!(matches!(
            generate_data(&alloc, &models[..1], &mut sampler),
            Err(MfError::DimensionMismatch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // MLBLUE blocks have one row per sample and one column per subset model.
    //
    // Given
    // -----
    // - Subsets [[0], [1], [0, 1]] with counts [3, 0, 2].
    //
    // Expect
    // ------
    // - Shapes (3, 1), (0, 1), (2, 2) with equal columns for identical models.
    fn blue_blocks_have_subset_shapes() {
        let subsets = vec![vec![0], vec![1], vec![0, 1]];
        let mut sampler = Sampler::random(IndependentVariable::uniform_box(1, 0.0, 1.0).unwrap(), 5);
        let model: ModelRef<'_> = &sum_model;
        let models = vec![model, model];
        let blocks = generate_blue_data(&subsets, array![3usize, 0, 2].view(), &models, &mut sampler).unwrap();
        assert_eq!(blocks[0].dim(), (3, 1));
        assert_eq!(blocks[1].dim(), (0, 1));
        assert_eq!(blocks[2].dim(), (2, 2));
        assert_eq!(blocks[2].column(0), blocks[2].column(1));
    }
}
