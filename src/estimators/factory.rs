//! estimators::factory — building and comparing estimators by name.
//!
//! Purpose
//! -------
//! Turn an [`EstimatorKind`] plus model statistics into a ready
//! [`Estimator`], search low-fidelity model subsets for the best ACV
//! estimator, and tabulate optimized allocations over a range of budgets.
//!
//! Key behaviors
//! -------------
//! - ACVGMF takes its tree from `options.recursion_index` (all-zeros when
//!   unset); ACVGMFB searches trees up to `options.tree_depth`.
//! - The subset search always keeps the high-fidelity model and tries the
//!   low-fidelity subsets by size, then lexicographically. The first subset
//!   with the smallest variance wins.
//!
//! Invariants & assumptions
//! ------------------------
//! - Estimators are immutable; comparison returns allocations instead of
//!   mutated estimator copies.
use crate::{
    allocation::{RecursionIndex, model_subsets},
    errors::{MfError, MfResult},
    estimators::{
        acv::{AcvEstimator, AcvFamily},
        allocation::Allocation,
        estimator::{Estimator, EstimatorKind},
        mc::MonteCarloEstimator,
        mlblue::MlblueEstimator,
        options::EstimatorOptions,
    },
    sampling::Sampler,
    stats::ModelStats,
};
use ndarray::{Array1, Array2};
use tracing::{debug, info};

/// get_estimator — build an estimator of the requested kind.
///
/// Parameters
/// ----------
/// - `kind`: estimator family.
/// - `cov`: `M × M` model covariance (model 0 is the high-fidelity model).
/// - `costs`: positive per-sample model costs.
/// - `sampler`: input sample generator.
/// - `options`: family options; settings a family does not use are ignored.
///
/// Errors
/// ------
/// - Covariance and cost validation errors from [`ModelStats::new`].
/// - Family construction errors (`TooFewModels`, `UnacceptableMfmcModels`,
///   `DimensionMismatch`, `SingularSystem`).
pub fn get_estimator(
    kind: EstimatorKind, cov: Array2<f64>, costs: Array1<f64>, sampler: Sampler, options: &EstimatorOptions,
) -> MfResult<Estimator> {
    let stats = ModelStats::new(cov, costs)?;
    build_estimator(kind, stats, sampler, options)
}

fn build_estimator(
    kind: EstimatorKind, stats: ModelStats, sampler: Sampler, options: &EstimatorOptions,
) -> MfResult<Estimator> {
    let family = match kind {
        EstimatorKind::Mc => return Ok(Estimator::Mc(MonteCarloEstimator::new(stats, sampler))),
        EstimatorKind::Mlblue => return Ok(Estimator::Mlblue(MlblueEstimator::new(stats, sampler, options)?)),
        EstimatorKind::Mlmc => AcvFamily::Mlmc,
        EstimatorKind::Mfmc => AcvFamily::Mfmc,
        EstimatorKind::Acvmf => AcvFamily::Acvmf,
        EstimatorKind::Acvis => AcvFamily::Acvis,
        EstimatorKind::Acvgmf => AcvFamily::Acvgmf(
            options.recursion_index.clone().unwrap_or_else(|| RecursionIndex::zeros(stats.nmodels())),
        ),
        EstimatorKind::Acvgmfb => AcvFamily::Acvgmfb { depth: options.tree_depth },
    };
    Ok(Estimator::Acv(AcvEstimator::new(family, stats, sampler, options)?))
}

/// Outcome of [`get_best_models_for_acv_estimator`].
#[derive(Debug, Clone)]
pub struct BestModels {
    /// Estimator built on the selected models only.
    pub estimator: Estimator,
    /// Selected model indices into the full ensemble, starting with 0.
    pub model_indices: Vec<usize>,
    /// Optimal allocation of `estimator` at the search budget.
    pub allocation: Allocation,
}

/// get_best_models_for_acv_estimator — pick the low-fidelity subset that
/// minimizes the optimized variance.
///
/// Parameters
/// ----------
/// - `kind`: an ACV kind (MLMC, MFMC, ACVMF, ACVIS, ACVGMF, ACVGMFB).
/// - `cov`, `costs`: statistics of the full ensemble.
/// - `sampler`: input sample generator, shared by every candidate.
/// - `target_cost`: budget at which candidates are compared.
/// - `max_nmodels`: largest candidate size including the high-fidelity
///   model; `None` means all models.
/// - `options`: family options. A recursion index or initial guess sized
///   for the full ensemble is dropped for smaller candidates, and the
///   ACVGMFB depth is capped at the number of low-fidelity models.
///
/// Returns
/// -------
/// The winning estimator, its model indices and its allocation.
///
/// Errors
/// ------
/// - `UnsupportedEstimator` for Monte Carlo and MLBLUE.
/// - `TooFewModels` for fewer than two models or `max_nmodels < 2`.
/// - The first candidate error. Candidates are not skipped on failure, so a
///   subset that violates the MFMC ordering aborts the search.
pub fn get_best_models_for_acv_estimator(
    kind: EstimatorKind, cov: Array2<f64>, costs: Array1<f64>, sampler: Sampler, target_cost: f64,
    max_nmodels: Option<usize>, options: &EstimatorOptions,
) -> MfResult<BestModels> {
    if !kind.is_acv() {
        return Err(MfError::UnsupportedEstimator { name: kind.name().to_string() });
    }
    let full = ModelStats::new(cov, costs)?;
    let nmodels = full.nmodels();
    let max_nmodels = max_nmodels.unwrap_or(nmodels).min(nmodels);
    if nmodels < 2 || max_nmodels < 2 {
        return Err(MfError::TooFewModels { nmodels: max_nmodels.min(nmodels), required: 2 });
    }

    let mut best: Option<(f64, BestModels)> = None;
    for lf_subset in model_subsets(nmodels - 1).into_iter().filter(|s| s.len() < max_nmodels) {
        let nlf = lf_subset.len();
        let indices: Vec<usize> = std::iter::once(0).chain(lf_subset.into_iter().map(|i| i + 1)).collect();
        let subset_options = options_for_subset(options, indices.len());
        let estimator = build_estimator(kind, full.select(&indices)?, sampler.clone(), &subset_options)?;
        let allocation = estimator.allocate_samples(target_cost)?;
        let variance = allocation.variance();
        debug!("model subset {:?} ({} low-fidelity): variance = {:.6e}", indices, nlf, variance);
        if best.as_ref().map_or(true, |(v, _)| variance < *v) {
            best = Some((variance, BestModels { estimator, model_indices: indices, allocation }));
        }
    }
    match best {
        Some((variance, chosen)) => {
            info!("{} selected models {:?} with variance {:.6e}", kind.name(), chosen.model_indices, variance);
            Ok(chosen)
        }
        None => Err(MfError::TooFewModels { nmodels, required: 2 }),
    }
}

fn options_for_subset(options: &EstimatorOptions, nsubset: usize) -> EstimatorOptions {
    let mut out = options.clone();
    if out.recursion_index.as_ref().is_some_and(|rec| rec.nmodels() != nsubset) {
        out.recursion_index = None;
    }
    if out.initial_guess.as_ref().is_some_and(|g| g.len() + 1 != nsubset) {
        out.initial_guess = None;
    }
    out.tree_depth = out.tree_depth.map(|d| d.min(nsubset - 1));
    out
}

/// compare_estimator_variances — optimal allocation of every estimator at
/// every budget.
///
/// Returns one row per estimator, one allocation per target cost, in input
/// order.
///
/// # Errors
/// - The first allocation error encountered.
pub fn compare_estimator_variances(target_costs: &[f64], estimators: &[Estimator]) -> MfResult<Vec<Vec<Allocation>>> {
    estimators
        .iter()
        .map(|est| target_costs.iter().map(|&t| est.allocate_samples(t)).collect::<MfResult<Vec<_>>>())
        .collect()
}
