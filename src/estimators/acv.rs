//! estimators::acv — approximate control variate estimators.
//!
//! Purpose
//! -------
//! One estimator type, [`AcvEstimator`], covers every family whose estimate
//! has the form `Q_0(z_0) + Σ η_i (Q_i(z_i*) − Q_i(z_i))`. The family is
//! selected by [`AcvFamily`]:
//!
//! | family    | allocation                          | weights          |
//! |-----------|-------------------------------------|------------------|
//! | MLMC      | closed form                         | `−1`             |
//! | MFMC      | closed form                         | `−C_0i / C_ii`   |
//! | ACVMF     | L-BFGS, analytic gradient           | `−CF⁻¹ cf`       |
//! | ACVIS     | L-BFGS, analytic gradient           | `−CF⁻¹ cf`       |
//! | ACVGMF    | L-BFGS, finite differences          | `−CF⁻¹ cf`       |
//! | ACVGMFB   | ACVGMF over every tree up to a depth| `−CF⁻¹ cf`       |
//!
//! Key behaviors
//! -------------
//! - Continuous optima are rounded with
//!   [`round_nsample_ratios`]; numerical families then give every child at
//!   least one more sample than its parent.
//! - The reported variance is the variance at the integer counts.
//! - ACVGMFB scores each tree by that integer variance and keeps the first
//!   minimum; trees whose allocation fails are skipped.
//!
//! Invariants & assumptions
//! ------------------------
//! - At least two models; MFMC models pass the correlation/cost ordering
//!   check at construction.
//! - The estimator is immutable: every allocation is returned as a value.
use crate::{
    allocation::{
        RecursionIndex, RoundedAllocation, enforce_nested_counts, nsamples_per_model,
        recursion_indices, round_nsample_ratios,
    },
    data::{BootstrapSummary, bootstrap_acv_estimator, estimate_from_values_per_model, generate_data},
    errors::{MfError, MfResult},
    estimators::{allocation::AllocationResult, options::{EstimatorOptions, validate_ratios}},
    optimization::minimizer::AllocationOptions,
    sample_allocation::{allocate_samples_acv, allocate_samples_mfmc, allocate_samples_mlmc, search_best_candidate},
    sampling::{ModelRef, SampleGenerator, Sampler},
    stats::ModelStats,
    variance::{VarianceModel, check_mfmc_model_costs_and_correlations},
};
use ndarray::{Array1, ArrayView1};
use rand::Rng;
use tracing::info;

/// ACV family selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcvFamily {
    Mlmc,
    Mfmc,
    Acvmf,
    Acvis,
    Acvgmf(RecursionIndex),
    Acvgmfb { depth: Option<usize> },
}

impl AcvFamily {
    pub fn name(&self) -> &'static str {
        match self {
            AcvFamily::Mlmc => "mlmc",
            AcvFamily::Mfmc => "mfmc",
            AcvFamily::Acvmf => "acvmf",
            AcvFamily::Acvis => "acvis",
            AcvFamily::Acvgmf(_) => "acvgmf",
            AcvFamily::Acvgmfb { .. } => "acvgmfb",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcvEstimator {
    family: AcvFamily,
    stats: ModelStats,
    sampler: Sampler,
    allocation_options: AllocationOptions,
    initial_guess: Option<Array1<f64>>,
}

impl AcvEstimator {
    /// new — validate the family against the model statistics.
    ///
    /// Parameters
    /// ----------
    /// - `family`: estimator family.
    /// - `stats`: validated covariance and costs.
    /// - `sampler`: input sample generator.
    /// - `options`: solver options and the optional initial guess.
    ///
    /// Errors
    /// ------
    /// - `TooFewModels` for fewer than two models.
    /// - `UnacceptableMfmcModels` for MFMC with badly ordered models.
    /// - `DimensionMismatch` for a recursion index or initial guess of the
    ///   wrong length.
    pub fn new(family: AcvFamily, stats: ModelStats, sampler: Sampler, options: &EstimatorOptions) -> MfResult<Self> {
        let nmodels = stats.nmodels();
        if nmodels < 2 {
            return Err(MfError::TooFewModels { nmodels, required: 2 });
        }
        match &family {
            AcvFamily::Mfmc => check_mfmc_model_costs_and_correlations(stats.cov().view(), stats.costs().view())?,
            AcvFamily::Acvgmf(rec) if rec.nmodels() != nmodels => {
                return Err(MfError::DimensionMismatch {
                    what: "recursion index",
                    expected: nmodels - 1,
                    found: rec.as_slice().len(),
                });
            }
            _ => {}
        }
        if let Some(guess) = &options.initial_guess {
            if guess.len() != nmodels - 1 {
                return Err(MfError::DimensionMismatch {
                    what: "initial sample ratios",
                    expected: nmodels - 1,
                    found: guess.len(),
                });
            }
        }
        Ok(Self {
            family,
            stats,
            sampler,
            allocation_options: options.allocation.clone(),
            initial_guess: options.initial_guess.clone(),
        })
    }

    pub fn family(&self) -> &AcvFamily {
        &self.family
    }

    pub fn stats(&self) -> &ModelStats {
        &self.stats
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn nmodels(&self) -> usize {
        self.stats.nmodels()
    }

    /// Variance model used for fixed ratios. ACVGMFB has no tree until it
    /// allocates, so it uses the all-zeros tree.
    pub fn variance_model(&self) -> VarianceModel {
        match &self.family {
            AcvFamily::Mlmc => VarianceModel::Mlmc,
            AcvFamily::Mfmc => VarianceModel::Mfmc,
            AcvFamily::Acvmf => VarianceModel::Mf,
            AcvFamily::Acvis => VarianceModel::Is,
            AcvFamily::Acvgmf(rec) => VarianceModel::Gmf(rec.clone()),
            AcvFamily::Acvgmfb { .. } => VarianceModel::Gmf(RecursionIndex::zeros(self.nmodels())),
        }
    }

    /// allocate_samples — optimal integer allocation for budget `T`.
    ///
    /// Errors
    /// ------
    /// - `InvalidTargetCost` / `InfeasibleBudget` for unusable budgets.
    /// - `OptimizerConvergence` / `Optimizer(_)` from the solver.
    /// - `SingularSystem` when the weights cannot be computed.
    /// - For ACVGMFB, the first candidate error when every tree fails.
    pub fn allocate_samples(&self, target_cost: f64) -> MfResult<AllocationResult> {
        if !target_cost.is_finite() || target_cost <= 0.0 {
            return Err(MfError::InvalidTargetCost { value: target_cost });
        }
        match &self.family {
            AcvFamily::Acvgmfb { depth } => {
                let candidates = recursion_indices(self.nmodels(), *depth);
                let best = search_best_candidate(&candidates, |rec| {
                    let alloc = self.allocate_with_model(&VarianceModel::Gmf(rec.clone()), target_cost)?;
                    Ok((alloc.variance(), alloc))
                })?;
                info!(
                    "ACVGMFB selected recursion index {:?} out of {} candidates (variance = {:.6e})",
                    candidates[best.index].as_slice(),
                    candidates.len(),
                    best.variance
                );
                Ok(best.payload)
            }
            _ => self.allocate_with_model(&self.variance_model(), target_cost),
        }
    }

    fn allocate_with_model(&self, model: &VarianceModel, target_cost: f64) -> MfResult<AllocationResult> {
        let cov = self.stats.cov().view();
        let costs = self.stats.costs().view();
        let continuous = match model {
            VarianceModel::Mlmc => allocate_samples_mlmc(cov, costs, target_cost)?,
            VarianceModel::Mfmc => allocate_samples_mfmc(cov, costs, target_cost)?,
            _ => allocate_samples_acv(
                cov,
                costs,
                target_cost,
                model,
                &self.allocation_options,
                self.initial_guess.as_ref().map(|g| g.view()),
            )?,
        };
        let mut rounded = round_nsample_ratios(target_cost, costs, continuous.ratios.view())?;
        if !model.is_closed_form() {
            enforce_nested_counts(&mut rounded, costs, &model.recursion_index(self.nmodels()));
        }
        AllocationResult::from_rounded(model, cov, target_cost, rounded, Some(continuous.ratios))
    }

    /// Variance at continuous ratios `r` (length `M − 1`) for budget `T`.
    ///
    /// # Errors
    /// - `DimensionMismatch` / `InvalidRatio` for malformed ratios.
    /// - Variance-model errors.
    pub fn get_variance(&self, target_cost: f64, ratios: ArrayView1<f64>) -> MfResult<f64> {
        self.check_ratios(ratios)?;
        self.variance_model()
            .variance_at_ratios(self.stats.cov().view(), self.stats.costs().view(), target_cost, ratios)
    }

    /// allocation_from_ratios — integer allocation for user-fixed ratios.
    ///
    /// Counts are `nsamples_per_model(T, costs, r, round = true)`; the
    /// reported rounded cost is `T` itself, so the ratios and cost
    /// reproduce the counts.
    ///
    /// Errors
    /// ------
    /// - `DimensionMismatch` / `InvalidRatio` for malformed ratios.
    /// - `InfeasibleBudget` when no high-fidelity sample fits.
    /// - `NonPositivePartition` when the counts are not nested as the family
    ///   requires.
    pub fn allocation_from_ratios(&self, target_cost: f64, ratios: ArrayView1<f64>) -> MfResult<AllocationResult> {
        self.check_ratios(ratios)?;
        if !target_cost.is_finite() || target_cost <= 0.0 {
            return Err(MfError::InvalidTargetCost { value: target_cost });
        }
        let costs = self.stats.costs().view();
        let nsamples = nsamples_per_model(target_cost, costs, ratios, true);
        if nsamples[0] < 1.0 {
            let per_hf_sample: f64 = costs[0] + ratios.iter().zip(costs.iter().skip(1)).map(|(r, c)| r * c).sum::<f64>();
            return Err(MfError::InfeasibleBudget { target_cost, required_cost: per_hf_sample });
        }
        let rounded = RoundedAllocation { ratios: ratios.to_owned(), nsamples, cost: target_cost };
        AllocationResult::from_rounded(&self.variance_model(), self.stats.cov().view(), target_cost, rounded, None)
    }

    fn check_ratios(&self, ratios: ArrayView1<f64>) -> MfResult<()> {
        if ratios.len() != self.nmodels() - 1 {
            return Err(MfError::DimensionMismatch {
                what: "sample ratios",
                expected: self.nmodels() - 1,
                found: ratios.len(),
            });
        }
        validate_ratios(&ratios.to_owned())
    }

    /// Evaluate the models on the samples of `alloc`.
    pub fn generate_data<G: SampleGenerator + ?Sized>(
        &self, alloc: &AllocationResult, models: &[ModelRef<'_>], sampler: &mut G,
    ) -> MfResult<Vec<Array1<f64>>> {
        generate_data(alloc, models, sampler)
    }

    /// ACV estimate from raw per-model outputs.
    pub fn estimate(&self, alloc: &AllocationResult, values_per_model: &[Array1<f64>]) -> MfResult<f64> {
        estimate_from_values_per_model(alloc, values_per_model)
    }

    pub fn bootstrap<R: Rng + ?Sized>(
        &self, alloc: &AllocationResult, values_per_model: &[Array1<f64>], nbootstraps: usize, rng: &mut R,
    ) -> MfResult<BootstrapSummary> {
        bootstrap_acv_estimator(alloc, values_per_model, nbootstraps, rng)
    }
}
