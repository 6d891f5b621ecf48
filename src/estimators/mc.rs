//! estimators::mc — single-fidelity Monte Carlo.
//!
//! The baseline every multi-fidelity estimator is compared against: spend
//! the whole budget on `⌊T / c_0⌋` high-fidelity samples and report their
//! mean, with variance `C_00 / n`.
use crate::{
    data::{BootstrapSummary, bootstrap_monte_carlo_estimator},
    errors::{MfError, MfResult},
    estimators::allocation::AllocationResult,
    sampling::{ModelRef, SampleGenerator, Sampler, evaluate_first_qoi},
    stats::ModelStats,
    utils::mean_or_zero,
};
use ndarray::{Array1, ArrayView1};
use rand::Rng;

#[derive(Debug, Clone)]
pub struct MonteCarloEstimator {
    stats: ModelStats,
    sampler: Sampler,
}

impl MonteCarloEstimator {
    /// Only the high-fidelity entries of `stats` are used.
    pub fn new(stats: ModelStats, sampler: Sampler) -> Self {
        Self { stats, sampler }
    }

    pub fn stats(&self) -> &ModelStats {
        &self.stats
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// # Errors
    /// - `InvalidTargetCost` / `InfeasibleBudget` as in
    ///   [`AllocationResult::monte_carlo`].
    pub fn allocate_samples(&self, target_cost: f64) -> MfResult<AllocationResult> {
        AllocationResult::monte_carlo(self.stats.hf_variance(), self.stats.costs()[0], target_cost)
    }

    /// Variance `C_00 / ⌊T / c_0⌋`.
    pub fn get_variance(&self, target_cost: f64) -> MfResult<f64> {
        Ok(self.allocate_samples(target_cost)?.variance())
    }

    /// Evaluate the high-fidelity model on `alloc.nhf_samples()` fresh
    /// samples.
    pub fn generate_data<G: SampleGenerator + ?Sized>(
        &self, alloc: &AllocationResult, model: ModelRef<'_>, sampler: &mut G,
    ) -> MfResult<Array1<f64>> {
        let samples = sampler.generate(alloc.nhf_samples())?;
        evaluate_first_qoi(model, 0, &samples)
    }

    /// Sample mean of the high-fidelity values.
    ///
    /// # Errors
    /// - `ValueCountMismatch` for an empty value vector.
    pub fn estimate(&self, values: ArrayView1<f64>) -> MfResult<f64> {
        if values.is_empty() {
            return Err(MfError::ValueCountMismatch { model: 0, expected: 1, found: 0 });
        }
        Ok(mean_or_zero(values))
    }

    pub fn bootstrap<R: Rng + ?Sized>(
        &self, values: ArrayView1<f64>, nbootstraps: usize, rng: &mut R,
    ) -> MfResult<BootstrapSummary> {
        bootstrap_monte_carlo_estimator(values, nbootstraps, rng)
    }
}
