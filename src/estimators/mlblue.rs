//! estimators::mlblue — multilevel best linear unbiased estimator.
//!
//! Purpose
//! -------
//! Estimate `aᵀ μ` for a sketch vector `a` (default `e_0`) by drawing
//! independent samples for every non-empty model subset and solving the
//! BLUE system over all of them.
//!
//! Key behaviors
//! -------------
//! - Subsets are every non-empty subset of the models, ordered by size then
//!   lexicographically.
//! - The allocation optimizes budget fractions on the unit simplex, then
//!   floors `T x_k / cost(S_k)`; the reported variance is evaluated at the
//!   integer counts.
//! - Bootstraps resample rows within each subset block.
use crate::{
    allocation::model_subsets,
    data::{BootstrapSummary, bootstrap_mlblue_estimator, generate_blue_data},
    errors::{MfError, MfResult},
    estimators::{allocation::BlueAllocation, options::EstimatorOptions},
    optimization::minimizer::AllocationOptions,
    sample_allocation::{allocate_samples_mlblue, nsamples_per_subset, subset_costs},
    sampling::{ModelRef, SampleGenerator, Sampler},
    stats::ModelStats,
    variance::BlueSystem,
};
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MlblueEstimator {
    stats: ModelStats,
    sampler: Sampler,
    system: BlueSystem,
    sketch: Array1<f64>,
    subset_costs: Array1<f64>,
    allocation_options: AllocationOptions,
}

impl MlblueEstimator {
    /// new — build the BLUE system over all model subsets.
    ///
    /// Errors
    /// ------
    /// - `DimensionMismatch` for a sketch whose length is not `M`.
    /// - `SingularSystem` when a subset covariance is not positive definite.
    pub fn new(stats: ModelStats, sampler: Sampler, options: &EstimatorOptions) -> MfResult<Self> {
        let nmodels = stats.nmodels();
        let sketch = match &options.sketch {
            Some(sketch) if sketch.len() != nmodels => {
                return Err(MfError::DimensionMismatch { what: "sketch entries", expected: nmodels, found: sketch.len() });
            }
            Some(sketch) => sketch.clone(),
            None => {
                let mut e0 = Array1::zeros(nmodels);
                e0[0] = 1.0;
                e0
            }
        };
        let system = BlueSystem::new(stats.cov().view(), model_subsets(nmodels), options.blue_reg)?;
        let subset_costs = subset_costs(stats.costs().view(), system.subsets());
        Ok(Self { stats, sampler, system, sketch, subset_costs, allocation_options: options.allocation.clone() })
    }

    pub fn stats(&self) -> &ModelStats {
        &self.stats
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn system(&self) -> &BlueSystem {
        &self.system
    }

    pub fn sketch(&self) -> ArrayView1<'_, f64> {
        self.sketch.view()
    }

    pub fn subsets(&self) -> &[Vec<usize>] {
        self.system.subsets()
    }

    /// Cost of one sample of each subset.
    pub fn subset_costs(&self) -> ArrayView1<'_, f64> {
        self.subset_costs.view()
    }

    /// allocate_samples — optimal integer subset counts for budget `T`.
    ///
    /// Errors
    /// ------
    /// - `InvalidTargetCost` / `InfeasibleBudget` from the rounding.
    /// - `OptimizerConvergence` / `Optimizer(_)` from the solver.
    /// - `SingularSystem` when the integer allocation leaves `Psi` singular.
    pub fn allocate_samples(&self, target_cost: f64) -> MfResult<BlueAllocation> {
        let fractions = allocate_samples_mlblue(
            &self.system,
            self.sketch.view(),
            self.stats.costs().view(),
            &self.allocation_options,
        )?;
        self.allocation_from_fractions_with_unit(target_cost, fractions.fractions, fractions.unit_variance)
    }

    /// Allocation for user-fixed budget fractions (one per subset).
    ///
    /// # Errors
    /// - `DimensionMismatch` / `InvalidOption` for malformed fractions.
    /// - Rounding and singularity errors as in [`Self::allocate_samples`].
    pub fn allocation_from_fractions(&self, target_cost: f64, fractions: ArrayView1<f64>) -> MfResult<BlueAllocation> {
        self.check_fractions(fractions)?;
        let unit_variance = self.system.variance(self.sketch.view(), (&fractions / &self.subset_costs).view())?;
        self.allocation_from_fractions_with_unit(target_cost, fractions.to_owned(), unit_variance)
    }

    fn allocation_from_fractions_with_unit(
        &self, target_cost: f64, fractions: Array1<f64>, unit_variance: f64,
    ) -> MfResult<BlueAllocation> {
        let counts = nsamples_per_subset(fractions.view(), self.subset_costs.view(), target_cost)?;
        let variance = self.system.variance(self.sketch.view(), counts.view())?;
        let rounded_target_cost = counts.dot(&self.subset_costs);
        debug!(
            "MLBLUE integer allocation: counts = {:?}, cost = {:.6}, variance = {:.6e}",
            counts.to_vec(),
            rounded_target_cost,
            variance
        );
        Ok(BlueAllocation {
            target_cost,
            rounded_target_cost,
            subsets: self.system.subsets().to_vec(),
            fractions,
            nsamples_per_subset: counts.mapv(|n| n as usize),
            unit_variance,
            variance,
        })
    }

    /// Continuous variance `aᵀ Psi(T x / cost)⁻¹ a` for budget fractions `x`.
    pub fn get_variance(&self, target_cost: f64, fractions: ArrayView1<f64>) -> MfResult<f64> {
        self.check_fractions(fractions)?;
        if !target_cost.is_finite() || target_cost <= 0.0 {
            return Err(MfError::InvalidTargetCost { value: target_cost });
        }
        let weights = fractions.mapv(|x| x * target_cost) / &self.subset_costs;
        self.system.variance(self.sketch.view(), weights.view())
    }

    fn check_fractions(&self, fractions: ArrayView1<f64>) -> MfResult<()> {
        if fractions.len() != self.subset_costs.len() {
            return Err(MfError::DimensionMismatch {
                what: "subset fractions",
                expected: self.subset_costs.len(),
                found: fractions.len(),
            });
        }
        if fractions.iter().any(|x| !x.is_finite() || *x < 0.0) || fractions.sum() <= 0.0 {
            return Err(MfError::InvalidOption {
                name: "fractions",
                reason: "Fractions must be finite, non-negative and not all zero.",
            });
        }
        Ok(())
    }

    /// One `n_k × |S_k|` value block per subset.
    pub fn generate_data<G: SampleGenerator + ?Sized>(
        &self, alloc: &BlueAllocation, models: &[ModelRef<'_>], sampler: &mut G,
    ) -> MfResult<Vec<Array2<f64>>> {
        generate_blue_data(alloc.subsets(), alloc.nsamples_per_subset(), models, sampler)
    }

    /// BLUE estimate of `aᵀ μ`.
    pub fn estimate(&self, values_per_subset: &[Array2<f64>]) -> MfResult<f64> {
        self.system.estimate(self.sketch.view(), values_per_subset)
    }

    pub fn bootstrap<R: Rng + ?Sized>(
        &self, values_per_subset: &[Array2<f64>], nbootstraps: usize, rng: &mut R,
    ) -> MfResult<BootstrapSummary> {
        bootstrap_mlblue_estimator(&self.system, self.sketch.view(), values_per_subset, nbootstraps, rng)
    }
}
