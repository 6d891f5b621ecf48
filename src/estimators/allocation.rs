//! estimators::allocation — immutable results of sample allocation.
//!
//! Purpose
//! -------
//! Capture everything needed to generate data for, evaluate and report an
//! estimator once its sample counts are fixed:
//!
//! - [`AllocationResult`] for Monte Carlo and every ACV family;
//! - [`BlueAllocation`] for MLBLUE;
//! - [`Allocation`], the closed union returned by
//!   [`Estimator::allocate_samples`](crate::estimators::Estimator::allocate_samples).
//!
//! Key behaviors
//! -------------
//! - Results are built from integer counts only. The continuous ratios of
//!   the optimizer are kept for reporting.
//! - The variance stored is the variance at the integer counts.
//! - `nsamples_per_model(rounded_target_cost, costs, ratios)` reproduces the
//!   stored counts, so a result can be rebuilt from its ratios and cost.
use crate::{
    allocation::{AllocationMatrix, RecursionIndex, RoundedAllocation},
    errors::{MfError, MfResult},
    variance::VarianceModel,
};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Allocation of a Monte Carlo or ACV-type estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationResult {
    target_cost: f64,
    rounded_target_cost: f64,
    continuous_ratios: Option<Array1<f64>>,
    ratios: Array1<f64>,
    nsamples_per_model: Array1<usize>,
    npartition_samples: Array1<usize>,
    allocation_matrix: AllocationMatrix,
    weights: Array1<f64>,
    variance: f64,
    recursion_index: RecursionIndex,
}

impl AllocationResult {
    /// from_rounded — assemble the result of an ACV-type family.
    ///
    /// Parameters
    /// ----------
    /// - `model`: the family's variance model.
    /// - `cov`: model covariance.
    /// - `target_cost`: the requested budget.
    /// - `rounded`: integer counts with their ratios and cost.
    /// - `continuous_ratios`: optimizer ratios before rounding, if any.
    ///
    /// Errors
    /// ------
    /// - `NonPositivePartition` when the counts are not nested as the family
    ///   requires.
    /// - `SingularSystem` when the weights cannot be computed.
    pub fn from_rounded(
        model: &VarianceModel, cov: ArrayView2<f64>, target_cost: f64, rounded: RoundedAllocation,
        continuous_ratios: Option<Array1<f64>>,
    ) -> MfResult<Self> {
        let nsamples = rounded.nsamples.view();
        let partitions = model.partitions(nsamples)?;
        let allocation_matrix = model.allocation_matrix(nsamples);
        let (weights, _) = model.weights(cov, nsamples)?;
        let variance = model.variance(cov, nsamples)?;
        Ok(Self {
            target_cost,
            rounded_target_cost: rounded.cost,
            continuous_ratios,
            ratios: rounded.ratios,
            nsamples_per_model: to_counts(nsamples),
            npartition_samples: to_counts(partitions.view()),
            allocation_matrix,
            weights,
            variance,
            recursion_index: model.recursion_index(nsamples.len()),
        })
    }

    /// Single-model Monte Carlo with `⌊T / c_0⌋` samples.
    ///
    /// # Errors
    /// - `InvalidTargetCost` for non-finite or non-positive `T`.
    /// - `InfeasibleBudget` when `T < c_0`.
    pub fn monte_carlo(hf_variance: f64, hf_cost: f64, target_cost: f64) -> MfResult<Self> {
        if !target_cost.is_finite() || target_cost <= 0.0 {
            return Err(MfError::InvalidTargetCost { value: target_cost });
        }
        let nhf = (target_cost / hf_cost).floor();
        if nhf < 1.0 {
            return Err(MfError::InfeasibleBudget { target_cost, required_cost: hf_cost });
        }
        Ok(Self {
            target_cost,
            rounded_target_cost: hf_cost * nhf,
            continuous_ratios: None,
            ratios: Array1::zeros(0),
            nsamples_per_model: Array1::from_elem(1, nhf as usize),
            npartition_samples: Array1::from_elem(1, nhf as usize),
            allocation_matrix: AllocationMatrix::mlmc(1),
            weights: Array1::zeros(0),
            variance: hf_variance / nhf,
            recursion_index: RecursionIndex::zeros(1),
        })
    }

    pub fn nmodels(&self) -> usize {
        self.nsamples_per_model.len()
    }

    pub fn target_cost(&self) -> f64 {
        self.target_cost
    }

    /// Cost actually spent by the integer counts.
    pub fn rounded_target_cost(&self) -> f64 {
        self.rounded_target_cost
    }

    pub fn continuous_ratios(&self) -> Option<ArrayView1<'_, f64>> {
        self.continuous_ratios.as_ref().map(|r| r.view())
    }

    /// Ratios `n_i / n_0` of the integer counts.
    pub fn ratios(&self) -> ArrayView1<'_, f64> {
        self.ratios.view()
    }

    pub fn nsamples_per_model(&self) -> ArrayView1<'_, usize> {
        self.nsamples_per_model.view()
    }

    pub fn nhf_samples(&self) -> usize {
        self.nsamples_per_model[0]
    }

    pub fn npartition_samples(&self) -> ArrayView1<'_, usize> {
        self.npartition_samples.view()
    }

    /// Reordered allocation matrix matching the partition sizes.
    pub fn allocation_matrix(&self) -> &AllocationMatrix {
        &self.allocation_matrix
    }

    /// Control-variate weights `η` (length `M − 1`).
    pub fn weights(&self) -> ArrayView1<'_, f64> {
        self.weights.view()
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn recursion_index(&self) -> &RecursionIndex {
        &self.recursion_index
    }
}

/// Allocation of an MLBLUE estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct BlueAllocation {
    pub(crate) target_cost: f64,
    pub(crate) rounded_target_cost: f64,
    pub(crate) subsets: Vec<Vec<usize>>,
    pub(crate) fractions: Array1<f64>,
    pub(crate) nsamples_per_subset: Array1<usize>,
    pub(crate) unit_variance: f64,
    pub(crate) variance: f64,
}

impl BlueAllocation {
    pub fn target_cost(&self) -> f64 {
        self.target_cost
    }

    pub fn rounded_target_cost(&self) -> f64 {
        self.rounded_target_cost
    }

    pub fn subsets(&self) -> &[Vec<usize>] {
        &self.subsets
    }

    /// Optimized share of the budget per subset (sums to 1).
    pub fn fractions(&self) -> ArrayView1<'_, f64> {
        self.fractions.view()
    }

    pub fn nsamples_per_subset(&self) -> ArrayView1<'_, usize> {
        self.nsamples_per_subset.view()
    }

    /// BLUE variance of the continuous optimum for a unit budget.
    pub fn unit_variance(&self) -> f64 {
        self.unit_variance
    }

    /// BLUE variance at the integer counts.
    pub fn variance(&self) -> f64 {
        self.variance
    }
}

/// Result of [`Estimator::allocate_samples`](crate::estimators::Estimator::allocate_samples).
#[derive(Debug, Clone, PartialEq)]
pub enum Allocation {
    Acv(AllocationResult),
    Blue(BlueAllocation),
}

impl Allocation {
    pub fn variance(&self) -> f64 {
        match self {
            Allocation::Acv(a) => a.variance(),
            Allocation::Blue(b) => b.variance(),
        }
    }

    pub fn target_cost(&self) -> f64 {
        match self {
            Allocation::Acv(a) => a.target_cost(),
            Allocation::Blue(b) => b.target_cost(),
        }
    }

    pub fn rounded_target_cost(&self) -> f64 {
        match self {
            Allocation::Acv(a) => a.rounded_target_cost(),
            Allocation::Blue(b) => b.rounded_target_cost(),
        }
    }

    /// # Errors
    /// - `AllocationKindMismatch` for an MLBLUE allocation.
    pub fn as_acv(&self) -> MfResult<&AllocationResult> {
        match self {
            Allocation::Acv(a) => Ok(a),
            Allocation::Blue(_) => Err(MfError::AllocationKindMismatch { expected: "ACV" }),
        }
    }

    /// # Errors
    /// - `AllocationKindMismatch` for a Monte Carlo or ACV allocation.
    pub fn as_blue(&self) -> MfResult<&BlueAllocation> {
        match self {
            Allocation::Blue(b) => Ok(b),
            Allocation::Acv(_) => Err(MfError::AllocationKindMismatch { expected: "MLBLUE" }),
        }
    }
}

fn to_counts(values: ArrayView1<f64>) -> Array1<usize> {
    values.mapv(|v| v.round().max(0.0) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{nsamples_per_model, round_nsample_ratios};
    use crate::variance::acv_variance_with_weights;
    use ndarray::{Array2, array};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Monte Carlo allocation and its budget error.
    // - Assembly of an MLMC result and agreement of its variance with the
    //   generic weighted-variance formula.
    // - Reconstruction of counts from ratios and rounded cost.
    // - Kind accessors of `Allocation`.
    // -------------------------------------------------------------------------

    fn cov3() -> Array2<f64> {
        array![[1.0, 0.5, 0.25], [0.5, 1.0, 0.5], [0.25, 0.5, 4.0]]
    }

    #[test]
    // Purpose
    // -------
    // Monte Carlo spends ⌊T/c0⌋ samples.
    //
    // Given
    // -----
    // - C00 = 2, c0 = 3, T = 10; then T = 2.
    //
    // Expect
    // ------
    // - 3 samples, variance 2/3, cost 9; T = 2 is infeasible.
    fn monte_carlo_allocation() {
        let alloc = AllocationResult::monte_carlo(2.0, 3.0, 10.0).unwrap();
        assert_eq!(alloc.nhf_samples(), 3);
        assert!((alloc.variance() - 2.0 / 3.0).abs() < 1e-15);
        assert_eq!(alloc.rounded_target_cost(), 9.0);
        assert!(matches!(
            AllocationResult::monte_carlo(2.0, 3.0, 2.0),
            Err(MfError::InfeasibleBudget { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // An MLMC result built from integer counts reports the same variance as
    // the generic formula with weights −1, and its counts round-trip.
    //
    // Given
    // -----
    // - cov3, costs [6, 3, 1], T = 81, ratios [4, 9].
    //
    // Expect
    // ------
    // - Counts [3, 12, 27]; variance 1; round-trip exact.
    fn mlmc_result_matches_generic_variance_and_round_trips() {
        // Arrange
        let cov = cov3();
        let costs = array![6.0, 3.0, 1.0];
        let rounded = round_nsample_ratios(81.0, costs.view(), array![4.0, 9.0].view()).unwrap();

        // Act
        let alloc = AllocationResult::from_rounded(&VarianceModel::Mlmc, cov.view(), 81.0, rounded, None).unwrap();

        // Assert
        assert_eq!(alloc.nsamples_per_model(), array![3usize, 12, 27].view());
        assert!((alloc.variance() - 1.0).abs() < 1e-12);
        let partitions = alloc.npartition_samples().mapv(|v| v as f64);
        let generic = acv_variance_with_weights(cov.view(), alloc.allocation_matrix(), partitions.view(), alloc.weights());
        assert!((generic - alloc.variance()).abs() < 1e-12);
        let rebuilt = nsamples_per_model(alloc.rounded_target_cost(), costs.view(), alloc.ratios(), true);
        assert_eq!(rebuilt.mapv(|v| v as usize), alloc.nsamples_per_model().to_owned());
    }

    #[test]
    // Purpose
    // -------
    // Kind accessors refuse the wrong variant.
    //
    // Given
    // -----
    // - A Monte Carlo allocation.
    //
    // Expect
    // ------
    // - `as_acv` succeeds; `as_blue` fails with `AllocationKindMismatch`.
    fn allocation_kind_accessors() {
        let alloc = Allocation::Acv(AllocationResult::monte_carlo(1.0, 1.0, 5.0).unwrap());
        assert!(alloc.as_acv().is_ok());
        assert_eq!(alloc.as_blue().unwrap_err(), MfError::AllocationKindMismatch { expected: "MLBLUE" });
        assert_eq!(alloc.rounded_target_cost(), 5.0);
    }
}
