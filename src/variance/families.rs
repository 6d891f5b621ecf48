//! variance::families — per-family variance, weights and partition rules.
//!
//! Purpose
//! -------
//! Collect, for every ACV-type family, the pieces that turn a vector of
//! per-model sample counts into an estimator: the partition sizes, the
//! (reordered) allocation matrix, the control-variate weights and the
//! variance-reduction factor `r²`.
//!
//! Key behaviors
//! -------------
//! - MLMC and MFMC use their closed-form weights and `r²`.
//! - ACVMF and ACVIS use the closed-form discrepancy multipliers with the
//!   all-zeros recursion index.
//! - ACVGMF uses the generic inclusion/exclusion multipliers of the
//!   reordered allocation matrix for its recursion index.
//!
//! Conventions
//! -----------
//! - `nsamples` is `|z_i* ∪ z_i|` per model; continuous values are allowed
//!   during optimization, integer values after rounding.
//! - `variance = C00 (1 − r²) / n_0` for every family.
use crate::{
    allocation::{
        AllocationMatrix, RecursionIndex, npartition_samples_acvis, npartition_samples_acvmf,
        npartition_samples_mfmc, npartition_samples_mlmc, nsamples_per_model,
    },
    errors::MfResult,
    variance::{
        discrepancy::{discrepancy_covariances_generic, discrepancy_covariances_is, discrepancy_covariances_mf},
        weights::{
            acv_weights, mfmc_weights, mlmc_weights, rsquared, rsquared_mfmc, rsquared_mlmc,
            variance_from_rsquared,
        },
    },
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};

/// Variance model of one ACV-type family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarianceModel {
    Mlmc,
    Mfmc,
    Mf,
    Is,
    Gmf(RecursionIndex),
}

impl VarianceModel {
    /// Recursion index implied by the family for `nmodels` models.
    pub fn recursion_index(&self, nmodels: usize) -> RecursionIndex {
        match self {
            VarianceModel::Mlmc | VarianceModel::Mfmc => RecursionIndex::chain(nmodels),
            VarianceModel::Mf | VarianceModel::Is => RecursionIndex::zeros(nmodels),
            VarianceModel::Gmf(rec) => rec.clone(),
        }
    }

    /// Whether the family has a closed-form allocation.
    pub fn is_closed_form(&self) -> bool {
        matches!(self, VarianceModel::Mlmc | VarianceModel::Mfmc)
    }

    /// Partition sizes for `nsamples`.
    ///
    /// # Errors
    /// - `NonPositivePartition` when the counts are not nested as the
    ///   family requires.
    pub fn partitions(&self, nsamples: ArrayView1<f64>) -> MfResult<Array1<f64>> {
        match self {
            VarianceModel::Mlmc => npartition_samples_mlmc(nsamples),
            VarianceModel::Mfmc => npartition_samples_mfmc(nsamples),
            VarianceModel::Mf | VarianceModel::Gmf(_) => npartition_samples_acvmf(nsamples),
            VarianceModel::Is => npartition_samples_acvis(nsamples, &RecursionIndex::zeros(nsamples.len())),
        }
    }

    /// Allocation matrix matching [`partitions`](Self::partitions).
    ///
    /// MF-type families are reordered by the rank of each model's count so
    /// that `z_i` covers exactly the partitions below `n_i`.
    pub fn allocation_matrix(&self, nsamples: ArrayView1<f64>) -> AllocationMatrix {
        let nmodels = nsamples.len();
        match self {
            VarianceModel::Mlmc => AllocationMatrix::mlmc(nmodels),
            VarianceModel::Mfmc => AllocationMatrix::mfmc(nmodels),
            VarianceModel::Is => AllocationMatrix::acvis(&RecursionIndex::zeros(nmodels)),
            VarianceModel::Mf => {
                let rec = RecursionIndex::zeros(nmodels);
                AllocationMatrix::acvmf(&rec).reorder_acvgmf(nsamples, &rec)
            }
            VarianceModel::Gmf(rec) => AllocationMatrix::acvmf(rec).reorder_acvgmf(nsamples, rec),
        }
    }

    /// Control-variate weights (length `M − 1`) and the discrepancy vector
    /// `cf` for `nsamples`.
    ///
    /// # Errors
    /// - `SingularSystem` when `CF` is not positive definite.
    /// - `NonPositivePartition` from the generic path.
    pub fn weights(&self, cov: ArrayView2<f64>, nsamples: ArrayView1<f64>) -> MfResult<(Array1<f64>, Array1<f64>)> {
        let (cf_mat, cf_vec) = self.discrepancy_covariances(cov, nsamples)?;
        let weights = match self {
            VarianceModel::Mlmc => mlmc_weights(nsamples.len()),
            VarianceModel::Mfmc => mfmc_weights(cov),
            _ => acv_weights(cf_mat.view(), cf_vec.view())?,
        };
        Ok((weights, cf_vec))
    }

    /// N-scaled discrepancy covariances `(CF, cf)` for `nsamples`.
    pub fn discrepancy_covariances(
        &self, cov: ArrayView2<f64>, nsamples: ArrayView1<f64>,
    ) -> MfResult<(Array2<f64>, Array1<f64>)> {
        match self {
            VarianceModel::Mf => Ok(discrepancy_covariances_mf(cov, ratios_of(nsamples).view())),
            VarianceModel::Is => Ok(discrepancy_covariances_is(cov, ratios_of(nsamples).view())),
            _ => {
                let partitions = self.partitions(nsamples)?;
                let mat = self.allocation_matrix(nsamples);
                Ok(discrepancy_covariances_generic(cov, &mat, partitions.view()))
            }
        }
    }

    /// Variance-reduction factor `r²` at `nsamples`.
    pub fn rsquared(&self, cov: ArrayView2<f64>, nsamples: ArrayView1<f64>) -> MfResult<f64> {
        let ratios = ratios_of(nsamples);
        match self {
            VarianceModel::Mlmc => Ok(rsquared_mlmc(cov, ratios.view())),
            VarianceModel::Mfmc => Ok(rsquared_mfmc(cov, ratios.view())),
            _ => {
                let (weights, cf) = self.weights(cov, nsamples)?;
                Ok(rsquared(cf.view(), weights.view(), cov[[0, 0]]))
            }
        }
    }

    /// Estimator variance `C00 (1 − r²) / n_0` at `nsamples`.
    pub fn variance(&self, cov: ArrayView2<f64>, nsamples: ArrayView1<f64>) -> MfResult<f64> {
        let r2 = self.rsquared(cov, nsamples)?;
        Ok(variance_from_rsquared(cov[[0, 0]], r2, nsamples[0]))
    }

    /// Estimator variance for a target cost and continuous ratios.
    pub fn variance_at_ratios(
        &self, cov: ArrayView2<f64>, costs: ArrayView1<f64>, target_cost: f64, ratios: ArrayView1<f64>,
    ) -> MfResult<f64> {
        let nsamples = nsamples_per_model(target_cost, costs, ratios, false);
        self.variance(cov, nsamples.view())
    }
}

/// Ratios `n_i / n_0` of a count vector.
pub fn ratios_of(nsamples: ArrayView1<f64>) -> Array1<f64> {
    let nhf = nsamples[0];
    nsamples.slice(s![1..]).mapv(|n| n / nhf)
}
