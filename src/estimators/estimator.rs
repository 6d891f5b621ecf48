//! estimators::estimator — the closed estimator union.
//!
//! [`Estimator`] dispatches the shared operations (allocation, variance,
//! fixed-ratio allocation) to the Monte Carlo, ACV and MLBLUE
//! implementations by `match`. Family-specific operations such as data
//! generation are reached through [`Estimator::as_acv`],
//! [`Estimator::as_mc`] and [`Estimator::as_mlblue`].
use crate::{
    errors::{MfError, MfResult},
    estimators::{
        acv::{AcvEstimator, AcvFamily},
        allocation::Allocation,
        mc::MonteCarloEstimator,
        mlblue::MlblueEstimator,
    },
    sampling::Sampler,
    stats::ModelStats,
};
use ndarray::ArrayView1;
use std::str::FromStr;

/// Estimator family names accepted by
/// [`get_estimator`](crate::estimators::get_estimator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimatorKind {
    Mc,
    Mlmc,
    Mfmc,
    Acvmf,
    Acvis,
    Acvgmf,
    Acvgmfb,
    Mlblue,
}

impl EstimatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorKind::Mc => "mc",
            EstimatorKind::Mlmc => "mlmc",
            EstimatorKind::Mfmc => "mfmc",
            EstimatorKind::Acvmf => "acvmf",
            EstimatorKind::Acvis => "acvis",
            EstimatorKind::Acvgmf => "acvgmf",
            EstimatorKind::Acvgmfb => "acvgmfb",
            EstimatorKind::Mlblue => "mlblue",
        }
    }

    /// Whether the kind builds an [`AcvEstimator`].
    pub fn is_acv(&self) -> bool {
        !matches!(self, EstimatorKind::Mc | EstimatorKind::Mlblue)
    }
}

impl FromStr for EstimatorKind {
    type Err = MfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mc" => Ok(EstimatorKind::Mc),
            "mlmc" => Ok(EstimatorKind::Mlmc),
            "mfmc" => Ok(EstimatorKind::Mfmc),
            "acvmf" => Ok(EstimatorKind::Acvmf),
            "acvis" => Ok(EstimatorKind::Acvis),
            "acvgmf" => Ok(EstimatorKind::Acvgmf),
            "acvgmfb" => Ok(EstimatorKind::Acvgmfb),
            "mlblue" => Ok(EstimatorKind::Mlblue),
            _ => Err(MfError::UnsupportedEstimator { name: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Estimator {
    Mc(MonteCarloEstimator),
    Acv(AcvEstimator),
    Mlblue(MlblueEstimator),
}

impl Estimator {
    pub fn kind(&self) -> EstimatorKind {
        match self {
            Estimator::Mc(_) => EstimatorKind::Mc,
            Estimator::Mlblue(_) => EstimatorKind::Mlblue,
            Estimator::Acv(est) => match est.family() {
                AcvFamily::Mlmc => EstimatorKind::Mlmc,
                AcvFamily::Mfmc => EstimatorKind::Mfmc,
                AcvFamily::Acvmf => EstimatorKind::Acvmf,
                AcvFamily::Acvis => EstimatorKind::Acvis,
                AcvFamily::Acvgmf(_) => EstimatorKind::Acvgmf,
                AcvFamily::Acvgmfb { .. } => EstimatorKind::Acvgmfb,
            },
        }
    }

    pub fn stats(&self) -> &ModelStats {
        match self {
            Estimator::Mc(est) => est.stats(),
            Estimator::Acv(est) => est.stats(),
            Estimator::Mlblue(est) => est.stats(),
        }
    }

    pub fn sampler(&self) -> &Sampler {
        match self {
            Estimator::Mc(est) => est.sampler(),
            Estimator::Acv(est) => est.sampler(),
            Estimator::Mlblue(est) => est.sampler(),
        }
    }

    pub fn nmodels(&self) -> usize {
        self.stats().nmodels()
    }

    /// Optimal integer allocation for budget `T`.
    pub fn allocate_samples(&self, target_cost: f64) -> MfResult<Allocation> {
        Ok(match self {
            Estimator::Mc(est) => Allocation::Acv(est.allocate_samples(target_cost)?),
            Estimator::Acv(est) => Allocation::Acv(est.allocate_samples(target_cost)?),
            Estimator::Mlblue(est) => Allocation::Blue(est.allocate_samples(target_cost)?),
        })
    }

    /// get_variance — estimator variance for budget `T`.
    ///
    /// With `ratios = None` this is the variance of the optimal integer
    /// allocation. Otherwise the ratios are evaluated directly: sample
    /// ratios (`M − 1`) for ACV families, subset fractions for MLBLUE and
    /// an empty vector for Monte Carlo.
    pub fn get_variance(&self, target_cost: f64, ratios: Option<ArrayView1<f64>>) -> MfResult<f64> {
        match (self, ratios) {
            (_, None) => Ok(self.allocate_samples(target_cost)?.variance()),
            (Estimator::Mc(est), Some(r)) => {
                check_empty_ratios(r)?;
                est.get_variance(target_cost)
            }
            (Estimator::Acv(est), Some(r)) => est.get_variance(target_cost, r),
            (Estimator::Mlblue(est), Some(r)) => est.get_variance(target_cost, r),
        }
    }

    /// Integer allocation for user-fixed ratios (see [`Self::get_variance`]
    /// for their meaning per family).
    pub fn allocation_from_ratios(&self, target_cost: f64, ratios: ArrayView1<f64>) -> MfResult<Allocation> {
        Ok(match self {
            Estimator::Mc(est) => {
                check_empty_ratios(ratios)?;
                Allocation::Acv(est.allocate_samples(target_cost)?)
            }
            Estimator::Acv(est) => Allocation::Acv(est.allocation_from_ratios(target_cost, ratios)?),
            Estimator::Mlblue(est) => Allocation::Blue(est.allocation_from_fractions(target_cost, ratios)?),
        })
    }

    /// # Errors
    /// - `AllocationKindMismatch` for Monte Carlo and MLBLUE estimators.
    pub fn as_acv(&self) -> MfResult<&AcvEstimator> {
        match self {
            Estimator::Acv(est) => Ok(est),
            _ => Err(MfError::AllocationKindMismatch { expected: "ACV" }),
        }
    }

    /// # Errors
    /// - `AllocationKindMismatch` for other estimators.
    pub fn as_mc(&self) -> MfResult<&MonteCarloEstimator> {
        match self {
            Estimator::Mc(est) => Ok(est),
            _ => Err(MfError::AllocationKindMismatch { expected: "MC" }),
        }
    }

    /// # Errors
    /// - `AllocationKindMismatch` for other estimators.
    pub fn as_mlblue(&self) -> MfResult<&MlblueEstimator> {
        match self {
            Estimator::Mlblue(est) => Ok(est),
            _ => Err(MfError::AllocationKindMismatch { expected: "MLBLUE" }),
        }
    }
}

fn check_empty_ratios(ratios: ArrayView1<f64>) -> MfResult<()> {
    if !ratios.is_empty() {
        return Err(MfError::DimensionMismatch { what: "sample ratios", expected: 0, found: ratios.len() });
    }
    Ok(())
}
