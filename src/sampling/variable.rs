//! sampling::variable — independent random variables built from `statrs`
//! marginals.
//!
//! Samples are produced by pushing unit-cube points (pseudo-random or
//! low-discrepancy) through each marginal's inverse CDF, so the same
//! variable serves every [`SamplingMethod`](crate::sampling::SamplingMethod).
use crate::errors::{MfError, MfResult};
use ndarray::Array2;
use statrs::distribution::{Beta, ContinuousCDF, Exp, Normal, Uniform};

/// Unit-cube coordinates are clamped to `[UNIT_CLAMP, 1 − UNIT_CLAMP]`
/// before inversion so unbounded marginals stay finite.
const UNIT_CLAMP: f64 = 1e-15;

/// One-dimensional marginal distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum Marginal {
    Uniform(Uniform),
    Normal(Normal),
    Exponential(Exp),
    /// Beta distribution on `[low, high]`.
    Beta { dist: Beta, low: f64, high: f64 },
}

impl Marginal {
    /// # Errors
    /// - `InvalidDistribution` when `low >= high` or a bound is not finite.
    pub fn uniform(low: f64, high: f64) -> MfResult<Self> {
        Uniform::new(low, high)
            .map(Marginal::Uniform)
            .map_err(|e| MfError::InvalidDistribution { reason: format!("uniform({low}, {high}): {e}") })
    }

    /// # Errors
    /// - `InvalidDistribution` for a non-finite mean or non-positive `std_dev`.
    pub fn normal(mean: f64, std_dev: f64) -> MfResult<Self> {
        Normal::new(mean, std_dev)
            .map(Marginal::Normal)
            .map_err(|e| MfError::InvalidDistribution { reason: format!("normal({mean}, {std_dev}): {e}") })
    }

    /// # Errors
    /// - `InvalidDistribution` for a non-positive rate.
    pub fn exponential(rate: f64) -> MfResult<Self> {
        Exp::new(rate)
            .map(Marginal::Exponential)
            .map_err(|e| MfError::InvalidDistribution { reason: format!("exponential({rate}): {e}") })
    }

    /// # Errors
    /// - `InvalidDistribution` for non-positive shapes or an empty interval.
    pub fn beta(alpha: f64, beta: f64, low: f64, high: f64) -> MfResult<Self> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(MfError::InvalidDistribution {
                reason: format!("beta support [{low}, {high}] must be a finite, non-empty interval"),
            });
        }
        Beta::new(alpha, beta)
            .map(|dist| Marginal::Beta { dist, low, high })
            .map_err(|e| MfError::InvalidDistribution { reason: format!("beta({alpha}, {beta}): {e}") })
    }

    /// Inverse CDF at `u ∈ (0, 1)`.
    pub fn ppf(&self, u: f64) -> f64 {
        let u = u.clamp(UNIT_CLAMP, 1.0 - UNIT_CLAMP);
        match self {
            Marginal::Uniform(d) => d.inverse_cdf(u),
            Marginal::Normal(d) => d.inverse_cdf(u),
            Marginal::Exponential(d) => d.inverse_cdf(u),
            Marginal::Beta { dist, low, high } => low + (high - low) * dist.inverse_cdf(u),
        }
    }
}

/// Vector of independent marginals.
#[derive(Debug, Clone, PartialEq)]
pub struct IndependentVariable {
    marginals: Vec<Marginal>,
}

impl IndependentVariable {
    /// # Errors
    /// - `InvalidDistribution` when no marginal is supplied.
    pub fn new(marginals: Vec<Marginal>) -> MfResult<Self> {
        if marginals.is_empty() {
            return Err(MfError::InvalidDistribution { reason: "at least one marginal is required".to_string() });
        }
        Ok(Self { marginals })
    }

    /// `nvars` independent `U(low, high)` marginals.
    pub fn uniform_box(nvars: usize, low: f64, high: f64) -> MfResult<Self> {
        Self::new(vec![Marginal::uniform(low, high)?; nvars])
    }

    pub fn nvars(&self) -> usize {
        self.marginals.len()
    }

    pub fn marginals(&self) -> &[Marginal] {
        &self.marginals
    }

    /// Map an `nvars × n` array of unit-cube points onto the variable, in
    /// place.
    pub fn transform_unit_samples(&self, unit: &mut Array2<f64>) {
        for (mut row, marginal) in unit.rows_mut().into_iter().zip(&self.marginals) {
            row.mapv_inplace(|u| marginal.ppf(u));
        }
    }
}
