//! sample_allocation::acv_objective — log-variance objective of the ACV
//! families over the budget tree.
//!
//! Purpose
//! -------
//! Evaluate `log10 Var(θ)` where `Var = C00 (1 − r²(N)) / N_0` and
//! `N = N(θ)` comes from a [`BudgetTree`]. The objective is handed to the
//! generic L-BFGS minimizer.
//!
//! Key behaviors
//! -------------
//! - ACVMF and ACVIS provide an analytic gradient through the multiplier
//!   derivatives: with `η = −CF⁻¹ cf`,
//!   `∂r²/∂r_k = (−2 η·∂cf/∂r_k − ηᵀ (∂CF/∂r_k) η) / C00`.
//! - ACVGMF has no closed-form multipliers and falls back to finite
//!   differences in the minimizer adapter.
//! - Estimator errors raised while evaluating (singular `CF`, negative
//!   partitions) travel through `OptError::Estimator`.
use crate::{
    errors::MfResult,
    optimization::{
        errors::{OptError, OptResult},
        minimizer::{AllocationObjective, Cost, Grad, Theta},
        numerical_stability::safe_log10,
    },
    sample_allocation::transform::BudgetTree,
    variance::{
        VarianceModel, acv_weights, ratios_of, rsquared,
        discrepancy::{Multipliers, dfactors_is, dfactors_mf, multipliers_is, multipliers_mf, pool_discrepancy_covariances},
    },
};
use ndarray::{Array1, Array2, ArrayView1, s};
use std::f64::consts::LN_10;

/// Objective `θ ↦ log10 Var(N(θ))` for one ACV family.
#[derive(Debug, Clone)]
pub struct AcvObjective {
    cov: Array2<f64>,
    model: VarianceModel,
}

impl AcvObjective {
    pub fn new(cov: Array2<f64>, model: VarianceModel) -> Self {
        Self { cov, model }
    }

    /// Closed-form multipliers and their derivatives, when the family has
    /// them.
    fn multipliers_with_derivatives(&self, ratios: ArrayView1<f64>) -> Option<(Multipliers, Vec<Array2<f64>>)> {
        match self.model {
            VarianceModel::Mf => Some((multipliers_mf(ratios), dfactors_mf(ratios))),
            VarianceModel::Is => Some((multipliers_is(ratios), dfactors_is(ratios))),
            _ => None,
        }
    }

    /// `r²` and `∂r²/∂r` from closed-form multipliers.
    fn rsquared_and_gradient(
        &self, factors: &Multipliers, dfactors: &[Array2<f64>],
    ) -> MfResult<(f64, Array1<f64>)> {
        let cov00 = self.cov[[0, 0]];
        let lf = self.cov.slice(s![1.., 1..]);
        let c0 = self.cov.slice(s![0, 1..]);
        let (cf_mat, cf_vec) = pool_discrepancy_covariances(self.cov.view(), factors);
        let eta = acv_weights(cf_mat.view(), cf_vec.view())?;
        let r2 = rsquared(cf_vec.view(), eta.view(), cov00);
        let grad = Array1::from_iter(dfactors.iter().map(|dfac| {
            let dcf_mat = dfac * &lf;
            let dcf_vec = &dfac.diag() * &c0;
            (-2.0 * eta.dot(&dcf_vec) - eta.dot(&dcf_mat.dot(&eta))) / cov00
        }));
        Ok((r2, grad))
    }
}

impl AllocationObjective for AcvObjective {
    type Data = BudgetTree;

    fn value(&self, theta: &Theta, tree: &BudgetTree) -> OptResult<Cost> {
        let nsamples = tree.nsamples(theta);
        let variance = self.model.variance(self.cov.view(), nsamples.view())?;
        Ok(safe_log10(variance))
    }

    fn check(&self, theta: &Theta, tree: &BudgetTree) -> OptResult<()> {
        if theta.len() != tree.nparams() {
            return Err(OptError::ThetaLengthMismatch { expected: tree.nparams(), actual: theta.len() });
        }
        Ok(())
    }

    /// Analytic gradient for ACVMF and ACVIS.
    ///
    /// With `L = log10 C00 + log10(1 − r²) − log10 N_0` and `r_k = N_k / N_0`:
    ///
    /// - `∂L/∂r_k = −(∂r²/∂r_k) / ((1 − r²) ln 10)`
    /// - `∂L/∂N_k = (∂L/∂r_k) / N_0` for `k ≥ 1`
    /// - `∂L/∂N_0 = −1/(N_0 ln 10) − Σ_k (∂L/∂r_k) N_k / N_0²`
    fn grad(&self, theta: &Theta, tree: &BudgetTree) -> OptResult<Grad> {
        let nsamples = tree.nsamples(theta);
        let ratios = ratios_of(nsamples.view());
        let Some((factors, dfactors)) = self.multipliers_with_derivatives(ratios.view()) else {
            return Err(OptError::GradientNotImplemented);
        };
        let (r2, dr2) = self.rsquared_and_gradient(&factors, &dfactors)?;
        let nhf = nsamples[0];
        let dl_dr = dr2.mapv(|d| -d / ((1.0 - r2) * LN_10));
        let mut upstream = Array1::<f64>::zeros(nsamples.len());
        upstream[0] = -1.0 / (nhf * LN_10);
        for (k, &d) in dl_dr.iter().enumerate() {
            upstream[k + 1] = d / nhf;
            upstream[0] -= d * nsamples[k + 1] / (nhf * nhf);
        }
        Ok(tree.nsamples_vjp(theta, upstream.view()))
    }
}
