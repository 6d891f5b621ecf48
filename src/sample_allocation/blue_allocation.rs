//! sample_allocation::blue_allocation — MLBLUE subset allocation.
//!
//! Purpose
//! -------
//! Choose the share `x_k` of a unit budget spent on each model subset `S_k`
//! so that the BLUE variance `aᵀ Psi(m)⁻¹ a`, with `m_k = x_k / cost(S_k)`,
//! is minimal. The problem is convex in `m`; it is solved over the simplex
//! through the softmax reparameterization `x = softmax([0, θ])`, so the
//! budget equality and the non-negativity bounds hold for every `θ`.
//!
//! Key behaviors
//! -------------
//! - [`allocate_samples_mlblue`] starts from the uniform split and returns
//!   the unit-budget optimum as [`SubsetFractions`].
//! - [`nsamples_per_subset`] scales fractions to a target cost and floors
//!   them to integer counts `⌊T x_k / cost(S_k)⌋`.
//! - Reaching the iteration limit is accepted (the optimum often sits on the
//!   simplex boundary, where logits drift slowly) and logged at `warn`.
use crate::{
    errors::{MfError, MfResult},
    optimization::{
        errors::{OptError, OptResult},
        minimizer::{AllocationObjective, AllocationOptions, Cost, Grad, Theta, minimize},
        numerical_stability::{safe_log10, safe_softmax, safe_softmax_deriv},
    },
    sample_allocation::types::SubsetFractions,
    utils::floor_count,
    variance::BlueSystem,
};
use ndarray::{Array1, ArrayView1};
use std::f64::consts::LN_10;
use tracing::{debug, warn};

/// Objective `θ ↦ log10 aᵀ Psi(x(θ) / cost)⁻¹ a`.
#[derive(Debug, Clone)]
pub struct BlueObjective {
    system: BlueSystem,
    sketch: Array1<f64>,
    subset_costs: Array1<f64>,
}

impl BlueObjective {
    pub fn new(system: BlueSystem, sketch: Array1<f64>, subset_costs: Array1<f64>) -> Self {
        Self { system, sketch, subset_costs }
    }

    fn subset_weights(&self, fractions: ArrayView1<f64>) -> Array1<f64> {
        &fractions / &self.subset_costs
    }
}

impl AllocationObjective for BlueObjective {
    type Data = ();

    fn value(&self, theta: &Theta, _data: &()) -> OptResult<Cost> {
        let fractions = safe_softmax(theta.view());
        let weights = self.subset_weights(fractions.view());
        let variance = self.system.variance(self.sketch.view(), weights.view())?;
        Ok(safe_log10(variance))
    }

    fn check(&self, theta: &Theta, _data: &()) -> OptResult<()> {
        let expected = self.subset_costs.len() - 1;
        if theta.len() != expected {
            return Err(OptError::ThetaLengthMismatch { expected, actual: theta.len() });
        }
        Ok(())
    }

    /// `∂L/∂x_k = (∂V/∂m_k) / (cost_k V ln 10)`, pulled back through the
    /// softmax.
    fn grad(&self, theta: &Theta, _data: &()) -> OptResult<Grad> {
        let fractions = safe_softmax(theta.view());
        let weights = self.subset_weights(fractions.view());
        let (variance, dvar) = self.system.variance_and_gradient(self.sketch.view(), weights.view())?;
        let upstream = Array1::from_shape_fn(dvar.len(), |k| dvar[k] / (self.subset_costs[k] * variance * LN_10));
        Ok(safe_softmax_deriv(fractions.view(), upstream.view()))
    }
}

/// Cost of one sample of every model in each subset.
pub fn subset_costs(costs: ArrayView1<f64>, subsets: &[Vec<usize>]) -> Array1<f64> {
    Array1::from_iter(subsets.iter().map(|subset| subset.iter().map(|&i| costs[i]).sum::<f64>()))
}

/// allocate_samples_mlblue — unit-budget subset fractions.
///
/// Parameters
/// ----------
/// - `system`: the BLUE system over the candidate subsets.
/// - `sketch`: the vector `a` whose mean `aᵀμ` is estimated.
/// - `costs`: per-model costs, length `M`.
/// - `opts`: solver options.
///
/// Returns
/// -------
/// [`SubsetFractions`] with `Σ x_k = 1` and the unit-budget variance.
///
/// Errors
/// ------
/// - `DimensionMismatch` when `sketch` or `costs` disagree with the system.
/// - `SingularSystem` when `Psi` cannot be factorized at the start point.
/// - `OptimizerConvergence` / `Optimizer(_)` from the solver.
pub fn allocate_samples_mlblue(
    system: &BlueSystem, sketch: ArrayView1<f64>, costs: ArrayView1<f64>, opts: &AllocationOptions,
) -> MfResult<SubsetFractions> {
    for (what, found) in [("sketch entries", sketch.len()), ("costs", costs.len())] {
        if found != system.nmodels() {
            return Err(MfError::DimensionMismatch { what, expected: system.nmodels(), found });
        }
    }
    let costs_per_subset = subset_costs(costs, system.subsets());
    let nsubsets = costs_per_subset.len();
    if nsubsets == 1 {
        let fractions = Array1::ones(1);
        let unit_variance = system.variance(sketch, (&fractions / &costs_per_subset).view())?;
        return Ok(SubsetFractions { fractions, unit_variance, iterations: 0 });
    }

    let objective = BlueObjective::new(system.clone(), sketch.to_owned(), costs_per_subset);
    let outcome = minimize(&objective, Array1::zeros(nsubsets - 1), &(), opts)?;
    if !outcome.converged {
        return Err(MfError::OptimizerConvergence { status: outcome.status });
    }
    if outcome.status.contains("MaxItersReached") {
        warn!("MLBLUE allocation reached the iteration limit ({} iterations)", outcome.iterations);
    }
    let fractions = safe_softmax(outcome.theta_hat.view());
    let unit_variance = 10f64.powf(outcome.value);
    debug!(
        "MLBLUE allocation: unit variance = {:.6e}, iterations = {}",
        unit_variance, outcome.iterations
    );
    Ok(SubsetFractions { fractions, unit_variance, iterations: outcome.iterations })
}

/// nsamples_per_subset — integer counts `⌊T x_k / cost_k⌋`.
///
/// # Errors
/// - `InvalidTargetCost` for non-finite or non-positive `T`.
/// - `InfeasibleBudget` when every subset rounds to zero samples.
pub fn nsamples_per_subset(
    fractions: ArrayView1<f64>, subset_costs: ArrayView1<f64>, target_cost: f64,
) -> MfResult<Array1<f64>> {
    if !target_cost.is_finite() || target_cost <= 0.0 {
        return Err(MfError::InvalidTargetCost { value: target_cost });
    }
    let counts = Array1::from_shape_fn(fractions.len(), |k| {
        floor_count(target_cost * fractions[k].max(0.0) / subset_costs[k])
    });
    if counts.iter().all(|&n| n < 1.0) {
        let cheapest = subset_costs.iter().copied().fold(f64::INFINITY, f64::min);
        return Err(MfError::InfeasibleBudget { target_cost, required_cost: cheapest });
    }
    Ok(counts)
}
