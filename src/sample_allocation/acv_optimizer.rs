//! sample_allocation::acv_optimizer — numerical allocation for ACVMF,
//! ACVIS and ACVGMF.
//!
//! Purpose
//! -------
//! Minimize `log10 Var` over the budget-exact reparameterization of
//! [`BudgetTree`] with L-BFGS and return the continuous optimum.
//!
//! Key behaviors
//! -------------
//! - The initial guess is the uniform split of the excess budget, or the
//!   caller's ratios mapped through [`BudgetTree::theta_from_ratios`].
//! - A run that stops with `NotTerminated` is reported as
//!   `OptimizerConvergence`; reaching the iteration limit is accepted and
//!   logged at `warn` level.
//! - A single-model problem needs no solver: all budget goes to model 0.
use crate::{
    errors::{MfError, MfResult},
    optimization::minimizer::{AllocationOptions, Theta, minimize},
    sample_allocation::{acv_objective::AcvObjective, transform::BudgetTree, types::ContinuousAllocation},
    variance::{VarianceModel, ratios_of},
};
use ndarray::{Array1, ArrayView1, ArrayView2};
use tracing::{debug, warn};

/// allocate_samples_acv — continuous optimum for a numerical ACV family.
///
/// Parameters
/// ----------
/// - `cov`, `costs`: validated model statistics.
/// - `target_cost`: budget `T`.
/// - `model`: [`VarianceModel::Mf`], [`VarianceModel::Is`] or
///   [`VarianceModel::Gmf`].
/// - `opts`: solver options.
/// - `initial_ratios`: optional starting ratios (length `M − 1`).
///
/// Errors
/// ------
/// - `InvalidOption` when called with a closed-form family.
/// - `InvalidTargetCost` / `InfeasibleBudget` from [`BudgetTree::new`].
/// - `DimensionMismatch` for an initial guess of the wrong length.
/// - `OptimizerConvergence` or `Optimizer(_)` when the solver fails.
/// - Estimator errors raised inside the objective, e.g. `SingularSystem`.
pub fn allocate_samples_acv(
    cov: ArrayView2<f64>, costs: ArrayView1<f64>, target_cost: f64, model: &VarianceModel,
    opts: &AllocationOptions, initial_ratios: Option<ArrayView1<f64>>,
) -> MfResult<ContinuousAllocation> {
    if model.is_closed_form() {
        return Err(MfError::InvalidOption {
            name: "variance model",
            reason: "MLMC and MFMC use their closed-form allocations.",
        });
    }
    let tree = BudgetTree::new(costs, model.recursion_index(costs.len()), target_cost)?;
    if tree.nparams() == 0 {
        let nsamples = Array1::from_elem(1, target_cost / costs[0]);
        let variance = model.variance(cov, nsamples.view())?;
        return Ok(ContinuousAllocation {
            ratios: Array1::zeros(0),
            nsamples,
            log10_variance: variance.log10(),
            iterations: 0,
        });
    }
    let theta0: Theta = match initial_ratios {
        Some(ratios) if ratios.len() != tree.nparams() => {
            return Err(MfError::DimensionMismatch {
                what: "initial sample ratios",
                expected: tree.nparams(),
                found: ratios.len(),
            });
        }
        Some(ratios) => tree.theta_from_ratios(ratios),
        None => Array1::zeros(tree.nparams()),
    };

    let objective = AcvObjective::new(cov.to_owned(), model.clone());
    let outcome = minimize(&objective, theta0, &tree, opts)?;
    if !outcome.converged {
        return Err(MfError::OptimizerConvergence { status: outcome.status });
    }
    if outcome.status.contains("MaxItersReached") {
        warn!("ACV allocation reached the iteration limit ({} iterations)", outcome.iterations);
    }
    let nsamples = tree.nsamples(&outcome.theta_hat);
    debug!(
        "{:?} allocation: nhf = {:.3}, log10 variance = {:.6}, status = {}",
        model, nsamples[0], outcome.value, outcome.status
    );
    Ok(ContinuousAllocation {
        ratios: ratios_of(nsamples.view()),
        nsamples,
        log10_variance: outcome.value,
        iterations: outcome.iterations,
    })
}
