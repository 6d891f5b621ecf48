//! Public surface of the minimizer.
//!
//! - [`AllocationObjective`]: trait objectives implement (value, check and
//!   an optional analytic gradient).
//! - [`AllocationOptions`] and [`Tolerances`]: solver configuration.
//! - [`LineSearcher`]: line search used inside L-BFGS.
//! - [`OptimOutcome`]: normalized result of [`minimize`](super::minimize).
//!
//! Convention: objectives are *minimized* directly; no sign flip happens
//! anywhere in the adapter.
use crate::optimization::{
    errors::{OptError, OptResult},
    minimizer::{
        Cost, FnEvalMap, Grad, Theta,
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};
use argmin::core::TerminationStatus;
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// Objective over an unconstrained allocation parameter `θ`.
///
/// - `type Data`: payload carried into `value`/`grad`/`check` (budget,
///   costs, covariance views, ...).
///
/// Required:
/// - `value(&Theta, &Data) -> OptResult<Cost>`: the cost to minimize.
///   Estimator errors raised inside are carried as `OptError::Estimator`.
/// - `check(&Theta, &Data) -> OptResult<()>`: validation of the initial
///   guess, called once before the solver starts.
///
/// Optional:
/// - `grad(&Theta, &Data) -> OptResult<Grad>`: analytic gradient of the
///   cost. When absent, finite differences of `value` are used.
pub trait AllocationObjective {
    type Data: 'static;

    // Required methods
    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    // Optional methods
    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Choice of line search used inside the L-BFGS solver.
///
/// Parsing is case-insensitive (`"MoreThuente"`, `"hagerzhang"`, ...);
/// unknown names return `OptError::InvalidLineSearch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Solver configuration for allocation problems.
///
/// Fields:
/// - `tols: Tolerances` — stopping rules.
/// - `line_searcher: LineSearcher` — line search used by L-BFGS.
/// - `verbose: bool` — attach a terminal observer (behind `obs_slog`).
/// - `lbfgs_mem: Option<usize>` — history size, default
///   [`DEFAULT_LBFGS_MEM`](super::DEFAULT_LBFGS_MEM).
///
/// Default:
/// - `tol_grad = 1e-7`, `tol_cost = 1e-12`, `max_iter = 500`
/// - `MoreThuente`, not verbose, default memory.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl AllocationOptions {
    /// Create validated options.
    ///
    /// # Errors
    /// - `OptError::InvalidLBFGSMem` when `lbfgs_mem == Some(0)`.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if let Some(m) = lbfgs_mem {
            if m == 0 {
                return Err(OptError::InvalidLBFGSMem {
                    mem: m,
                    reason: "L-BFGS memory must be greater than zero.",
                });
            }
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for AllocationOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances { tol_grad: Some(1e-7), tol_cost: Some(1e-12), max_iter: Some(500) },
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Numerical tolerances and iteration limits.
///
/// Any field can be `None` but at least one must be provided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == Some(0)`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if let Some(max_iter) = max_iter {
            if max_iter == 0 {
                return Err(OptError::InvalidMaxIter {
                    max_iter,
                    reason: "Maximum iterations must be greater than zero.",
                });
            }
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// Result returned by `minimize`.
///
/// - `theta_hat`: best parameter vector found.
/// - `value`: best cost.
/// - `converged`: `true` for any terminating status other than
///   `NotTerminated` (reaching `max_iter` counts as terminated).
/// - `status`: termination status as text.
/// - `iterations`, `fn_evals`: solver counters.
/// - `grad_norm`: norm of the last gradient, if available.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Build a validated outcome from raw solver state.
    ///
    /// # Errors
    /// - Propagates validation errors for `theta_hat` or `value`.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let (converged, status) = match termination {
            TerminationStatus::NotTerminated => (false, "Not terminated".to_string()),
            other => (true, format!("{other:?}")),
        };
        let grad_norm = grad.map(|g| g.l2_norm());
        Ok(Self { theta_hat, value, converged, status, iterations: iterations as usize, fn_evals, grad_norm })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argmin::core::TerminationReason;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Parsing of line-search names.
    // - Validation in `Tolerances::new` and `AllocationOptions::new`.
    // - Termination-status mapping in `OptimOutcome::new`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Line-search names parse case-insensitively.
    //
    // Given
    // -----
    // - "HAGERZHANG", "moreThuente", "bfgs".
    //
    // Expect
    // ------
    // - HagerZhang, MoreThuente, InvalidLineSearch.
    fn line_searcher_parses_case_insensitively() {
        assert_eq!("HAGERZHANG".parse::<LineSearcher>().unwrap(), LineSearcher::HagerZhang);
        assert_eq!("moreThuente".parse::<LineSearcher>().unwrap(), LineSearcher::MoreThuente);
        assert!(matches!("bfgs".parse::<LineSearcher>(), Err(OptError::InvalidLineSearch { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Configuration constructors reject empty or invalid settings.
    //
    // Given
    // -----
    // - No tolerances; max_iter = 0; lbfgs_mem = 0.
    //
    // Expect
    // ------
    // - NoTolerancesProvided, InvalidMaxIter, InvalidLBFGSMem.
    fn configuration_constructors_validate() {
        assert_eq!(Tolerances::new(None, None, None).unwrap_err(), OptError::NoTolerancesProvided);
        assert!(matches!(Tolerances::new(None, None, Some(0)), Err(OptError::InvalidMaxIter { .. })));
        let tols = Tolerances::new(Some(1e-6), None, None).unwrap();
        assert!(matches!(
            AllocationOptions::new(tols, LineSearcher::HagerZhang, false, Some(0)),
            Err(OptError::InvalidLBFGSMem { .. })
        ));
        let defaults = AllocationOptions::default();
        assert!(Tolerances::new(defaults.tols.tol_grad, defaults.tols.tol_cost, defaults.tols.max_iter).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Reaching the iteration limit still counts as terminated; only
    // `NotTerminated` is reported as unconverged.
    //
    // Given
    // -----
    // - MaxItersReached and NotTerminated statuses.
    //
    // Expect
    // ------
    // - converged = true and false respectively.
    fn outcome_maps_termination_status() {
        let done = OptimOutcome::new(
            Some(array![0.0]),
            1.0,
            TerminationStatus::Terminated(TerminationReason::MaxItersReached),
            10,
            FnEvalMap::new(),
            Some(array![3.0, 4.0]),
        )
        .unwrap();
        assert!(done.converged);
        assert_eq!(done.grad_norm, Some(5.0));
        let open = OptimOutcome::new(
            Some(array![0.0]),
            1.0,
            TerminationStatus::NotTerminated,
            0,
            FnEvalMap::new(),
            None,
        )
        .unwrap();
        assert!(!open.converged);
        assert_eq!(open.status, "Not terminated");
    }
}
