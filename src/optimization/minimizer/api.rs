//! Entry point of the minimizer: [`minimize`].
use crate::optimization::{
    errors::OptResult,
    minimizer::{
        OptimOutcome, Theta,
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{AllocationObjective, AllocationOptions, LineSearcher},
        validation::validate_theta,
    },
};

/// Minimize an [`AllocationObjective`] from `theta0` with L-BFGS.
///
/// The initial guess must be finite and must pass `f.check`; the line
/// search named in `opts` selects the solver.
///
/// # Errors
/// - `OptError::InvalidThetaInput` for a non-finite initial guess.
/// - Errors returned by `f.check`.
/// - Solver-construction and runtime errors from the builders and
///   [`run_lbfgs`].
pub fn minimize<F: AllocationObjective>(
    f: &F, theta0: Theta, data: &F::Data, opts: &AllocationOptions,
) -> OptResult<OptimOutcome> {
    validate_theta(&theta0)?;
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}
