//! Execution helper that runs an `argmin` solver on an allocation objective
//! and returns a crate-friendly [`OptimOutcome`].
use crate::optimization::{
    errors::OptResult,
    minimizer::{AllocationObjective, AllocationOptions, Grad, OptimOutcome, Theta, adapter::ArgMinAdapter},
};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient};
use argmin::core::{Executor, State};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;
#[cfg(feature = "obs_slog")]
use tracing::debug;

/// Run an `argmin` solver on an allocation objective.
///
/// Shared by both line-search variants. Wires the adapted problem, the
/// solver, the initial parameter `theta0`, the optional terminal observer
/// (behind `obs_slog`) and the optional iteration limit, then converts the
/// final state into an [`OptimOutcome`].
///
/// # Feature flags
/// With `obs_slog` enabled and `opts.verbose == true`, a slog observer is
/// attached with `ObserverMode::Always` and the starting objective is
/// logged at debug level.
///
/// # Errors
/// - Any `argmin` runtime error (line-search failure, objective error) via
///   `From<argmin::core::Error>`.
/// - Validation errors when building the [`OptimOutcome`].
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &AllocationOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: AllocationObjective,
    S: argmin::core::Solver<
            ArgMinAdapter<'a, F>,
            argmin::core::IterState<Theta, Grad, (), (), (), f64>,
        > + Send
        + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        log_initial_state(&theta0, &problem)?;
    }
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.take_gradient();
    OptimOutcome::new(
        result.take_best_param(),
        result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )
}

// ---- Helper Methods ----

#[cfg(feature = "obs_slog")]
fn log_initial_state<F>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) -> OptResult<()>
where
    F: AllocationObjective,
{
    let log10_variance = problem.cost(theta0)?;
    match problem.gradient(theta0) {
        Ok(g) => debug!("allocation start: log10 variance = {:.6}, |grad| = {:.3e}", log10_variance, g.l2_norm()),
        Err(_) => debug!("allocation start: log10 variance = {:.6}", log10_variance),
    }
    Ok(())
}
