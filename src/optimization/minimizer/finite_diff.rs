//! minimizer::finite_diff — finite-difference gradients with error capture.
//!
//! Purpose
//! -------
//! Objectives over recursion trees with general allocation matrices have
//! no analytic gradient. This module wraps `finitediff` so that errors
//! raised while evaluating the objective inside the difference stencil are
//! not lost: the closure records the first error in a `RefCell` and returns
//! `NaN`, and the helper turns that record back into an error.
//!
//! Invariants & assumptions
//! ------------------------
//! - Gradients returned from here always satisfy [`validate_grad`].
//! - Differences are taken in the unconstrained `θ` space.
use crate::optimization::{
    errors::OptResult,
    minimizer::{Grad, Theta, validation::validate_grad},
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Which stencil to use for a finite-difference gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stencil {
    Central,
    Forward,
}

/// run_fd_diff — finite-difference gradient with error capture and validation.
///
/// Parameters
/// ----------
/// - `theta`: point at which the gradient is approximated.
/// - `func`: scalar objective; must write any evaluation error into
///   `closure_err` and return `NaN`.
/// - `closure_err`: shared error slot, cleared on entry.
/// - `stencil`: central or forward differences.
///
/// Errors
/// ------
/// - The first error captured in `closure_err`, converted to `OptError`.
/// - `GradientDimMismatch` / `InvalidGradient` from [`validate_grad`].
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>, stencil: Stencil,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = match stencil {
        Stencil::Central => theta.central_diff(func),
        Stencil::Forward => theta.forward_diff(func),
    };
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}
