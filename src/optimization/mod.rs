//! optimization — L-BFGS minimizer, numerical helpers, and error surface.
//!
//! Purpose
//! -------
//! Provide the numerical optimization layer used by sample allocation:
//! an Argmin-backed minimizer over unconstrained parameters, stable
//! softmax/log helpers for reparameterizing budget constraints, and a
//! single error enum for solver and configuration failures.
//!
//! Key behaviors
//! -------------
//! - [`minimizer`]: minimize an [`AllocationObjective`](minimizer::AllocationObjective)
//!   with L-BFGS (More–Thuente or Hager–Zhang line search), using analytic
//!   gradients when available and finite differences otherwise.
//! - [`numerical_stability`]: overflow-safe softmax with its vector–Jacobian
//!   product, inverse logits and a clamped `log10`.
//! - [`errors`]: [`OptError`](errors::OptError) and `OptResult<T>`.
//!   Estimator errors raised inside objectives are boxed into
//!   `OptError::Estimator` and unwrapped again at the estimator boundary.
//!
//! Invariants & assumptions
//! ------------------------
//! - Optimizers operate in an unconstrained space `θ`; constraint handling
//!   lives entirely in the reparameterization.
//! - Invalid states are reported as `OptError`, never as panics.
//!
//! Conventions
//! -----------
//! - Objectives are minimized directly.
//! - This module does no logging of its own; the optional slog observer is
//!   attached only when the `obs_slog` feature is enabled and the caller
//!   asks for verbose output.
//!
//! Testing notes
//! -------------
//! - `minimizer`: solver wiring, tolerance handling and convergence on toy
//!   bowls.
//! - `numerical_stability`: mass conservation and Jacobian checks.
//! - `errors`: conversions from Argmin and estimator errors.

pub mod errors;
pub mod minimizer;
pub mod numerical_stability;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use rust_multifidelity::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::minimizer::prelude::*;
    pub use super::numerical_stability::{safe_log10, safe_softmax, safe_softmax_deriv};
}
