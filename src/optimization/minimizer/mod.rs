//! optimization::minimizer — Argmin-backed L-BFGS minimizer.
//!
//! Purpose
//! -------
//! Minimize smooth objectives over an unconstrained parameter `θ`. Sample
//! allocation problems are mapped into this form by the reparameterizations
//! in `sample_allocation`, so the solver itself never sees budget or
//! positivity constraints.
//!
//! Key behaviors
//! -------------
//! - [`minimize`] validates the initial guess, builds an L-BFGS solver with
//!   the configured line search, runs it and returns an [`OptimOutcome`].
//! - Objectives without analytic gradients are finite-differenced in
//!   [`adapter`], central first with a forward fallback.
//!
//! Conventions
//! -----------
//! - The cost is minimized directly; there is no sign flip.
//! - Reaching `max_iter` counts as terminated; only `NotTerminated` is
//!   reported as unconverged. Callers decide whether that is acceptable.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover gradient handling ([`adapter`],
//!   [`finite_diff`]), solver wiring ([`builders`]), configuration and
//!   outcome invariants ([`traits`], [`validation`]) and end-to-end runs
//!   on toy bowls ([`api`]).

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::minimize;
pub use self::traits::{AllocationObjective, AllocationOptions, LineSearcher, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Theta};

pub mod prelude {
    pub use super::api::minimize;
    pub use super::traits::{AllocationObjective, AllocationOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
