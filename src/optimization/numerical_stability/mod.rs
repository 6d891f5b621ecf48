//! numerical_stability — guarded transforms and shared tolerances.
//!
//! Purpose
//! -------
//! Centralize the small numerical tolerances and the softmax machinery used
//! to reparameterize constrained allocation problems (budget splits, subset
//! fractions) as unconstrained ones.
//!
//! Key behaviors
//! -------------
//! - `safe_softmax` maps free logits onto the open simplex with a max-shift
//!   guard; `safe_softmax_deriv` pushes gradients back through it.
//! - `softmax_logits` maps simplex weights back to logits (used for initial
//!   guesses).
//! - `EIGEN_EPS` and `GENERAL_TOL` are the shared truncation and tie
//!   tolerances of the crate.
//!
//! Conventions
//! -----------
//! - Pure functions over `ndarray` views; no logging, no global state.
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] check mass conservation, the
//!   vector–Jacobian product against finite differences and the logit
//!   round trip.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{
    EIGEN_EPS, GENERAL_TOL, MIN_SIMPLEX_WEIGHT, safe_log10, safe_softmax, safe_softmax_deriv,
    softmax_logits,
};
