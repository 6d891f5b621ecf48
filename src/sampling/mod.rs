//! sampling — random variables, sample generators and the model interface.
//!
//! Purpose
//! -------
//! Supply the two external collaborators of every estimator: a generator of
//! input samples and the models evaluated on them.
//!
//! Key behaviors
//! -------------
//! - [`variable`]: independent `statrs` marginals mapped from the unit cube
//!   by inverse CDF.
//! - [`sequences`]: Sobol (Joe–Kuo directions) and Halton sequences.
//! - [`sampler`]: [`Sampler`], implementing [`SampleGenerator`] for the
//!   `random`, `sobol` and `halton` methods.
//! - [`models`]: the [`Model`] trait, implemented for closures.
//!
//! Conventions
//! -----------
//! - Sample matrices are `nvars × n` (one column per sample); value
//!   matrices are `n × nqoi`.

pub mod models;
pub mod sampler;
pub mod sequences;
pub mod variable;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::models::{Model, ModelRef, evaluate_first_qoi};
pub use self::sampler::{SampleGenerator, Sampler, SamplingMethod};
pub use self::sequences::{HALTON_MAX_DIM, HaltonSequence, SOBOL_MAX_DIM, SobolSequence};
pub use self::variable::{IndependentVariable, Marginal};
