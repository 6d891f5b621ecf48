//! data — sample generation, estimation from raw values and resampling.
//!
//! Purpose
//! -------
//! Bridge an integer allocation and a model ensemble: draw the samples each
//! model is evaluated on, split the resulting values into the shared and
//! own sets an estimator combines, and quantify estimator spread by
//! bootstrapping or by repeated trials.
//!
//! Key behaviors
//! -------------
//! - [`generation`]: one sample block per allocation partition, values per
//!   model, ACV estimates and MLBLUE subset blocks.
//! - [`bootstrap`]: resampling estimates for MC, ACV and MLBLUE data.
//! - [`trials`]: repeated independent trials, in parallel with the
//!   `parallel` feature.

pub mod bootstrap;
pub mod generation;
pub mod trials;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::bootstrap::{
    BootstrapSummary, bootstrap_acv_estimator, bootstrap_mlblue_estimator, bootstrap_monte_carlo_estimator,
};
pub use self::generation::{
    SampleAllocation, SplitValues, estimate_acv, estimate_from_values_per_model, generate_blue_data, generate_data,
    generate_sample_allocations, partition_ids, separate_model_values,
};
pub use self::trials::{
    VarianceTrials, compute_single_fidelity_and_acv_estimates, counter_rng_seed, estimate_variance,
};
