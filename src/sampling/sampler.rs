//! sampling::sampler — the concrete sample generator used by estimators.
//!
//! A [`Sampler`] owns its random state, so every variance trial clones a
//! sampler and reseeds it; no generator is shared between threads.
use crate::{
    errors::{MfError, MfResult},
    sampling::{
        sequences::{HaltonSequence, SobolSequence},
        variable::IndependentVariable,
    },
};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::str::FromStr;

/// Source of `nvars × n` sample matrices.
pub trait SampleGenerator {
    fn nvars(&self) -> usize;

    /// Draw `nsamples` new samples (columns).
    fn generate(&mut self, nsamples: usize) -> MfResult<Array2<f64>>;
}

/// How unit-cube points are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMethod {
    Random,
    Sobol,
    Halton,
}

impl FromStr for SamplingMethod {
    type Err = MfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(SamplingMethod::Random),
            "sobol" => Ok(SamplingMethod::Sobol),
            "halton" => Ok(SamplingMethod::Halton),
            _ => Err(MfError::UnsupportedSamplingMethod { name: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone)]
enum UnitSource {
    Random(Xoshiro256PlusPlus),
    Sobol(SobolSequence),
    Halton(HaltonSequence),
}

/// Sampler for an [`IndependentVariable`].
#[derive(Debug, Clone)]
pub struct Sampler {
    variable: IndependentVariable,
    method: SamplingMethod,
    source: UnitSource,
}

impl Sampler {
    /// # Errors
    /// - `TooManyDimensions` when a sequence cannot cover `variable.nvars()`.
    pub fn new(variable: IndependentVariable, method: SamplingMethod, seed: u64) -> MfResult<Self> {
        let source = Self::make_source(method, variable.nvars(), seed)?;
        Ok(Self { variable, method, source })
    }

    /// Pseudo-random sampler.
    pub fn random(variable: IndependentVariable, seed: u64) -> Self {
        Self {
            variable,
            method: SamplingMethod::Random,
            source: UnitSource::Random(Xoshiro256PlusPlus::seed_from_u64(seed)),
        }
    }

    pub fn method(&self) -> SamplingMethod {
        self.method
    }

    pub fn variable(&self) -> &IndependentVariable {
        &self.variable
    }

    /// Copy of this sampler with fresh state: a reseeded generator, or a
    /// sequence restarted at index 1.
    pub fn reseeded(&self, seed: u64) -> Self {
        let mut out = self.clone();
        match &mut out.source {
            UnitSource::Random(rng) => *rng = Xoshiro256PlusPlus::seed_from_u64(seed),
            UnitSource::Sobol(seq) => seq.restart(),
            UnitSource::Halton(seq) => seq.restart(),
        }
        out
    }

    fn make_source(method: SamplingMethod, nvars: usize, seed: u64) -> MfResult<UnitSource> {
        Ok(match method {
            SamplingMethod::Random => UnitSource::Random(Xoshiro256PlusPlus::seed_from_u64(seed)),
            SamplingMethod::Sobol => UnitSource::Sobol(SobolSequence::new(nvars)?),
            SamplingMethod::Halton => UnitSource::Halton(HaltonSequence::new(nvars)?),
        })
    }
}

impl SampleGenerator for Sampler {
    fn nvars(&self) -> usize {
        self.variable.nvars()
    }

    fn generate(&mut self, nsamples: usize) -> MfResult<Array2<f64>> {
        let nvars = self.variable.nvars();
        let mut unit = match &mut self.source {
            UnitSource::Random(rng) => Array2::from_shape_simple_fn((nvars, nsamples), || rng.gen::<f64>()),
            UnitSource::Sobol(seq) => seq.generate(nsamples),
            UnitSource::Halton(seq) => seq.generate(nsamples),
        };
        self.variable.transform_unit_samples(&mut unit);
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::variable::Marginal;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Case-insensitive method parsing.
    // - Shapes, determinism under a seed and support of generated samples.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Method names parse regardless of case; unknown names fail.
    //
    // Given
    // -----
    // - "Sobol", "HALTON", "random", "lhs".
    //
    // Expect
    // ------
    // - Three methods and `UnsupportedSamplingMethod`.
    fn sampling_method_parses_case_insensitively() {
        assert_eq!("Sobol".parse::<SamplingMethod>().unwrap(), SamplingMethod::Sobol);
        assert_eq!("HALTON".parse::<SamplingMethod>().unwrap(), SamplingMethod::Halton);
        assert_eq!("random".parse::<SamplingMethod>().unwrap(), SamplingMethod::Random);
        assert!(matches!("lhs".parse::<SamplingMethod>(), Err(MfError::UnsupportedSamplingMethod { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Reseeding reproduces a stream; samples lie in the support.
    //
    // Given
    // -----
    // - U(2, 3) in three dimensions, every method.
    //
    // Expect
    // ------
    // - Shape 3 × 8, values in [2, 3], identical draws after `reseeded(7)`.
    fn generate_is_reproducible_and_in_support() {
        let variable = IndependentVariable::uniform_box(3, 2.0, 3.0).unwrap();
        for method in [SamplingMethod::Random, SamplingMethod::Sobol, SamplingMethod::Halton] {
            let sampler = Sampler::new(variable.clone(), method, 7).unwrap();
            let a = sampler.reseeded(7).generate(8).unwrap();
            let b = sampler.reseeded(7).generate(8).unwrap();
            assert_eq!(a.dim(), (3, 8));
            assert_eq!(a, b);
            assert!(a.iter().all(|&v| (2.0..=3.0).contains(&v)));
        }
        let normal = IndependentVariable::new(vec![Marginal::normal(0.0, 1.0).unwrap()]).unwrap();
        let draws = Sampler::random(normal, 1).generate(4000).unwrap();
        let mean = draws.sum() / 4000.0;
        assert!(mean.abs() < 0.1);
    }
}
