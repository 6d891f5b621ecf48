//! sampling::sequences — Sobol and Halton low-discrepancy sequences.
//!
//! Both generators produce points in the open unit cube `(0, 1)^d` and skip
//! the origin: the first point returned is sequence index 1.
//!
//! - Sobol uses the Gray-code construction with 32-bit direction numbers.
//!   Dimension 0 is the base-2 van der Corput sequence; dimensions 1–15 use
//!   the Joe–Kuo (2008) primitive polynomials and initial direction numbers.
//! - Halton uses the radical inverse in the first `d` primes.
use crate::errors::{MfError, MfResult};
use ndarray::Array2;

/// Largest dimension supported by [`SobolSequence`].
pub const SOBOL_MAX_DIM: usize = 16;

const BITS: usize = 32;

/// Joe–Kuo parameters `(s, a, m_1..m_s)` for dimensions 1..16.
const JOE_KUO: [(usize, u32, [u32; 6]); SOBOL_MAX_DIM - 1] = [
    (1, 0, [1, 0, 0, 0, 0, 0]),
    (2, 1, [1, 3, 0, 0, 0, 0]),
    (3, 1, [1, 3, 1, 0, 0, 0]),
    (3, 2, [1, 1, 1, 0, 0, 0]),
    (4, 1, [1, 1, 3, 3, 0, 0]),
    (4, 4, [1, 3, 5, 13, 0, 0]),
    (5, 2, [1, 1, 5, 5, 17, 0]),
    (5, 4, [1, 1, 5, 5, 5, 0]),
    (5, 7, [1, 1, 7, 11, 19, 0]),
    (5, 11, [1, 1, 5, 1, 1, 0]),
    (5, 13, [1, 1, 1, 3, 11, 0]),
    (5, 14, [1, 3, 5, 5, 31, 0]),
    (6, 1, [1, 3, 3, 9, 7, 49]),
    (6, 13, [1, 1, 1, 15, 21, 21]),
    (6, 16, [1, 3, 1, 13, 27, 49]),
];

const PRIMES: [u64; 32] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97, 101, 103,
    107, 109, 113, 127, 131,
];

/// Largest dimension supported by [`HaltonSequence`].
pub const HALTON_MAX_DIM: usize = PRIMES.len();

fn van_der_corput_directions() -> [u32; BITS] {
    let mut v = [0u32; BITS];
    for (c, vc) in v.iter_mut().enumerate() {
        *vc = 1u32 << (31 - c);
    }
    v
}

/// Direction numbers from the recurrence
/// `v_c = v_{c−s} ⊕ (v_{c−s} >> s) ⊕ ⨁_{k=1}^{s−1} a_k v_{c−k}`.
fn joe_kuo_directions(s: usize, a: u32, m: &[u32; 6]) -> [u32; BITS] {
    let mut v = [0u32; BITS];
    for c in 0..s {
        v[c] = m[c] << (31 - c);
    }
    for c in s..BITS {
        let mut val = v[c - s] ^ (v[c - s] >> s);
        for k in 1..s {
            if (a >> (s - 1 - k)) & 1 == 1 {
                val ^= v[c - k];
            }
        }
        v[c] = val;
    }
    v
}

/// Sobol sequence state.
#[derive(Debug, Clone)]
pub struct SobolSequence {
    directions: Vec<[u32; BITS]>,
    index: u32,
    x: Vec<u32>,
}

impl SobolSequence {
    /// # Errors
    /// - `TooManyDimensions` when `nvars` is zero or above [`SOBOL_MAX_DIM`].
    pub fn new(nvars: usize) -> MfResult<Self> {
        if nvars == 0 || nvars > SOBOL_MAX_DIM {
            return Err(MfError::TooManyDimensions { nvars, max: SOBOL_MAX_DIM });
        }
        let mut directions = Vec::with_capacity(nvars);
        directions.push(van_der_corput_directions());
        for (s, a, m) in JOE_KUO.iter().take(nvars - 1) {
            directions.push(joe_kuo_directions(*s, *a, m));
        }
        Ok(Self { directions, index: 0, x: vec![0; nvars] })
    }

    pub fn nvars(&self) -> usize {
        self.x.len()
    }

    /// Rewind so the next point is sequence index 1 again.
    pub fn restart(&mut self) {
        self.index = 0;
        self.x.iter_mut().for_each(|v| *v = 0);
    }

    /// Advance one point; coordinates are `x / 2^32`.
    pub fn next_point(&mut self) -> Vec<f64> {
        let c = ((!self.index).trailing_zeros() as usize).min(BITS - 1);
        for (xj, dj) in self.x.iter_mut().zip(&self.directions) {
            *xj ^= dj[c];
        }
        self.index = self.index.wrapping_add(1);
        self.x.iter().map(|&v| v as f64 / 4_294_967_296.0).collect()
    }

    /// Next `nsamples` points as an `nvars × nsamples` array.
    pub fn generate(&mut self, nsamples: usize) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((self.nvars(), nsamples));
        for j in 0..nsamples {
            for (i, v) in self.next_point().into_iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        out
    }
}

/// Halton sequence state.
#[derive(Debug, Clone)]
pub struct HaltonSequence {
    nvars: usize,
    index: u64,
}

impl HaltonSequence {
    /// # Errors
    /// - `TooManyDimensions` when `nvars` is zero or above [`HALTON_MAX_DIM`].
    pub fn new(nvars: usize) -> MfResult<Self> {
        if nvars == 0 || nvars > HALTON_MAX_DIM {
            return Err(MfError::TooManyDimensions { nvars, max: HALTON_MAX_DIM });
        }
        Ok(Self { nvars, index: 0 })
    }

    pub fn nvars(&self) -> usize {
        self.nvars
    }

    /// Rewind so the next point is sequence index 1 again.
    pub fn restart(&mut self) {
        self.index = 0;
    }

    /// Next `nsamples` points as an `nvars × nsamples` array.
    pub fn generate(&mut self, nsamples: usize) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((self.nvars, nsamples));
        for j in 0..nsamples {
            self.index += 1;
            for (i, &base) in PRIMES.iter().take(self.nvars).enumerate() {
                out[[i, j]] = radical_inverse(self.index, base);
            }
        }
        out
    }
}

fn radical_inverse(mut n: u64, base: u64) -> f64 {
    let inv = 1.0 / base as f64;
    let mut scale = inv;
    let mut out = 0.0;
    while n > 0 {
        out += (n % base) as f64 * scale;
        n /= base;
        scale *= inv;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The first Sobol and Halton points against their known values.
    // - Dimension limits.
    // - Low-discrepancy behavior of the sample mean.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Known leading points.
    //
    // Given
    // -----
    // - Two-dimensional Sobol and Halton sequences.
    //
    // Expect
    // ------
    // - Sobol: (0.5, 0.5), (0.75, 0.25), (0.25, 0.75).
    // - Halton: (1/2, 1/3), (1/4, 2/3), (3/4, 1/9).
    fn leading_points_match_reference_values() {
        let sobol = SobolSequence::new(2).unwrap().generate(3);
        let expected = [[0.5, 0.5], [0.75, 0.25], [0.25, 0.75]];
        for (j, point) in expected.iter().enumerate() {
            assert_eq!(sobol[[0, j]], point[0]);
            assert_eq!(sobol[[1, j]], point[1]);
        }
        let halton = HaltonSequence::new(2).unwrap().generate(3);
        let expected = [[0.5, 1.0 / 3.0], [0.25, 2.0 / 3.0], [0.75, 1.0 / 9.0]];
        for (j, point) in expected.iter().enumerate() {
            assert!((halton[[0, j]] - point[0]).abs() < 1e-15);
            assert!((halton[[1, j]] - point[1]).abs() < 1e-15);
        }
    }

    #[test]
    // Purpose
    // -------
    // Reject unsupported dimensions.
    //
    // Given
    // -----
    // - nvars = 0 and nvars = SOBOL_MAX_DIM + 1.
    //
    // Expect
    // ------
    // - `TooManyDimensions`.
    fn dimension_limits_are_enforced() {
        assert!(matches!(SobolSequence::new(0), Err(MfError::TooManyDimensions { .. })));
        assert!(matches!(SobolSequence::new(SOBOL_MAX_DIM + 1), Err(MfError::TooManyDimensions { .. })));
        assert!(matches!(HaltonSequence::new(HALTON_MAX_DIM + 1), Err(MfError::TooManyDimensions { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Every Sobol coordinate stays in (0, 1) and averages to 1/2 quickly.
    //
    // Given
    // -----
    // - 1023 points in all 16 dimensions.
    //
    // Expect
    // ------
    // - Per-dimension mean within 1e-2 of 0.5.
    fn sobol_means_converge_in_every_dimension() {
        let points = SobolSequence::new(SOBOL_MAX_DIM).unwrap().generate(1023);
        assert!(points.iter().all(|&v| v > 0.0 && v < 1.0));
        for row in points.rows() {
            let mean = row.sum() / row.len() as f64;
            assert!((mean - 0.5).abs() < 1e-2, "{mean}");
        }
    }
}
