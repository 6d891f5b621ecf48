//! sample_allocation::tree_search — best-candidate search over recursion
//! trees.
//!
//! The ACVGMFB estimator allocates samples for every recursion tree up to a
//! depth and keeps the one with the smallest variance. The search itself is
//! a pure loop over an explicit candidate list:
//!
//! - each candidate is scored by a caller-supplied function returning the
//!   variance and a payload;
//! - an error, or a non-finite variance, scores `+∞` and is skipped;
//! - ties keep the first candidate found;
//! - if every candidate fails, the first error is returned.
use crate::errors::{MfError, MfResult};
use tracing::debug;

/// Winner of a [`search_best_candidate`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct BestCandidate<T> {
    pub index: usize,
    pub variance: f64,
    pub payload: T,
}

/// search_best_candidate — minimum-variance candidate.
///
/// Errors
/// ------
/// - `InvalidOption` when `candidates` is empty.
/// - The first candidate error when no candidate produces a finite
///   variance. If every candidate "succeeds" with a non-finite variance,
///   `InvalidOption` is returned.
pub fn search_best_candidate<C, T, F>(candidates: &[C], mut score: F) -> MfResult<BestCandidate<T>>
where
    C: std::fmt::Debug,
    F: FnMut(&C) -> MfResult<(f64, T)>,
{
    if candidates.is_empty() {
        return Err(MfError::InvalidOption { name: "candidates", reason: "At least one candidate is required." });
    }
    let mut best: Option<BestCandidate<T>> = None;
    let mut first_error: Option<MfError> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        match score(candidate) {
            Ok((variance, payload)) if variance.is_finite() => {
                debug!("candidate {:?}: variance = {:.6e}", candidate, variance);
                let better = best.as_ref().map_or(true, |b| variance < b.variance);
                if better {
                    best = Some(BestCandidate { index, variance, payload });
                }
            }
            Ok((variance, _)) => {
                debug!("candidate {:?}: non-finite variance {}", candidate, variance);
            }
            Err(err) => {
                debug!("candidate {:?} failed: {}", candidate, err);
                first_error.get_or_insert(err);
            }
        }
    }
    match (best, first_error) {
        (Some(best), _) => Ok(best),
        (None, Some(err)) => Err(err),
        (None, None) => Err(MfError::InvalidOption {
            name: "candidates",
            reason: "No candidate produced a finite variance.",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Selection of the minimum and first-wins tie breaking.
    // - Skipping failed candidates and returning the first error when all
    //   fail.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // The smallest variance wins; ties keep the earlier candidate; failures
    // are skipped.
    //
    // Given
    // -----
    // - Scores [3, err, 1, 1, 2].
    //
    // Expect
    // ------
    // - Index 2 with variance 1.
    fn picks_first_minimum_and_skips_failures() {
        let candidates = [3.0, -1.0, 1.0, 1.0, 2.0];
        let best = search_best_candidate(&candidates, |&v| {
            if v < 0.0 { Err(MfError::SingularSystem { what: "test" }) } else { Ok((v, v * 10.0)) }
        })
        .unwrap();
        assert_eq!(best.index, 2);
        assert_eq!(best.variance, 1.0);
        assert_eq!(best.payload, 10.0);
    }

    #[test]
    // Purpose
    // -------
    // When every candidate fails the first error is surfaced.
    //
    // Given
    // -----
    // - Two candidates failing with different errors.
    //
    // Expect
    // ------
    // - The error of the first candidate.
    fn all_failures_return_first_error() {
        let candidates = [0usize, 1];
        let err = search_best_candidate(&candidates, |&i| -> MfResult<(f64, ())> {
            if i == 0 {
                Err(MfError::SingularSystem { what: "first" })
            } else {
                Err(MfError::InfeasibleBudget { target_cost: 1.0, required_cost: 2.0 })
            }
        })
        .unwrap_err();
        assert_eq!(err, MfError::SingularSystem { what: "first" });
    }
}
