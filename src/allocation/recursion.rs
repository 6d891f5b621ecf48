//! allocation::recursion — recursion trees and model subsets.
//!
//! Purpose
//! -------
//! Represent the recursion index of generalized ACV estimators as a
//! validated tree rooted at the high-fidelity model, and enumerate the
//! discrete structures searched by the allocation layer: every recursion
//! tree up to a depth, and every non-empty model subset.
//!
//! Key behaviors
//! -------------
//! - [`RecursionIndex::new`] rejects indices that do not form a tree rooted
//!   at model 0 (out-of-range parents, self-parents, cycles).
//! - Tree queries (`parent`, `depth`, `subtree`, `topological_order`) used
//!   by the budget reparameterization and by integer rounding.
//! - [`recursion_indices`] lists trees in lexicographic order of the parent
//!   vector, so the all-zeros (ACVMF) tree is always first.
//! - [`model_subsets`] lists subsets by size, then lexicographically.
//!
//! Invariants & assumptions
//! ------------------------
//! - Entry `i` of the index is the parent of model `i + 1`.
//! - Model 0 is the root and has depth 0.
//!
//! Testing notes
//! -------------
//! - Unit tests check validation, tree queries and the enumeration counts
//!   (10 trees of depth ≤ 2 and 16 in total for four models).
use crate::errors::{MfError, MfResult};

/// Validated recursion index of length `M − 1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecursionIndex {
    parents: Vec<usize>,
}

impl RecursionIndex {
    /// Validate a parent vector.
    ///
    /// # Errors
    /// - `MfError::InvalidRecursionIndex` if an entry is out of range, points
    ///   at its own model, or the parent chain of some model never reaches 0.
    pub fn new(parents: Vec<usize>) -> MfResult<Self> {
        let nmodels = parents.len() + 1;
        for (i, &p) in parents.iter().enumerate() {
            if p >= nmodels {
                return Err(MfError::InvalidRecursionIndex {
                    index: parents,
                    reason: "Parent index out of range.",
                });
            }
            if p == i + 1 {
                return Err(MfError::InvalidRecursionIndex {
                    index: parents,
                    reason: "A model cannot recurse onto itself.",
                });
            }
        }
        for model in 1..nmodels {
            let mut current = model;
            let mut steps = 0;
            while current != 0 {
                current = parents[current - 1];
                steps += 1;
                if steps > nmodels {
                    return Err(MfError::InvalidRecursionIndex {
                        index: parents,
                        reason: "Recursion index contains a cycle.",
                    });
                }
            }
        }
        Ok(Self { parents })
    }

    /// All low-fidelity models recurse onto the high-fidelity model (ACVMF).
    pub fn zeros(nmodels: usize) -> Self {
        Self { parents: vec![0; nmodels.saturating_sub(1)] }
    }

    /// Fully chained tree `[0, 1, ..., M−2]` (MFMC structure).
    pub fn chain(nmodels: usize) -> Self {
        Self { parents: (0..nmodels.saturating_sub(1)).collect() }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.parents
    }

    pub fn nmodels(&self) -> usize {
        self.parents.len() + 1
    }

    /// Parent of `model` (`model ≥ 1`).
    pub fn parent(&self, model: usize) -> usize {
        self.parents[model - 1]
    }

    /// Number of edges between `model` and the root.
    pub fn depth(&self, model: usize) -> usize {
        let mut depth = 0;
        let mut current = model;
        while current != 0 {
            current = self.parents[current - 1];
            depth += 1;
        }
        depth
    }

    /// Depth of the deepest model.
    pub fn max_depth(&self) -> usize {
        (0..self.nmodels()).map(|m| self.depth(m)).max().unwrap_or(0)
    }

    /// `model` followed by its ancestors, ending with the root.
    pub fn path_to_root(&self, model: usize) -> Vec<usize> {
        let mut path = vec![model];
        let mut current = model;
        while current != 0 {
            current = self.parents[current - 1];
            path.push(current);
        }
        path
    }

    /// `model` and all of its descendants.
    pub fn subtree(&self, model: usize) -> Vec<usize> {
        (0..self.nmodels()).filter(|&m| self.path_to_root(m).contains(&model)).collect()
    }

    /// Models ordered so that every parent precedes its children.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.nmodels()).collect();
        order.sort_by_key(|&m| (self.depth(m), m));
        order
    }
}

/// recursion_indices — enumerate every recursion tree up to `depth`.
///
/// Parameters
/// ----------
/// - `nmodels`: number of models `M ≥ 1`.
/// - `depth`: maximum tree depth; `None` means `M − 1` (no restriction).
///
/// Returns
/// -------
/// `Vec<RecursionIndex>` in lexicographic order of the parent vector; the
/// all-zeros tree comes first.
pub fn recursion_indices(nmodels: usize, depth: Option<usize>) -> Vec<RecursionIndex> {
    let nlf = nmodels.saturating_sub(1);
    let max_depth = depth.unwrap_or(nlf);
    let mut out = Vec::new();
    let mut parents = vec![0usize; nlf];
    loop {
        if let Ok(index) = RecursionIndex::new(parents.clone()) {
            if index.max_depth() <= max_depth {
                out.push(index);
            }
        }
        // Odometer increment, last entry fastest.
        let mut pos = nlf;
        loop {
            if pos == 0 {
                return out;
            }
            pos -= 1;
            parents[pos] += 1;
            if parents[pos] < nmodels {
                break;
            }
            parents[pos] = 0;
        }
    }
}

/// model_subsets — all non-empty subsets of `0..nmodels`.
///
/// Ordered by subset size, then lexicographically, e.g. for three models:
/// `[0], [1], [2], [0,1], [0,2], [1,2], [0,1,2]`.
pub fn model_subsets(nmodels: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    for size in 1..=nmodels {
        push_combinations(nmodels, size, 0, &mut Vec::with_capacity(size), &mut out);
    }
    out
}

fn push_combinations(
    n: usize, size: usize, start: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>,
) {
    if current.len() == size {
        out.push(current.clone());
        return;
    }
    for i in start..n {
        current.push(i);
        push_combinations(n, size, i + 1, current, out);
        current.pop();
    }
}
