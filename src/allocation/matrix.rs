//! allocation::matrix — partition-membership matrices for ACV families.
//!
//! Purpose
//! -------
//! Encode which disjoint sample partitions make up the two sample sets of
//! every model. Row `p` is partition `P_p`; column `2j` is `z_j*` (the set
//! on which model `j` is subtracted) and column `2j + 1` is `z_j`. Model 0
//! has an empty `z_0*`.
//!
//! Key behaviors
//! -------------
//! - Family builders: [`AllocationMatrix::mlmc`], [`AllocationMatrix::mfmc`],
//!   [`AllocationMatrix::acvmf`], [`AllocationMatrix::acvis`].
//! - [`AllocationMatrix::reorder_acvgmf`] remaps columns once the integer
//!   sample counts are known, so that nested sets follow the sorted order of
//!   the low-fidelity counts.
//! - Counting helpers: pairwise intersections, subset sizes, per-model
//!   totals and the partitions each model evaluates.
//!
//! Invariants & assumptions
//! ------------------------
//! - Shape is `M × 2M`, entries are 0/1 and column 0 is empty.
//! - Builders are deterministic given the recursion index.
//!
//! Testing notes
//! -------------
//! - Unit tests pin the builder outputs and the reordering to small
//!   hand-checked matrices.
use crate::{
    allocation::recursion::RecursionIndex,
    errors::{MfError, MfResult},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationMatrix {
    mat: Array2<u8>,
}

impl AllocationMatrix {
    /// Wrap a raw 0/1 matrix after checking its shape and contents.
    ///
    /// # Errors
    /// - `DimensionMismatch` if the matrix is not `M × 2M`.
    /// - `InvalidOption` for entries other than 0/1 or a non-empty `z_0*`.
    pub fn from_array(mat: Array2<u8>) -> MfResult<Self> {
        let (rows, cols) = mat.dim();
        if cols != 2 * rows || rows == 0 {
            return Err(MfError::DimensionMismatch {
                what: "allocation matrix columns",
                expected: 2 * rows,
                found: cols,
            });
        }
        if mat.iter().any(|&v| v > 1) {
            return Err(MfError::InvalidOption {
                name: "allocation matrix",
                reason: "Entries must be 0 or 1.",
            });
        }
        if mat.column(0).iter().any(|&v| v != 0) {
            return Err(MfError::InvalidOption {
                name: "allocation matrix",
                reason: "The high-fidelity control set z_0* must be empty.",
            });
        }
        Ok(Self { mat })
    }

    fn empty(nmodels: usize) -> Self {
        Self { mat: Array2::zeros((nmodels, 2 * nmodels)) }
    }

    pub fn nmodels(&self) -> usize {
        self.mat.nrows()
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.mat.view()
    }

    /// Whether partition `partition` belongs to the set in column `col`.
    pub fn contains(&self, partition: usize, col: usize) -> bool {
        self.mat[[partition, col]] == 1
    }

    /// MLMC: `z_0 = {P_0}`, `z_i* = {P_{i−1}}`, `z_i = {P_i}`.
    pub fn mlmc(nmodels: usize) -> Self {
        let mut out = Self::empty(nmodels);
        for i in 0..nmodels {
            out.mat[[i, 2 * i + 1]] = 1;
            if i + 1 < nmodels {
                out.mat[[i, 2 * (i + 1)]] = 1;
            }
        }
        out
    }

    /// MFMC: `z_i = {P_0, …, P_i}` and `z_i* = z_{i−1}`.
    pub fn mfmc(nmodels: usize) -> Self {
        Self::acvmf(&RecursionIndex::chain(nmodels))
    }

    /// ACVMF: `z_i = {P_0, …, P_i}` and `z_i* = z_{rec[i−1]}`.
    pub fn acvmf(rec: &RecursionIndex) -> Self {
        let nmodels = rec.nmodels();
        let mut out = Self::empty(nmodels);
        for i in 0..nmodels {
            for p in 0..=i {
                out.mat[[p, 2 * i + 1]] = 1;
            }
        }
        for i in 1..nmodels {
            let src = 2 * rec.parent(i) + 1;
            for p in 0..nmodels {
                out.mat[[p, 2 * i]] = out.mat[[p, src]];
            }
        }
        out
    }

    /// ACVIS: `z_0 = {P_0}`, `z_i* = {P_{rec[i−1]}}`, `z_i = z_i* ∪ {P_i}`.
    pub fn acvis(rec: &RecursionIndex) -> Self {
        let nmodels = rec.nmodels();
        let mut out = Self::empty(nmodels);
        out.mat[[0, 1]] = 1;
        for i in 1..nmodels {
            let parent = rec.parent(i);
            out.mat[[parent, 2 * i]] = 1;
            out.mat[[parent, 2 * i + 1]] = 1;
            out.mat[[i, 2 * i + 1]] = 1;
        }
        out
    }

    /// reorder_acvgmf — align nested `z_i` sets with the realized counts.
    ///
    /// Parameters
    /// ----------
    /// - `nsamples_per_model`: `ArrayView1<f64>`
    ///   Integer-valued totals `|z_i* ∪ z_i|`, length `M`.
    /// - `rec`: recursion index used to rebuild the `z_i*` columns.
    ///
    /// Returns
    /// -------
    /// A matrix whose column `2i+1` is the original column `2k_i+1`, with
    /// `k_i` the 1-based rank of `n_i` among the sorted unique low-fidelity
    /// counts, and whose column `2i` copies the new column `2·rec[i−1]+1`.
    /// Partition sizes for it come from
    /// [`npartition_samples_acvmf`](crate::allocation::samples::npartition_samples_acvmf).
    pub fn reorder_acvgmf(&self, nsamples_per_model: ArrayView1<f64>, rec: &RecursionIndex) -> Self {
        let nmodels = self.nmodels();
        let mut unique: Vec<f64> = nsamples_per_model.iter().skip(1).copied().collect();
        unique.sort_by(f64::total_cmp);
        unique.dedup();
        let mut out = self.clone();
        for i in 1..nmodels {
            let rank = unique.iter().position(|&v| v == nsamples_per_model[i]).unwrap_or(0) + 1;
            for p in 0..nmodels {
                out.mat[[p, 2 * i + 1]] = self.mat[[p, 2 * rank + 1]];
            }
        }
        for i in 1..nmodels {
            let src = 2 * rec.parent(i) + 1;
            for p in 0..nmodels {
                out.mat[[p, 2 * i]] = out.mat[[p, src]];
            }
        }
        out
    }

    /// Intersection sizes `I[a, b] = Σ_p mat[p, a] mat[p, b] P_p` (`2M × 2M`).
    pub fn intersect(&self, npartition_samples: ArrayView1<f64>) -> Array2<f64> {
        let ncols = self.mat.ncols();
        let mut out = Array2::<f64>::zeros((ncols, ncols));
        for (p, &size) in npartition_samples.iter().enumerate() {
            let row = self.mat.row(p);
            for a in 0..ncols {
                if row[a] == 0 {
                    continue;
                }
                for b in 0..ncols {
                    if row[b] == 1 {
                        out[[a, b]] += size;
                    }
                }
            }
        }
        out
    }

    /// Sizes of every `z_j*`/`z_j` set: the diagonal of [`Self::intersect`].
    pub fn subset_sizes(&self, npartition_samples: ArrayView1<f64>) -> Array1<f64> {
        Array1::from_shape_fn(self.mat.ncols(), |col| {
            npartition_samples
                .iter()
                .enumerate()
                .filter(|(p, _)| self.mat[[*p, col]] == 1)
                .map(|(_, &size)| size)
                .sum()
        })
    }

    /// Partitions in `z_i* ∪ z_i`, ascending.
    pub fn model_partitions(&self, model: usize) -> Vec<usize> {
        (0..self.nmodels())
            .filter(|&p| self.contains(p, 2 * model) || self.contains(p, 2 * model + 1))
            .collect()
    }

    /// Totals `|z_i* ∪ z_i|` implied by the partition sizes.
    pub fn nsamples_per_model(&self, npartition_samples: ArrayView1<f64>) -> Array1<f64> {
        Array1::from_shape_fn(self.nmodels(), |i| {
            self.model_partitions(i).iter().map(|&p| npartition_samples[p]).sum()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Builder output for MLMC, MFMC, ACVMF and ACVIS.
    // - Column reordering for generalized recursion trees.
    // - Intersection and subset counting.
    // -------------------------------------------------------------------------

    fn as_u8(rows: &[[u8; 8]]) -> Array2<u8> {
        Array2::from_shape_fn((rows.len(), 8), |(i, j)| rows[i][j])
    }

    #[test]
    // Purpose
    // -------
    // Pin the MLMC and MFMC builders.
    //
    // Given
    // -----
    // - Four models.
    //
    // Expect
    // ------
    // - MLMC: telescoping pairs; MFMC: nested prefixes.
    fn mlmc_and_mfmc_builders_match_reference() {
        let mlmc = as_u8(&[
            [0, 1, 1, 0, 0, 0, 0, 0],
            [0, 0, 0, 1, 1, 0, 0, 0],
            [0, 0, 0, 0, 0, 1, 1, 0],
            [0, 0, 0, 0, 0, 0, 0, 1],
        ]);
        let mfmc = as_u8(&[
            [0, 1, 1, 1, 1, 1, 1, 1],
            [0, 0, 0, 1, 1, 1, 1, 1],
            [0, 0, 0, 0, 0, 1, 1, 1],
            [0, 0, 0, 0, 0, 0, 0, 1],
        ]);
        assert_eq!(AllocationMatrix::mlmc(4).view(), mlmc.view());
        assert_eq!(AllocationMatrix::mfmc(4).view(), mfmc.view());
    }

    #[test]
    // Purpose
    // -------
    // ACVMF controls every model with its parent's `z` set.
    //
    // Given
    // -----
    // - Recursion indices [0, 0, 0] and [0, 0, 2].
    //
    // Expect
    // ------
    // - Star columns copy `z_0` or `z_2` respectively.
    fn acvmf_builder_follows_recursion_index() {
        let zeros = RecursionIndex::zeros(4);
        let expected = as_u8(&[
            [0, 1, 1, 1, 1, 1, 1, 1],
            [0, 0, 0, 1, 0, 1, 0, 1],
            [0, 0, 0, 0, 0, 1, 0, 1],
            [0, 0, 0, 0, 0, 0, 0, 1],
        ]);
        assert_eq!(AllocationMatrix::acvmf(&zeros).view(), expected.view());

        let rec = RecursionIndex::new(vec![0, 0, 2]).expect("valid tree");
        let expected = as_u8(&[
            [0, 1, 1, 1, 1, 1, 1, 1],
            [0, 0, 0, 1, 0, 1, 1, 1],
            [0, 0, 0, 0, 0, 1, 1, 1],
            [0, 0, 0, 0, 0, 0, 0, 1],
        ]);
        assert_eq!(AllocationMatrix::acvmf(&rec).view(), expected.view());
    }

    #[test]
    // Purpose
    // -------
    // ACVIS shares only the parent's own partition.
    //
    // Given
    // -----
    // - Recursion indices [0, 0, 0] and [0, 1, 1].
    //
    // Expect
    // ------
    // - Reference matrices with one independent partition per model.
    fn acvis_builder_shares_parent_partition() {
        let expected = as_u8(&[
            [0, 1, 1, 1, 1, 1, 1, 1],
            [0, 0, 0, 1, 0, 0, 0, 0],
            [0, 0, 0, 0, 0, 1, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 1],
        ]);
        assert_eq!(AllocationMatrix::acvis(&RecursionIndex::zeros(4)).view(), expected.view());

        let rec = RecursionIndex::new(vec![0, 1, 1]).expect("valid tree");
        let expected = as_u8(&[
            [0, 1, 1, 1, 0, 0, 0, 0],
            [0, 0, 0, 1, 1, 1, 1, 1],
            [0, 0, 0, 0, 0, 1, 0, 0],
            [0, 0, 0, 0, 0, 0, 0, 1],
        ]);
        assert_eq!(AllocationMatrix::acvis(&rec).view(), expected.view());
    }

    #[test]
    // Purpose
    // -------
    // Reordering places each model on the prefix matching its count.
    //
    // Given
    // -----
    // - Counts [2, 4, 8, 6], zero recursion index, partitions [2, 2, 2, 2].
    //
    // Expect
    // ------
    // - Reference matrix and set sizes [0, 2, 2, 4, 2, 8, 2, 6].
    fn reorder_acvgmf_sorts_nested_sets() {
        // Arrange
        let rec = RecursionIndex::zeros(4);
        let counts = array![2.0, 4.0, 8.0, 6.0];
        let partitions = array![2.0, 2.0, 2.0, 2.0];

        // Act
        let reordered = AllocationMatrix::acvmf(&rec).reorder_acvgmf(counts.view(), &rec);

        // Assert
        let expected = as_u8(&[
            [0, 1, 1, 1, 1, 1, 1, 1],
            [0, 0, 0, 1, 0, 1, 0, 1],
            [0, 0, 0, 0, 0, 1, 0, 1],
            [0, 0, 0, 0, 0, 1, 0, 0],
        ]);
        assert_eq!(reordered.view(), expected.view());
        assert_eq!(
            reordered.subset_sizes(partitions.view()),
            array![0.0, 2.0, 2.0, 4.0, 2.0, 8.0, 2.0, 6.0]
        );
        assert_eq!(reordered.nsamples_per_model(partitions.view()), counts);
    }

    #[test]
    // Purpose
    // -------
    // Reordering on a branching tree with tied counts.
    //
    // Given
    // -----
    // - Counts [2, 4, 5, 8, 5], recursion index [0, 1, 1, 3],
    //   partitions [2, 2, 1, 3, 0].
    //
    // Expect
    // ------
    // - Set sizes [0, 2, 2, 4, 4, 5, 4, 8, 8, 5].
    fn reorder_acvgmf_handles_ties_and_deep_trees() {
        let rec = RecursionIndex::new(vec![0, 1, 1, 3]).expect("valid tree");
        let counts = array![2.0, 4.0, 5.0, 8.0, 5.0];
        let partitions = array![2.0, 2.0, 1.0, 3.0, 0.0];
        let reordered = AllocationMatrix::acvmf(&rec).reorder_acvgmf(counts.view(), &rec);
        assert_eq!(
            reordered.subset_sizes(partitions.view()),
            array![0.0, 2.0, 2.0, 4.0, 4.0, 5.0, 4.0, 8.0, 8.0, 5.0]
        );
    }

    #[test]
    // Purpose
    // -------
    // Intersections of the MLMC sets are block diagonal.
    //
    // Given
    // -----
    // - MLMC matrix, partitions [2, 2, 4, 4].
    //
    // Expect
    // ------
    // - I[1, 2] = 2, I[5, 6] = 4, no overlap across levels.
    fn intersect_counts_shared_partitions() {
        let partitions = array![2.0, 2.0, 4.0, 4.0];
        let inter = AllocationMatrix::mlmc(4).intersect(partitions.view());
        assert_eq!(inter[[1, 2]], 2.0);
        assert_eq!(inter[[3, 4]], 2.0);
        assert_eq!(inter[[5, 6]], 4.0);
        assert_eq!(inter[[1, 3]], 0.0);
        assert_eq!(inter[[7, 7]], 4.0);
        assert_eq!(inter[[0, 0]], 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Reject malformed raw matrices.
    //
    // Given
    // -----
    // - A 2×3 matrix and a matrix with a non-empty z_0*.
    //
    // Expect
    // ------
    // - DimensionMismatch and InvalidOption.
    fn from_array_validates_shape_and_contents() {
        assert!(matches!(
            AllocationMatrix::from_array(Array2::zeros((2, 3))),
            Err(MfError::DimensionMismatch { .. })
        ));
        let mut bad = Array2::<u8>::zeros((2, 4));
        bad[[0, 0]] = 1;
        assert!(matches!(AllocationMatrix::from_array(bad), Err(MfError::InvalidOption { .. })));
    }
}
