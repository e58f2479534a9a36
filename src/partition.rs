// src/partition.rs

use std::ops::Range;

use ndarray::ArrayView2;

use crate::ThreadSafeStdError;

/// Partition of the diagonal of a quasi-upper-triangular matrix.
///
/// `boundaries` holds the first index of every block followed by the matrix order, so
/// block `k` spans `boundaries[k]..boundaries[k + 1]`. Boundaries are strictly
/// increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPartition {
    boundaries: Vec<usize>,
}

impl BlockPartition {
    /// Splits the diagonal into its 1x1 and 2x2 blocks. A 2x2 block starts at `i`
    /// exactly when `matrix[[i + 1, i]]` is nonzero.
    pub fn diagonal_blocks(matrix: ArrayView2<f64>) -> Self {
        let order = matrix.nrows();
        let mut boundaries = Vec::with_capacity(order + 1);
        let mut i = 0;
        while i < order {
            boundaries.push(i);
            if i + 1 < order && matrix[[i + 1, i]] != 0.0 {
                i += 2;
            } else {
                i += 1;
            }
        }
        boundaries.push(order);
        Self { boundaries }
    }

    /// Splits the diagonal into tiles of `tile` rows, extending a tile by one row
    /// whenever its end would fall inside a 2x2 diagonal block.
    pub fn tiles(matrix: ArrayView2<f64>, tile: usize) -> Self {
        let order = matrix.nrows();
        let step = tile.max(1);
        let mut boundaries = Vec::with_capacity(order / step + 2);
        let mut i = 0;
        while i < order {
            boundaries.push(i);
            i = i.saturating_add(step);
            if i < order && matrix[[i, i - 1]] != 0.0 {
                i += 1;
            }
        }
        boundaries.push(order);
        Self { boundaries }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index range covered by block `k`.
    #[cfg(test)]
    pub(crate) fn block(&self, k: usize) -> Range<usize> {
        self.boundaries[k]..self.boundaries[k + 1]
    }

    /// Block ranges in order.
    pub fn blocks(&self) -> impl DoubleEndedIterator<Item = Range<usize>> + '_ {
        self.boundaries.windows(2).map(|w| w[0]..w[1])
    }

    /// Block starts followed by the matrix order.
    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }
}

/// Checks that a square matrix is quasi-upper-triangular in the sense used by the
/// solver: no two consecutive nonzero subdiagonal entries, i.e. no diagonal block
/// larger than 2x2. Entries below the first subdiagonal are never read.
pub fn check_quasi_triangular(matrix: ArrayView2<f64>, name: &str) -> Result<(), ThreadSafeStdError> {
    let order = matrix.nrows();
    for i in 1..order.saturating_sub(1) {
        if matrix[[i, i - 1]] != 0.0 && matrix[[i + 1, i]] != 0.0 {
            return Err(format!(
                "{} has consecutive nonzero subdiagonal entries at rows {} and {}; diagonal blocks larger than 2x2 are not supported.",
                name,
                i,
                i + 1
            )
            .into());
        }
    }
    Ok(())
}
