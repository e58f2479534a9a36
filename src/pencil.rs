// src/pencil.rs

use std::ops::Range;

use ndarray::{s, ArrayView2};

use crate::partition::check_quasi_triangular;
use crate::ThreadSafeStdError;

/// A matrix pair in generalized Schur form: `quasi` is upper quasi-triangular with 1x1
/// and 2x2 diagonal blocks, `tri` is upper triangular. Entries below the first
/// subdiagonal of `quasi` and below the diagonal of `tri` are never read.
#[derive(Debug, Clone, Copy)]
pub struct SchurPencil<'a> {
    pub(crate) quasi: ArrayView2<'a, f64>,
    pub(crate) tri: ArrayView2<'a, f64>,
}

impl<'a> SchurPencil<'a> {
    /// Wraps `(quasi, tri)` after checking shapes and the diagonal block structure.
    ///
    /// # Errors
    /// Returns an error if either matrix is not square, the orders differ, or `quasi`
    /// has a diagonal block larger than 2x2.
    pub fn new(quasi: ArrayView2<'a, f64>, tri: ArrayView2<'a, f64>) -> Result<Self, ThreadSafeStdError> {
        if quasi.nrows() != quasi.ncols() {
            return Err(format!(
                "Quasi-triangular matrix must be square, got {}x{}.",
                quasi.nrows(),
                quasi.ncols()
            )
            .into());
        }
        if tri.nrows() != tri.ncols() {
            return Err(format!(
                "Triangular matrix must be square, got {}x{}.",
                tri.nrows(),
                tri.ncols()
            )
            .into());
        }
        if quasi.nrows() != tri.nrows() {
            return Err(format!(
                "Matrices of a pencil must have the same order ({} vs {}).",
                quasi.nrows(),
                tri.nrows()
            )
            .into());
        }
        check_quasi_triangular(quasi, "Quasi-triangular matrix")?;
        Ok(Self { quasi, tri })
    }

    /// Order of the pencil.
    pub fn order(&self) -> usize {
        self.quasi.nrows()
    }

    pub fn quasi(&self) -> ArrayView2<'a, f64> {
        self.quasi
    }

    pub fn tri(&self) -> ArrayView2<'a, f64> {
        self.tri
    }

    /// Diagonal sub-pencil on `range`; still in generalized Schur form when `range`
    /// does not split a 2x2 block.
    pub(crate) fn diagonal_tile(&self, range: Range<usize>) -> SchurPencil<'a> {
        let quasi = self.quasi.slice_move(s![range.clone(), range.clone()]);
        let tri = self.tri.slice_move(s![range.clone(), range]);
        SchurPencil { quasi, tri }
    }
}
