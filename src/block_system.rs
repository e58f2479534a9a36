// src/block_system.rs
//
// Solution of the generalized Sylvester equation on one tile whose diagonal blocks
// are 1x1 or 2x2: every block pair is an independent dense system of order 2, 4 or 8
// once the already computed blocks have been substituted into the right-hand side.

use std::ops::Range;

use log::trace;
use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

use crate::dif_estimate::{estimate_contribution, DifStrategy};
use crate::partition::BlockPartition;
use crate::pencil::SchurPencil;
use crate::pivoted_lu::{PivotedLu, MAX_SMALL_ORDER};
use crate::sum_of_squares::ScaledSumOfSquares;
use crate::ThreadSafeStdError;

/// Which form of the equation is solved.
///
/// * `NoTranspose`: `A R - L B = scale C`, `D R - L E = scale F`.
/// * `Transpose`: `A^T R + D^T L = scale C`, `R B^T + L E^T = -scale F`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Transpose {
    #[default]
    NoTranspose,
    Transpose,
}

/// What a sweep does with each small system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SweepMode {
    /// Solve with the protective scaling.
    Solve,
    /// Pick norm-maximizing right-hand sides and accumulate their solutions.
    Dif(DifStrategy),
}

/// Sizes of a diagonal block of the left pencil (rows) and of the right pencil (columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockShape {
    OneByOne,
    OneByTwo,
    TwoByOne,
    TwoByTwo,
}

impl BlockShape {
    pub fn from_sizes(rows: usize, cols: usize) -> Option<Self> {
        match (rows, cols) {
            (1, 1) => Some(Self::OneByOne),
            (1, 2) => Some(Self::OneByTwo),
            (2, 1) => Some(Self::TwoByOne),
            (2, 2) => Some(Self::TwoByTwo),
            _ => None,
        }
    }

    pub fn rows(self) -> usize {
        match self {
            Self::OneByOne | Self::OneByTwo => 1,
            Self::TwoByOne | Self::TwoByTwo => 2,
        }
    }

    pub fn cols(self) -> usize {
        match self {
            Self::OneByOne | Self::TwoByOne => 1,
            Self::OneByTwo | Self::TwoByTwo => 2,
        }
    }

    /// Order of the Kronecker system, `2 * rows * cols`.
    pub fn system_order(self) -> usize {
        2 * self.rows() * self.cols()
    }
}

/// Result of sweeping one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileOutcome {
    /// Product of the scales applied while solving the tile.
    pub scale: f64,
    /// Last pivot of a small system that had to be perturbed.
    pub perturbed_pivot: Option<usize>,
    /// Number of block pairs solved.
    pub subsystems: usize,
}

type SmallSystem = [[f64; MAX_SMALL_ORDER]; MAX_SMALL_ORDER];

/// Diagonal blocks of the two pencils that form one small system.
struct BlockPair<'a> {
    a: ArrayView2<'a, f64>,
    d: ArrayView2<'a, f64>,
    b: ArrayView2<'a, f64>,
    e: ArrayView2<'a, f64>,
}

/// `Z` for the direct equation, unknowns ordered `[vec(R); vec(L)]` column-major.
fn assemble_system(shape: BlockShape, blocks: &BlockPair) -> SmallSystem {
    match shape {
        BlockShape::OneByOne => assemble_one_by_one(blocks),
        BlockShape::OneByTwo => assemble_one_by_two(blocks),
        BlockShape::TwoByOne => assemble_two_by_one(blocks),
        BlockShape::TwoByTwo => assemble_two_by_two(blocks),
    }
}

fn assemble_one_by_one(blk: &BlockPair) -> SmallSystem {
    let mut z = [[0.0; MAX_SMALL_ORDER]; MAX_SMALL_ORDER];
    z[0][0] = blk.a[[0, 0]];
    z[0][1] = -blk.b[[0, 0]];
    z[1][0] = blk.d[[0, 0]];
    z[1][1] = -blk.e[[0, 0]];
    z
}

fn assemble_one_by_two(blk: &BlockPair) -> SmallSystem {
    let (a, d, b, e) = (blk.a[[0, 0]], blk.d[[0, 0]], &blk.b, &blk.e);
    let mut z = [[0.0; MAX_SMALL_ORDER]; MAX_SMALL_ORDER];
    z[0][..4].copy_from_slice(&[a, 0.0, -b[[0, 0]], -b[[1, 0]]]);
    z[1][..4].copy_from_slice(&[0.0, a, -b[[0, 1]], -b[[1, 1]]]);
    z[2][..4].copy_from_slice(&[d, 0.0, -e[[0, 0]], 0.0]);
    z[3][..4].copy_from_slice(&[0.0, d, -e[[0, 1]], -e[[1, 1]]]);
    z
}

fn assemble_two_by_one(blk: &BlockPair) -> SmallSystem {
    let (a, d, b, e) = (&blk.a, &blk.d, blk.b[[0, 0]], blk.e[[0, 0]]);
    let mut z = [[0.0; MAX_SMALL_ORDER]; MAX_SMALL_ORDER];
    z[0][..4].copy_from_slice(&[a[[0, 0]], a[[0, 1]], -b, 0.0]);
    z[1][..4].copy_from_slice(&[a[[1, 0]], a[[1, 1]], 0.0, -b]);
    z[2][..4].copy_from_slice(&[d[[0, 0]], d[[0, 1]], -e, 0.0]);
    z[3][..4].copy_from_slice(&[0.0, d[[1, 1]], 0.0, -e]);
    z
}

fn assemble_two_by_two(blk: &BlockPair) -> SmallSystem {
    let mut z = [[0.0; MAX_SMALL_ORDER]; MAX_SMALL_ORDER];
    // Row/column `q * 2 + p` of each half belongs to entry (p, q) of the block.
    for q in 0..2 {
        for p in 0..2 {
            let row = q * 2 + p;
            for pp in 0..2 {
                z[row][q * 2 + pp] = blk.a[[p, pp]];
                if pp >= p {
                    z[4 + row][q * 2 + pp] = blk.d[[p, pp]];
                }
            }
            for qq in 0..2 {
                z[row][4 + qq * 2 + p] = -blk.b[[qq, q]];
                if q >= qq {
                    z[4 + row][4 + qq * 2 + p] = -blk.e[[qq, q]];
                }
            }
        }
    }
    z
}

fn transpose_leading(z: &mut SmallSystem, n: usize) {
    for i in 0..n {
        for j in i + 1..n {
            let upper = z[i][j];
            z[i][j] = z[j][i];
            z[j][i] = upper;
        }
    }
}

/// Sweeps every block pair of one tile in dependency order, overwriting `c`, `f` with
/// the tile's `R`, `L` (or with the Dif estimator's vectors in `SweepMode::Dif`).
///
/// `left`/`right` are the tile's diagonal sub-pencils; `c`, `f` are the matching
/// `m x n` slices of the right-hand side.
pub(crate) fn solve_tile(
    trans: Transpose,
    mode: SweepMode,
    left: &SchurPencil,
    right: &SchurPencil,
    c: &mut ArrayViewMut2<f64>,
    f: &mut ArrayViewMut2<f64>,
    acc: &mut ScaledSumOfSquares,
) -> Result<TileOutcome, ThreadSafeStdError> {
    let row_blocks = BlockPartition::diagonal_blocks(left.quasi());
    let col_blocks = BlockPartition::diagonal_blocks(right.quasi());

    let mut outcome = TileOutcome {
        scale: 1.0,
        perturbed_pivot: None,
        subsystems: row_blocks.len() * col_blocks.len(),
    };

    match trans {
        Transpose::NoTranspose => {
            for cols in col_blocks.blocks() {
                for rows in row_blocks.blocks().rev() {
                    solve_block(trans, mode, left, right, (rows, cols.clone()), c, f, acc, &mut outcome)?;
                }
            }
        }
        Transpose::Transpose => {
            for rows in row_blocks.blocks() {
                for cols in col_blocks.blocks().rev() {
                    solve_block(trans, mode, left, right, (rows.clone(), cols), c, f, acc, &mut outcome)?;
                }
            }
        }
    }

    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn solve_block(
    trans: Transpose,
    mode: SweepMode,
    left: &SchurPencil,
    right: &SchurPencil,
    (rows, cols): (Range<usize>, Range<usize>),
    c: &mut ArrayViewMut2<f64>,
    f: &mut ArrayViewMut2<f64>,
    acc: &mut ScaledSumOfSquares,
    outcome: &mut TileOutcome,
) -> Result<(), ThreadSafeStdError> {
    let shape = BlockShape::from_sizes(rows.len(), cols.len()).ok_or_else(|| {
        format!(
            "Diagonal block pair of size {}x{} is not supported.",
            rows.len(),
            cols.len()
        )
    })?;
    let (is, js) = (rows.start, cols.start);
    let (mb, nb) = (shape.rows(), shape.cols());

    let blocks = BlockPair {
        a: left.quasi.slice(s![rows.clone(), rows.clone()]),
        d: left.tri.slice(s![rows.clone(), rows.clone()]),
        b: right.quasi.slice(s![cols.clone(), cols.clone()]),
        e: right.tri.slice(s![cols.clone(), cols.clone()]),
    };
    let order = shape.system_order();
    let mut z = assemble_system(shape, &blocks);
    if trans == Transpose::Transpose {
        transpose_leading(&mut z, order);
    }

    let half = mb * nb;
    let mut rhs = [0.0; MAX_SMALL_ORDER];
    for q in 0..nb {
        for p in 0..mb {
            rhs[q * mb + p] = c[[is + p, js + q]];
            rhs[half + q * mb + p] = f[[is + p, js + q]];
        }
    }

    let lu = PivotedLu::factorize(z, order)?;
    if let Some(pivot) = lu.perturbed_pivot() {
        outcome.perturbed_pivot = Some(pivot);
    }

    match mode {
        SweepMode::Solve => {
            let block_scale = lu.solve_scaled(&mut rhs[..order]);
            if block_scale != 1.0 {
                trace!(
                    "Rescaling tile right-hand side by {:e} at block ({}, {}).",
                    block_scale,
                    is,
                    js
                );
                c.mapv_inplace(|v| v * block_scale);
                f.mapv_inplace(|v| v * block_scale);
                outcome.scale *= block_scale;
            }
        }
        SweepMode::Dif(strategy) => estimate_contribution(strategy, &lu, &mut rhs[..order], acc),
    }

    let mut r_blk = Array2::<f64>::zeros((mb, nb));
    let mut l_blk = Array2::<f64>::zeros((mb, nb));
    for q in 0..nb {
        for p in 0..mb {
            r_blk[[p, q]] = rhs[q * mb + p];
            l_blk[[p, q]] = rhs[half + q * mb + p];
        }
    }
    c.slice_mut(s![rows.clone(), cols.clone()]).assign(&r_blk);
    f.slice_mut(s![rows.clone(), cols.clone()]).assign(&l_blk);

    match trans {
        Transpose::NoTranspose => substitute_direct(left, right, (rows, cols), &r_blk, &l_blk, c, f),
        Transpose::Transpose => substitute_transposed(left, right, (rows, cols), &r_blk, &l_blk, c, f),
    }
    Ok(())
}

/// Substitutes a solved block (or tile) into the blocks above it and to its right:
/// `C[..is, J] -= A[..is, I] R`, `F[..is, J] -= D[..is, I] R`,
/// `C[I, je..] += L B[J, je..]`, `F[I, je..] += L E[J, je..]`.
///
/// A 1x1 block uses vector updates, anything larger a matrix product.
pub(crate) fn substitute_direct(
    left: &SchurPencil,
    right: &SchurPencil,
    (rows, cols): (Range<usize>, Range<usize>),
    r_blk: &Array2<f64>,
    l_blk: &Array2<f64>,
    c: &mut ArrayViewMut2<f64>,
    f: &mut ArrayViewMut2<f64>,
) {
    let (is, ie) = (rows.start, rows.end);
    let (js, je) = (cols.start, cols.end);
    let n = c.ncols();
    let scalar = r_blk.dim() == (1, 1);

    if is > 0 {
        let a_col = left.quasi.slice(s![..is, rows.clone()]);
        let d_col = left.tri.slice(s![..is, rows.clone()]);
        if scalar {
            let alpha = -r_blk[[0, 0]];
            c.slice_mut(s![..is, js]).scaled_add(alpha, &a_col.index_axis(Axis(1), 0));
            f.slice_mut(s![..is, js]).scaled_add(alpha, &d_col.index_axis(Axis(1), 0));
        } else {
            general_mat_mul(-1.0, &a_col, r_blk, 1.0, &mut c.slice_mut(s![..is, cols.clone()]));
            general_mat_mul(-1.0, &d_col, r_blk, 1.0, &mut f.slice_mut(s![..is, cols.clone()]));
        }
    }

    if je < n {
        let b_row = right.quasi.slice(s![cols.clone(), je..]);
        let e_row = right.tri.slice(s![cols.clone(), je..]);
        if scalar {
            let alpha = l_blk[[0, 0]];
            c.slice_mut(s![is, je..]).scaled_add(alpha, &b_row.index_axis(Axis(0), 0));
            f.slice_mut(s![is, je..]).scaled_add(alpha, &e_row.index_axis(Axis(0), 0));
        } else {
            general_mat_mul(1.0, l_blk, &b_row, 1.0, &mut c.slice_mut(s![is..ie, je..]));
            general_mat_mul(1.0, l_blk, &e_row, 1.0, &mut f.slice_mut(s![is..ie, je..]));
        }
    }
}

/// Substitutes a solved block (or tile) of the transposed equation into the blocks
/// below it and to its left: `C[ie.., J] -= A[I, ie..]^T R + D[I, ie..]^T L`,
/// `F[I, ..js] += R B[..js, J]^T + L E[..js, J]^T`.
pub(crate) fn substitute_transposed(
    left: &SchurPencil,
    right: &SchurPencil,
    (rows, cols): (Range<usize>, Range<usize>),
    r_blk: &Array2<f64>,
    l_blk: &Array2<f64>,
    c: &mut ArrayViewMut2<f64>,
    f: &mut ArrayViewMut2<f64>,
) {
    let (is, ie) = (rows.start, rows.end);
    let (js, je) = (cols.start, cols.end);
    let m = c.nrows();
    let scalar = r_blk.dim() == (1, 1);

    if js > 0 {
        let b_col = right.quasi.slice(s![..js, cols.clone()]);
        let e_col = right.tri.slice(s![..js, cols.clone()]);
        if scalar {
            let mut target = f.slice_mut(s![is, ..js]);
            target.scaled_add(r_blk[[0, 0]], &b_col.index_axis(Axis(1), 0));
            target.scaled_add(l_blk[[0, 0]], &e_col.index_axis(Axis(1), 0));
        } else {
            let mut target = f.slice_mut(s![is..ie, ..js]);
            general_mat_mul(1.0, r_blk, &b_col.t(), 1.0, &mut target);
            general_mat_mul(1.0, l_blk, &e_col.t(), 1.0, &mut target);
        }
    }

    if ie < m {
        let a_row = left.quasi.slice(s![rows.clone(), ie..]);
        let d_row = left.tri.slice(s![rows.clone(), ie..]);
        if scalar {
            let mut target = c.slice_mut(s![ie.., js]);
            target.scaled_add(-r_blk[[0, 0]], &a_row.index_axis(Axis(0), 0));
            target.scaled_add(-l_blk[[0, 0]], &d_row.index_axis(Axis(0), 0));
        } else {
            let mut target = c.slice_mut(s![ie.., js..je]);
            general_mat_mul(-1.0, &a_row.t(), r_blk, 1.0, &mut target);
            general_mat_mul(-1.0, &d_row.t(), l_blk, 1.0, &mut target);
        }
    }
}
