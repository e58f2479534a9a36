// src/diagnostics.rs

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::block_system::Transpose;
use crate::pencil::SchurPencil;
use crate::sum_of_squares::ScaledSumOfSquares;

/// Residuals of a computed solution `(R, L)` of the generalized Sylvester equation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SylvesterResiduals {
    /// Frobenius norm of the residual of the first equation.
    pub first_abs: f64,
    /// Frobenius norm of the residual of the second equation.
    pub second_abs: f64,
    /// `first_abs` relative to the sizes of the terms that produced it.
    pub first_rel: f64,
    /// `second_abs` relative to the sizes of the terms that produced it.
    pub second_rel: f64,
}

impl SylvesterResiduals {
    /// Largest of the two relative residuals.
    pub fn max_relative(&self) -> f64 {
        self.first_rel.max(self.second_rel)
    }
}

/// Frobenius norm of a matrix; 0 for an empty one. Accumulated with a running scale,
/// so entries near the overflow threshold do not overflow the intermediate sum.
pub fn frobenius_norm(matrix: &ArrayView2<f64>) -> f64 {
    let mut acc = ScaledSumOfSquares::new();
    matrix.iter().for_each(|&x| acc.push(x));
    acc.norm()
}

/// Copy of `matrix` with every entry below the `below`-th subdiagonal set to zero.
fn upper_band(matrix: ArrayView2<f64>, below: usize) -> Array2<f64> {
    let mut out = matrix.to_owned();
    for ((i, j), v) in out.indexed_iter_mut() {
        if i > j + below {
            *v = 0.0;
        }
    }
    out
}

/// Computes the residuals of `(r, l)` against the original right-hand sides `(c, f)`.
///
/// * `NoTranspose`: `A R - L B - scale C` and `D R - L E - scale F`.
/// * `Transpose`: `A^T R + D^T L - scale C` and `R B^T + L E^T + scale F`.
///
/// Only the parts of the pencils the solver reads are used, so garbage below the
/// quasi-triangular and triangular structure does not affect the result. Relative
/// residuals divide by the sum of the Frobenius norms of the terms (for example
/// `|A| |R| + |L| |B| + scale |C|`) and are 0 when that sum is 0.
#[allow(clippy::too_many_arguments)]
pub fn sylvester_residuals(
    trans: Transpose,
    left: &SchurPencil,
    right: &SchurPencil,
    r: &ArrayView2<f64>,
    l: &ArrayView2<f64>,
    c: &ArrayView2<f64>,
    f: &ArrayView2<f64>,
    scale: f64,
) -> SylvesterResiduals {
    let a = upper_band(left.quasi(), 1);
    let d = upper_band(left.tri(), 0);
    let b = upper_band(right.quasi(), 1);
    let e = upper_band(right.tri(), 0);

    let (first, second) = match trans {
        Transpose::NoTranspose => (
            a.dot(r) - l.dot(&b) - c * scale,
            d.dot(r) - l.dot(&e) - f * scale,
        ),
        Transpose::Transpose => (
            a.t().dot(r) + d.t().dot(l) - c * scale,
            r.dot(&b.t()) + l.dot(&e.t()) + f * scale,
        ),
    };

    let norm = |m: &Array2<f64>| frobenius_norm(&m.view());
    let (nr, nl) = (frobenius_norm(r), frobenius_norm(l));
    let first_terms = match trans {
        Transpose::NoTranspose => norm(&a) * nr + nl * norm(&b),
        Transpose::Transpose => norm(&a) * nr + norm(&d) * nl,
    } + scale * frobenius_norm(c);
    let second_terms = match trans {
        Transpose::NoTranspose => norm(&d) * nr + nl * norm(&e),
        Transpose::Transpose => nr * norm(&b) + nl * norm(&e),
    } + scale * frobenius_norm(f);

    let relative = |abs: f64, terms: f64| if terms > 0.0 { abs / terms } else { 0.0 };
    let first_abs = norm(&first);
    let second_abs = norm(&second);
    SylvesterResiduals {
        first_abs,
        second_abs,
        first_rel: relative(first_abs, first_terms),
        second_rel: relative(second_abs, second_terms),
    }
}
