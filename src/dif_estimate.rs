// src/dif_estimate.rs
//
// Right-hand-side selection for Dif estimation. Each small system contributes
// the solution of `Z * x = b` for a `b` chosen to make `|x|` large, which turns the
// accumulated sum of squares into a lower bound for `|Z^{-1}|` over the whole sweep.

use serde::{Deserialize, Serialize};

use crate::pivoted_lu::{PivotedLu, MAX_SMALL_ORDER};
use crate::sum_of_squares::ScaledSumOfSquares;

/// Strategy used to pick the right-hand side of each small system during a Dif pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DifStrategy {
    /// Sign look-ahead through the triangular solves. Cheap.
    #[default]
    LookAhead,
    /// Approximate null vector from a 1-norm condition estimate, two candidate solves.
    /// Roughly five times the cost of `LookAhead`.
    NullVector,
}

/// Maximum number of refinement steps of the 1-norm estimator.
const MAX_ESTIMATOR_ITERATIONS: usize = 5;

/// Replaces `rhs` by a norm-maximizing solution of the factorized system and folds it
/// into `acc`. `rhs` holds the running right-hand side on entry.
pub fn estimate_contribution(
    strategy: DifStrategy,
    lu: &PivotedLu,
    rhs: &mut [f64],
    acc: &mut ScaledSumOfSquares,
) {
    match strategy {
        DifStrategy::LookAhead => look_ahead_solve(lu, rhs),
        DifStrategy::NullVector => null_vector_solve(lu, rhs),
    }
    acc.accumulate(&rhs[..lu.order()]);
}

/// Forward sweep with `+1`/`-1` entries chosen to grow the propagated right-hand side,
/// then a look-ahead on the last entry of the back substitution.
fn look_ahead_solve(lu: &PivotedLu, rhs: &mut [f64]) {
    let n = lu.order();
    let z = lu.factors();
    let rhs = &mut rhs[..n];

    lu.apply_row_pivots(rhs);

    let mut tie_sign = -1.0;
    for j in 0..n - 1 {
        let bp = rhs[j] + 1.0;
        let bm = rhs[j] - 1.0;

        let mut splus = 1.0;
        let mut sminu = 0.0;
        for k in j + 1..n {
            splus += z[k][j] * z[k][j];
            sminu += z[k][j] * rhs[k];
        }
        splus *= rhs[j];

        if splus > sminu {
            rhs[j] = bp;
        } else if sminu > splus {
            rhs[j] = bm;
        } else {
            // Equal growth either way: -1 the first time, +1 afterwards.
            rhs[j] += tie_sign;
            tie_sign = 1.0;
        }

        let temp = -rhs[j];
        for k in j + 1..n {
            rhs[k] += temp * z[k][j];
        }
    }

    let mut xp = [0.0; MAX_SMALL_ORDER];
    xp[..n].copy_from_slice(rhs);
    xp[n - 1] = rhs[n - 1] + 1.0;
    rhs[n - 1] -= 1.0;

    let mut splus = 0.0;
    let mut sminu = 0.0;
    for i in (0..n).rev() {
        let temp = 1.0 / z[i][i];
        xp[i] *= temp;
        rhs[i] *= temp;
        for k in i + 1..n {
            xp[i] -= xp[k] * (z[i][k] * temp);
            rhs[i] -= rhs[k] * (z[i][k] * temp);
        }
        splus += xp[i].abs();
        sminu += rhs[i].abs();
    }
    if splus > sminu {
        rhs.copy_from_slice(&xp[..n]);
    }

    lu.undo_col_pivots(rhs);
}

/// Two candidate solves `Z x = rhs +- e` with `e` an approximate null vector direction.
fn null_vector_solve(lu: &PivotedLu, rhs: &mut [f64]) {
    let n = lu.order();
    let rhs = &mut rhs[..n];

    let mut xm = approximate_null_vector(lu);
    lu.undo_row_pivots(&mut xm[..n]);

    let norm = xm[..n].iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm.is_finite() && norm > 0.0 {
        xm[..n].iter_mut().for_each(|v| *v /= norm);
    } else {
        let uniform = 1.0 / (n as f64).sqrt();
        xm[..n].iter_mut().for_each(|v| *v = uniform);
    }

    let mut xp = [0.0; MAX_SMALL_ORDER];
    for i in 0..n {
        xp[i] = rhs[i] + xm[i];
        rhs[i] -= xm[i];
    }

    // The protective scales are not needed: only the direction of growth matters here.
    lu.solve_scaled(rhs);
    lu.solve_scaled(&mut xp[..n]);

    let norm_plus: f64 = xp[..n].iter().map(|v| v.abs()).sum();
    let norm_minus: f64 = rhs.iter().map(|v| v.abs()).sum();
    if norm_plus > norm_minus {
        rhs.copy_from_slice(&xp[..n]);
    }
}

/// Hager/Higham estimate of `|(LU)^{-T}|_1` on the factors; returns the vector
/// attaining the estimate, which is dominated by the left singular direction of the
/// smallest singular value of `LU`.
fn approximate_null_vector(lu: &PivotedLu) -> [f64; MAX_SMALL_ORDER] {
    let n = lu.order();

    // Operator under estimation and its transpose.
    let apply = |v: &mut [f64]| {
        lu.forward_upper_transposed(v);
        lu.backward_unit_lower_transposed(v);
    };
    let apply_transposed = |v: &mut [f64]| {
        lu.forward_unit_lower(v);
        lu.backward_upper(v);
    };

    let mut x = [0.0; MAX_SMALL_ORDER];
    x[..n].iter_mut().for_each(|v| *v = 1.0 / n as f64);
    apply(&mut x[..n]);
    if n == 1 {
        return x;
    }

    let mut best: [f64; MAX_SMALL_ORDER];
    let mut estimate = one_norm(&x[..n]);
    let mut signs = [0.0; MAX_SMALL_ORDER];
    for i in 0..n {
        signs[i] = sign_of(x[i]);
        x[i] = signs[i];
    }
    apply_transposed(&mut x[..n]);
    let mut j = arg_max_abs(&x[..n]);

    let mut iteration = 2;
    loop {
        x[..n].iter_mut().for_each(|v| *v = 0.0);
        x[j] = 1.0;
        apply(&mut x[..n]);
        best = x;
        let previous_estimate = estimate;
        estimate = one_norm(&x[..n]);

        let signs_repeated = (0..n).all(|i| sign_of(x[i]) == signs[i]);
        if signs_repeated || estimate <= previous_estimate {
            break;
        }

        for i in 0..n {
            signs[i] = sign_of(x[i]);
            x[i] = signs[i];
        }
        apply_transposed(&mut x[..n]);
        let j_last = j;
        j = arg_max_abs(&x[..n]);
        if x[j_last] == x[j].abs() || iteration >= MAX_ESTIMATOR_ITERATIONS {
            break;
        }
        iteration += 1;
    }

    // Alternating-sign test vector guards against the estimate stalling on
    // structured matrices.
    let mut alt = [0.0; MAX_SMALL_ORDER];
    let mut alt_sign = 1.0;
    for (i, v) in alt.iter_mut().enumerate().take(n) {
        *v = alt_sign * (1.0 + i as f64 / (n - 1) as f64);
        alt_sign = -alt_sign;
    }
    apply(&mut alt[..n]);
    let alt_estimate = 2.0 * one_norm(&alt[..n]) / (3 * n) as f64;
    if alt_estimate > estimate {
        best = alt;
    }

    best
}

fn one_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

fn sign_of(v: f64) -> f64 {
    if v >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// First index of the largest magnitude.
fn arg_max_abs(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, x) in v.iter().enumerate().skip(1) {
        if x.abs() > v[best].abs() {
            best = i;
        }
    }
    best
}
