// src/pivoted_lu.rs

use crate::machine::MachineConstants;
use crate::ThreadSafeStdError;

/// Largest order of a small system handled here (a 2x2 block against a 2x2 block).
pub const MAX_SMALL_ORDER: usize = 8;

/// LU factorization with complete pivoting of a dense system of order at most 8.
///
/// After `factorize`, `factors` holds `L` strictly below the diagonal (unit diagonal
/// implied) and `U` on and above it, such that `Z = P * L * U * Q` where `P` is built
/// from `ipiv` (row `i` was swapped with row `ipiv[i]` at step `i`) and `Q` likewise
/// from `jpiv` for columns.
///
/// Storage is a fixed 8x8 row-major buffer; only the leading `n x n` part is used.
#[derive(Debug, Clone)]
pub struct PivotedLu {
    n: usize,
    factors: [[f64; MAX_SMALL_ORDER]; MAX_SMALL_ORDER],
    ipiv: [usize; MAX_SMALL_ORDER],
    jpiv: [usize; MAX_SMALL_ORDER],
    perturbed_pivot: Option<usize>,
}

impl PivotedLu {
    /// Factorizes the leading `n x n` part of `z`.
    ///
    /// A pivot smaller than `max(eps * max|z|, small_num)` is replaced by that threshold;
    /// the index of the last such pivot is kept in `perturbed_pivot()`. This is how
    /// numerically singular systems are handled: they are never reported as errors.
    ///
    /// # Errors
    /// Returns an error if `n` is 0 or larger than 8.
    pub fn factorize(
        mut z: [[f64; MAX_SMALL_ORDER]; MAX_SMALL_ORDER],
        n: usize,
    ) -> Result<Self, ThreadSafeStdError> {
        if n == 0 || n > MAX_SMALL_ORDER {
            return Err(format!(
                "Small system order must be between 1 and {}, got {}.",
                MAX_SMALL_ORDER, n
            )
            .into());
        }

        let consts = MachineConstants::f64();
        let mut ipiv = [0usize; MAX_SMALL_ORDER];
        let mut jpiv = [0usize; MAX_SMALL_ORDER];
        let mut perturbed_pivot = None;

        if n == 1 {
            if z[0][0].abs() < consts.small_num {
                perturbed_pivot = Some(0);
                z[0][0] = consts.small_num;
            }
            return Ok(Self {
                n,
                factors: z,
                ipiv,
                jpiv,
                perturbed_pivot,
            });
        }

        let mut smin = 0.0;
        for i in 0..n - 1 {
            // Largest entry of the trailing submatrix; ties keep the last one scanned.
            let mut xmax = 0.0;
            let mut ipv = i;
            let mut jpv = i;
            for ip in i..n {
                for jp in i..n {
                    if z[ip][jp].abs() >= xmax {
                        xmax = z[ip][jp].abs();
                        ipv = ip;
                        jpv = jp;
                    }
                }
            }
            if i == 0 {
                smin = (consts.eps * xmax).max(consts.small_num);
            }

            if ipv != i {
                z.swap(ipv, i);
            }
            ipiv[i] = ipv;

            if jpv != i {
                for row in z.iter_mut().take(n) {
                    row.swap(jpv, i);
                }
            }
            jpiv[i] = jpv;

            if z[i][i].abs() < smin {
                perturbed_pivot = Some(i);
                z[i][i] = smin;
            }

            let pivot = z[i][i];
            for j in i + 1..n {
                z[j][i] /= pivot;
            }
            // Rank-1 update of the trailing submatrix.
            for j in i + 1..n {
                let multiplier = z[j][i];
                if multiplier == 0.0 {
                    continue;
                }
                for k in i + 1..n {
                    z[j][k] -= multiplier * z[i][k];
                }
            }
        }

        if z[n - 1][n - 1].abs() < smin {
            perturbed_pivot = Some(n - 1);
            z[n - 1][n - 1] = smin;
        }
        ipiv[n - 1] = n - 1;
        jpiv[n - 1] = n - 1;

        Ok(Self {
            n,
            factors: z,
            ipiv,
            jpiv,
            perturbed_pivot,
        })
    }

    /// Order of the factorized system.
    pub fn order(&self) -> usize {
        self.n
    }

    /// Index of the last pivot that had to be perturbed, if any.
    pub fn perturbed_pivot(&self) -> Option<usize> {
        self.perturbed_pivot
    }

    /// Combined `L\U` factors (leading `n x n` part).
    pub fn factors(&self) -> &[[f64; MAX_SMALL_ORDER]; MAX_SMALL_ORDER] {
        &self.factors
    }

    pub fn row_pivots(&self) -> &[usize] {
        &self.ipiv[..self.n]
    }

    pub fn col_pivots(&self) -> &[usize] {
        &self.jpiv[..self.n]
    }

    /// `U[i, i]` of the factorization.
    #[cfg(test)]
    pub(crate) fn u_diag(&self, i: usize) -> f64 {
        self.factors[i][i]
    }

    /// Applies the row interchanges in factorization order.
    pub(crate) fn apply_row_pivots(&self, rhs: &mut [f64]) {
        for i in 0..self.n - 1 {
            rhs.swap(i, self.ipiv[i]);
        }
    }

    /// Undoes the row interchanges (reverse order).
    pub(crate) fn undo_row_pivots(&self, rhs: &mut [f64]) {
        for i in (0..self.n - 1).rev() {
            rhs.swap(i, self.ipiv[i]);
        }
    }

    /// Undoes the column interchanges on a solution vector (reverse order).
    pub(crate) fn undo_col_pivots(&self, x: &mut [f64]) {
        for i in (0..self.n - 1).rev() {
            x.swap(i, self.jpiv[i]);
        }
    }

    /// Solves `Z * x = scale * rhs` in place and returns `scale`.
    ///
    /// Before back substitution through `U`, the partially solved vector is scaled by
    /// `0.5 / max|rhs|` whenever `2 * small_num * max|rhs| > |U[n-1, n-1]|`, so the
    /// components of the solution stay representable even for a perturbed `U`.
    ///
    /// `rhs` must hold at least `order()` entries; only the leading ones are used.
    pub fn solve_scaled(&self, rhs: &mut [f64]) -> f64 {
        let n = self.n;
        let rhs = &mut rhs[..n];
        let small_num = MachineConstants::f64().small_num;

        self.apply_row_pivots(rhs);
        self.forward_unit_lower(rhs);

        let mut scale = 1.0;
        let largest = rhs.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        if 2.0 * small_num * largest > self.factors[n - 1][n - 1].abs() {
            let factor = 0.5 / largest;
            rhs.iter_mut().for_each(|v| *v *= factor);
            scale *= factor;
        }

        self.backward_upper(rhs);
        self.undo_col_pivots(rhs);
        scale
    }

    /// `L^{-1} * v` for the unit lower factor.
    pub(crate) fn forward_unit_lower(&self, v: &mut [f64]) {
        let n = self.n;
        for i in 0..n.saturating_sub(1) {
            let vi = v[i];
            for j in i + 1..n {
                v[j] -= self.factors[j][i] * vi;
            }
        }
    }

    /// `U^{-1} * v`.
    pub(crate) fn backward_upper(&self, v: &mut [f64]) {
        let n = self.n;
        for i in (0..n).rev() {
            let temp = 1.0 / self.factors[i][i];
            v[i] *= temp;
            for j in i + 1..n {
                v[i] -= v[j] * (self.factors[i][j] * temp);
            }
        }
    }

    /// `U^{-T} * v` (forward substitution with the transposed upper factor).
    pub(crate) fn forward_upper_transposed(&self, v: &mut [f64]) {
        let n = self.n;
        for i in 0..n {
            let mut acc = v[i];
            for k in 0..i {
                acc -= self.factors[k][i] * v[k];
            }
            v[i] = acc / self.factors[i][i];
        }
    }

    /// `L^{-T} * v` (backward substitution with the transposed unit lower factor).
    pub(crate) fn backward_unit_lower_transposed(&self, v: &mut [f64]) {
        let n = self.n;
        for i in (0..n).rev() {
            let mut acc = v[i];
            for k in i + 1..n {
                acc -= self.factors[k][i] * v[k];
            }
            v[i] = acc;
        }
    }
}
