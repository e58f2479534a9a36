// src/sum_of_squares.rs

use serde::{Deserialize, Serialize};

/// Running sum of squares kept as a `(scale, sum_sq)` pair.
///
/// The represented value is `scale * sqrt(sum_sq)`; the product is never formed while
/// accumulating, so neither overflow nor underflow can occur however large or small
/// the observed entries are. `sum_sq >= 1` holds whenever `scale > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledSumOfSquares {
    pub scale: f64,
    pub sum_sq: f64,
}

impl Default for ScaledSumOfSquares {
    fn default() -> Self {
        Self::new()
    }
}

impl ScaledSumOfSquares {
    /// The empty accumulator `(0, 1)`.
    pub fn new() -> Self {
        Self {
            scale: 0.0,
            sum_sq: 1.0,
        }
    }

    /// Folds every entry of `values` into the accumulator.
    pub fn accumulate(&mut self, values: &[f64]) {
        for &value in values {
            self.push(value);
        }
    }

    /// Folds a single observation into the accumulator.
    pub fn push(&mut self, value: f64) {
        if value.is_nan() {
            self.sum_sq = f64::NAN;
            return;
        }
        if value == 0.0 {
            return;
        }
        let magnitude = value.abs();
        if self.scale < magnitude {
            let ratio = self.scale / magnitude;
            self.sum_sq = 1.0 + self.sum_sq * ratio * ratio;
            self.scale = magnitude;
        } else {
            let ratio = magnitude / self.scale;
            self.sum_sq += ratio * ratio;
        }
    }

    /// `true` until a nonzero observation has been folded in.
    pub fn is_empty(&self) -> bool {
        self.scale == 0.0
    }

    /// `scale * sqrt(sum_sq)`; may overflow only if the true norm does.
    pub fn norm(&self) -> f64 {
        self.scale * self.sum_sq.sqrt()
    }
}
