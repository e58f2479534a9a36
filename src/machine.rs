// src/machine.rs

/// Floating-point constants shared by the factorization, the scaled solves and the
/// Dif estimator. Mirrors the usual `eps` / `safe minimum` pair and the derived
/// thresholds used to decide when a pivot is perturbed or a right-hand side rescaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineConstants {
    /// Relative machine precision.
    pub eps: f64,
    /// Smallest positive normalized number; its reciprocal does not overflow.
    pub safe_min: f64,
    /// `safe_min / eps`: pivots and scaled entries are never allowed below this.
    pub small_num: f64,
}

impl MachineConstants {
    pub fn f64() -> Self {
        let eps = f64::EPSILON;
        let safe_min = f64::MIN_POSITIVE;
        let small_num = safe_min / eps;
        Self {
            eps,
            safe_min,
            small_num,
        }
    }
}

impl Default for MachineConstants {
    fn default() -> Self {
        Self::f64()
    }
}
