//! Per-series value policies and the row-wise transforms built on them.

use serde::{Deserialize, Serialize};

/// Admissible range of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuePolicy {
    /// Values `<= 0` are structural errors (population, GDP)
    StrictlyPositive,
    /// Negative values are structural errors (disbursements)
    NonNegative,
    /// Any finite value is admissible (value added)
    AnyFinite,
}

impl ValuePolicy {
    /// Keep `value` if it satisfies the policy.
    pub fn admit(self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let ok = match self {
            Self::StrictlyPositive => value > 0.0,
            Self::NonNegative => value >= 0.0,
            Self::AnyFinite => true,
        };
        ok.then_some(value)
    }
}

/// Natural log, defined for strictly positive values only.
pub fn ln(x: f64) -> Option<f64> {
    (x > 0.0).then(|| x.ln())
}

/// Inverse hyperbolic sine.
pub fn asinh(x: f64) -> Option<f64> {
    Some(x.asinh())
}

/// Ratio with a non-zero denominator.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator != 0.0).then(|| numerator / denominator)
}
