//! Reference distributions for coefficient and Wald inference.

use crate::{RegressionError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

/// Distribution used for t-statistics and confidence intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Standard normal
    Normal,
    /// Student-t with the residual degrees of freedom
    #[default]
    StudentT,
}

impl Distribution {
    /// `P(|T| > |t|)`.
    pub fn two_sided_p(&self, t: f64, df: usize) -> Result<f64> {
        if !t.is_finite() {
            return Ok(f64::NAN);
        }
        let upper = match self {
            Self::Normal => 1.0 - standard_normal()?.cdf(t.abs()),
            Self::StudentT => 1.0 - students_t(df)?.cdf(t.abs()),
        };
        Ok((2.0 * upper).clamp(0.0, 1.0))
    }

    /// Two-sided critical value at the given confidence level.
    pub fn critical_value(&self, confidence: f64, df: usize) -> Result<f64> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(RegressionError::InvalidParameter(format!(
                "confidence level {confidence} outside (0, 1)"
            )));
        }
        let q = 0.5 + confidence / 2.0;
        Ok(match self {
            Self::Normal => standard_normal()?.inverse_cdf(q),
            Self::StudentT => students_t(df)?.inverse_cdf(q),
        })
    }
}

/// Upper tail of χ²(df).
pub fn chi_squared_sf(statistic: f64, df: usize) -> Result<f64> {
    if !statistic.is_finite() {
        return Ok(f64::NAN);
    }
    let dist = ChiSquared::new(df as f64)
        .map_err(|e| RegressionError::InvalidParameter(format!("chi-squared({df}): {e}")))?;
    Ok((1.0 - dist.cdf(statistic.max(0.0))).clamp(0.0, 1.0))
}

/// Upper tail of F(df_num, df_denom).
pub fn f_sf(statistic: f64, df_num: usize, df_denom: usize) -> Result<f64> {
    if !statistic.is_finite() {
        return Ok(f64::NAN);
    }
    let dist = FisherSnedecor::new(df_num as f64, df_denom as f64).map_err(|e| {
        RegressionError::InvalidParameter(format!("F({df_num}, {df_denom}): {e}"))
    })?;
    Ok((1.0 - dist.cdf(statistic.max(0.0))).clamp(0.0, 1.0))
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| RegressionError::InvalidParameter(e.to_string()))
}

fn students_t(df: usize) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, df as f64)
        .map_err(|e| RegressionError::InvalidParameter(format!("Student-t({df}): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[rstest]
    #[case(1.959963984540054, 0.05)]
    #[case(0.0, 1.0)]
    #[case(-2.5758293035489, 0.01)]
    fn test_normal_two_sided(#[case] t: f64, #[case] p: f64) {
        assert_abs_diff_eq!(Distribution::Normal.two_sided_p(t, 0).unwrap(), p, epsilon = 1e-9);
    }

    #[test]
    fn test_critical_values() {
        assert_abs_diff_eq!(
            Distribution::Normal.critical_value(0.95, 0).unwrap(),
            1.959963984540054,
            epsilon = 1e-8
        );
        // t(10) 97.5% quantile
        assert_abs_diff_eq!(
            Distribution::StudentT.critical_value(0.95, 10).unwrap(),
            2.2281388519649,
            epsilon = 1e-6
        );
        assert!(Distribution::Normal.critical_value(1.5, 0).is_err());
    }

    #[test]
    fn test_tails() {
        // χ²(1) at 3.841459 is the 95% quantile
        assert_abs_diff_eq!(chi_squared_sf(3.841458820694124, 1).unwrap(), 0.05, epsilon = 1e-8);
        assert_abs_diff_eq!(chi_squared_sf(0.0, 3).unwrap(), 1.0, epsilon = 1e-12);
        // F(1, d) equals t(d)²
        let t = 2.2281388519649;
        assert_abs_diff_eq!(f_sf(t * t, 1, 10).unwrap(), 0.05, epsilon = 1e-6);
    }
}
