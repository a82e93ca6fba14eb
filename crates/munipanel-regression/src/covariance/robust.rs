//! Homoskedastic and heteroskedasticity-robust covariance
//!
//! ```text
//! unadjusted:  V = s² (X̃'X̃)^{-1},          s² = Σ u_i² / df_resid
//! robust:      V = (X̃'X̃)^{-1} (Σ u_i² x_i x_i') (X̃'X̃)^{-1}   · c
//!              c = n / df_resid when debiased, else 1
//! ```
//!
//! # References
//! - White, H. (1980). "A Heteroskedasticity-Consistent Covariance Matrix
//!   Estimator and a Direct Test for Heteroskedasticity." Econometrica,
//!   48(4), 817-838.

use super::{CovarianceError, CovarianceEstimator, SandwichInputs};
use crate::linalg::{sandwich, symmetrize};
use ndarray::Array2;

/// `s² (X̃'X̃)^{-1}`
#[derive(Debug, Clone, Copy, Default)]
pub struct UnadjustedEstimator;

impl CovarianceEstimator for UnadjustedEstimator {
    fn estimate(&self, inputs: &SandwichInputs<'_>) -> Result<Array2<f64>, CovarianceError> {
        inputs.check()?;
        let rss: f64 = inputs.residuals.iter().map(|u| u * u).sum();
        let s2 = rss / inputs.df_resid as f64;
        Ok(inputs.bread * s2)
    }

    fn name(&self) -> String {
        "unadjusted".to_string()
    }
}

/// White (HC0) sandwich
#[derive(Debug, Clone, Copy, Default)]
pub struct RobustEstimator {
    debiased: bool,
}

impl RobustEstimator {
    /// Create an estimator; `debiased` rescales by `n / df_resid`.
    pub const fn new(debiased: bool) -> Self {
        Self { debiased }
    }
}

impl CovarianceEstimator for RobustEstimator {
    fn estimate(&self, inputs: &SandwichInputs<'_>) -> Result<Array2<f64>, CovarianceError> {
        inputs.check()?;
        let scores = inputs.scores();
        let meat = scores.t().dot(&scores);
        let mut cov = symmetrize(&sandwich(inputs.bread, &meat));
        if self.debiased {
            cov *= inputs.nobs() as f64 / inputs.df_resid as f64;
        }
        Ok(cov)
    }

    fn name(&self) -> String {
        "robust".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, array};

    fn inputs_parts() -> (Array2<f64>, Array1<f64>, Array2<f64>) {
        let x = array![[1.0], [-1.0], [2.0], [-2.0]];
        let u = array![0.5, -0.5, 1.0, 1.0];
        let bread = array![[1.0 / 10.0]];
        (x, u, bread)
    }

    #[test]
    fn test_unadjusted_scalar() {
        let (x, u, bread) = inputs_parts();
        let inputs = SandwichInputs {
            x: &x,
            residuals: &u,
            bread: &bread,
            df_resid: 2,
        };
        let cov = UnadjustedEstimator.estimate(&inputs).unwrap();
        // RSS = 2.5, s² = 1.25
        assert_abs_diff_eq!(cov[[0, 0]], 0.125, epsilon = 1e-15);
    }

    #[test]
    fn test_robust_scalar() {
        let (x, u, bread) = inputs_parts();
        let inputs = SandwichInputs {
            x: &x,
            residuals: &u,
            bread: &bread,
            df_resid: 2,
        };
        // meat = 0.25 + 0.25 + 4 + 4 = 8.5
        let cov = RobustEstimator::new(false).estimate(&inputs).unwrap();
        assert_abs_diff_eq!(cov[[0, 0]], 0.085, epsilon = 1e-15);
        let debiased = RobustEstimator::new(true).estimate(&inputs).unwrap();
        assert_abs_diff_eq!(debiased[[0, 0]], 0.17, epsilon = 1e-15);
    }

    #[test]
    fn test_zero_dof_rejected() {
        let (x, u, bread) = inputs_parts();
        let inputs = SandwichInputs {
            x: &x,
            residuals: &u,
            bread: &bread,
            df_resid: 0,
        };
        assert!(matches!(
            UnadjustedEstimator.estimate(&inputs),
            Err(CovarianceError::NoResidualDof { .. })
        ));
    }
}
