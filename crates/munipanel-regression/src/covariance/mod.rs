//! Parameter covariance estimation
//!
//! Every estimator here is a sandwich around the bread `(X̃'X̃)^{-1}` of the
//! demeaned design:
//! ```text
//! V = (X̃'X̃)^{-1} · M · (X̃'X̃)^{-1}
//! ```
//! and differs only in the meat `M`. The unadjusted estimator collapses the
//! sandwich to `s²(X̃'X̃)^{-1}`.

pub mod cluster;
pub mod robust;
pub mod utils;

pub use cluster::{ClusterConfig, ClusteredEstimator, TwoWayClusteredEstimator};
pub use robust::{RobustEstimator, UnadjustedEstimator};
pub use utils::{
    EigenDecomposition, PositiveDefiniteConfig, condition_number, enforce_positive_definite,
    is_positive_semidefinite, jacobi_eigendecomp,
};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during covariance estimation
#[derive(Debug, Error)]
pub enum CovarianceError {
    /// Fewer than two clusters in a clustering dimension
    #[error("Insufficient clusters along {dimension}: need at least 2, got {actual}")]
    InsufficientClusters {
        /// Clustering dimension
        dimension: String,
        /// Distinct clusters found
        actual: usize,
    },

    /// No residual degrees of freedom left
    #[error("No residual degrees of freedom ({nobs} observations)")]
    NoResidualDof {
        /// Observations
        nobs: usize,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Everything a sandwich estimator needs.
#[derive(Debug, Clone, Copy)]
pub struct SandwichInputs<'a> {
    /// Demeaned design (n × k)
    pub x: &'a Array2<f64>,
    /// Residuals of the demeaned regression
    pub residuals: &'a Array1<f64>,
    /// `(X̃'X̃)^{-1}`
    pub bread: &'a Array2<f64>,
    /// Residual degrees of freedom after absorbed effects
    pub df_resid: usize,
}

impl SandwichInputs<'_> {
    /// Number of observations.
    pub fn nobs(&self) -> usize {
        self.x.nrows()
    }

    /// Number of regressors.
    pub fn params(&self) -> usize {
        self.x.ncols()
    }

    pub(crate) fn check(&self) -> Result<(), CovarianceError> {
        let (n, k) = self.x.dim();
        if self.residuals.len() != n {
            return Err(CovarianceError::DimensionMismatch {
                expected: n,
                actual: self.residuals.len(),
            });
        }
        if self.bread.dim() != (k, k) {
            return Err(CovarianceError::DimensionMismatch {
                expected: k,
                actual: self.bread.nrows(),
            });
        }
        if self.df_resid == 0 {
            return Err(CovarianceError::NoResidualDof { nobs: n });
        }
        Ok(())
    }

    /// Scores `x_i · u_i` as an n × k matrix.
    pub(crate) fn scores(&self) -> Array2<f64> {
        let mut scores = self.x.clone();
        for (mut row, &u) in scores.rows_mut().into_iter().zip(self.residuals.iter()) {
            row.mapv_inplace(|v| v * u);
        }
        scores
    }
}

/// Trait for parameter covariance estimators
pub trait CovarianceEstimator {
    /// Estimate the k × k parameter covariance.
    fn estimate(&self, inputs: &SandwichInputs<'_>) -> Result<Array2<f64>, CovarianceError>;

    /// Label reported with the fitted model.
    fn name(&self) -> String;
}

/// Clustering dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterBy {
    /// Entity (municipality)
    Entity,
    /// Time period
    Time,
    /// Entity and time, two-way
    EntityAndTime,
    /// Values of a panel column, e.g. the state
    Column(String),
}

impl fmt::Display for ClusterBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity => write!(f, "entity"),
            Self::Time => write!(f, "time"),
            Self::EntityAndTime => write!(f, "entity+time"),
            Self::Column(name) => write!(f, "{name}"),
        }
    }
}

/// Covariance choice for a fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CovarianceType {
    /// Homoskedastic `s²(X̃'X̃)^{-1}`
    Unadjusted,
    /// Heteroskedasticity-robust (HC0)
    Robust,
    /// Cluster-robust
    Clustered(ClusterBy),
}

impl Default for CovarianceType {
    fn default() -> Self {
        Self::Clustered(ClusterBy::Entity)
    }
}

impl CovarianceType {
    /// Clustering dimension, if any.
    pub const fn clustering(&self) -> Option<&ClusterBy> {
        match self {
            Self::Unadjusted | Self::Robust => None,
            Self::Clustered(by) => Some(by),
        }
    }

    /// Label stored with results.
    pub fn label(&self) -> String {
        match self {
            Self::Unadjusted => "unadjusted".to_string(),
            Self::Robust => "robust".to_string(),
            Self::Clustered(by) => format!("clustered({by})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(CovarianceType::Robust.label(), "robust");
        assert_eq!(CovarianceType::default().label(), "clustered(entity)");
        assert_eq!(
            CovarianceType::Clustered(ClusterBy::Column("state".into())).label(),
            "clustered(state)"
        );
        assert_eq!(
            CovarianceType::Clustered(ClusterBy::EntityAndTime).label(),
            "clustered(entity+time)"
        );
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&CovarianceType::Clustered(ClusterBy::Column("state".into()))).unwrap();
        assert_eq!(json, r#"{"clustered":{"column":"state"}}"#);
        let back: CovarianceType = serde_json::from_str(r#"{"clustered":"entity"}"#).unwrap();
        assert_eq!(back, CovarianceType::Clustered(ClusterBy::Entity));
    }
}
