//! Error types for estimation and testing.

use crate::covariance::CovarianceError;
use thiserror::Error;

/// Result type for regression operations.
pub type Result<T> = std::result::Result<T, RegressionError>;

/// Regression errors
#[derive(Debug, Error)]
pub enum RegressionError {
    /// Regressors are linearly dependent once fixed effects are absorbed
    #[error("Rank-deficient design: {} collinear with earlier columns or absorbed by fixed effects", .columns.join(", "))]
    RankDeficient {
        /// Offending columns, in design order
        columns: Vec<String>,
    },

    /// Too few complete observations to identify the model
    #[error("Insufficient observations: {nobs} rows for {params} parameters and {absorbed} absorbed effects")]
    InsufficientObservations {
        /// Complete rows
        nobs: usize,
        /// Regressors
        params: usize,
        /// Absorbed degrees of freedom
        absorbed: usize,
    },

    /// Column referenced by the model is absent from the panel
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Coefficient referenced by a test is not in the model
    #[error("Unknown coefficient: {0}")]
    UnknownCoefficient(String),

    /// Restriction formula could not be parsed
    #[error("Invalid restriction '{formula}': {reason}")]
    InvalidRestriction {
        /// Formula as written
        formula: String,
        /// What went wrong
        reason: String,
    },

    /// Restrictions are linearly dependent
    #[error("Restrictions {} are linearly dependent on earlier ones", .rows.join(", "))]
    DependentRestrictions {
        /// Offending restrictions
        rows: Vec<String>,
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

    /// Covariance estimation error
    #[error("Covariance error: {0}")]
    Covariance(#[from] CovarianceError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
