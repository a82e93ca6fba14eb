//! Pipeline errors.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source parsing, resolution or deflator error
    #[error(transparent)]
    Data(#[from] munipanel_data::DataError),

    /// Panel assembly or integrity error
    #[error(transparent)]
    Panel(#[from] munipanel_panel::PanelError),

    /// Export error
    #[error(transparent)]
    Export(#[from] munipanel_output::ExportError),

    /// One model specification failed; siblings are unaffected
    #[error("Model {model} failed: {source}")]
    Model {
        /// Specification name
        model: String,
        /// Cause
        #[source]
        source: munipanel_regression::RegressionError,
    },

    /// A specification needs a panel variant that was not built
    #[error("Panel variant {variant} is not available for model {model}")]
    MissingVariant {
        /// Specification name
        model: String,
        /// Required variant
        variant: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

impl PipelineError {
    /// Name of the failed specification, for per-model errors.
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::Model { model, .. } | Self::MissingVariant { model, .. } => Some(model),
            _ => None,
        }
    }
}
