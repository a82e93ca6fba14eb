//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Match-key sets of two sources differ beyond the accepted residual
    #[error(
        "Resolution mismatch: {} key(s) only in {left}, {} key(s) only in {right}",
        only_left.len(),
        only_right.len()
    )]
    ResolutionMismatch {
        /// Name of the left source
        left: String,
        /// Name of the right source
        right: String,
        /// Keys present only in the left source, rendered as `NAME/ST`
        only_left: Vec<String>,
        /// Keys present only in the right source, rendered as `NAME/ST`
        only_right: Vec<String>,
    },

    /// Two rows of one source normalize to the same match key
    #[error("Ambiguous match key {key} in {source_name}: rows {first} and {second}")]
    AmbiguousMatchKey {
        /// Source table name
        source_name: String,
        /// Offending key, rendered as `NAME/ST`
        key: String,
        /// First row index
        first: usize,
        /// Second row index
        second: usize,
    },

    /// Reference year absent from a price series
    #[error("Deflator {series} cannot be anchored: reference year {year} is missing")]
    AnchorYearMissing {
        /// Price series name
        series: String,
        /// Requested reference year
        year: i32,
    },

    /// Duplicate year in a price series
    #[error("Deflator {series} has duplicate year {year}")]
    DuplicateYear {
        /// Price series name
        series: String,
        /// Repeated year
        year: i32,
    },

    /// State could not be derived for a source row
    #[error("Unknown state for {source_name} row {row}: {value}")]
    UnknownState {
        /// Source table name
        source_name: String,
        /// Row index in the source
        row: usize,
        /// Raw value the state was derived from
        value: String,
    },

    /// Required column absent from a source table
    #[error("Missing column {column} in {source_name}")]
    MissingColumn {
        /// Source table name
        source_name: String,
        /// Column name
        column: String,
    },

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
