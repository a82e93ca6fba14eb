//! Error types for panel assembly.

use thiserror::Error;

/// Result type for panel operations.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Errors that can occur while assembling or checking a panel.
#[derive(Debug, Error)]
pub enum PanelError {
    /// Source or resolution error
    #[error(transparent)]
    Data(#[from] munipanel_data::DataError),

    /// Two rows share the same (entity, year) key
    #[error("Duplicate panel key {entity} in {year} ({context})")]
    DuplicateKey {
        /// Entity key rendered as `code-state`
        entity: String,
        /// Repeated year
        year: i32,
        /// Where the duplicate was found
        context: String,
    },

    /// Years of an entity are not strictly increasing
    #[error("Years of {entity} are not strictly increasing")]
    UnsortedYears {
        /// Entity key rendered as `code-state`
        entity: String,
    },

    /// A lag or lead does not match its base column at the expected offset
    #[error("Temporal column {column} of {entity} disagrees with {base} in {year}")]
    TemporalLeak {
        /// Entity key rendered as `code-state`
        entity: String,
        /// Year of the offending row
        year: i32,
        /// Lag or lead column
        column: String,
        /// Column it is derived from
        base: String,
    },

    /// A column has the wrong number of values for its entity
    #[error("Column {column} of {entity} has {actual} values, expected {expected}")]
    LengthMismatch {
        /// Entity key rendered as `code-state`
        entity: String,
        /// Column name
        column: String,
        /// Number of years of the entity
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// Lag or lead depth that does not fit a calendar offset
    #[error("Offset {k} of {column} is out of range")]
    OffsetOutOfRange {
        /// Column being derived
        column: String,
        /// Requested depth
        k: u32,
    },

    /// Reference to a column that was never derived
    #[error("Unknown panel column: {0}")]
    UnknownColumn(String),

    /// Two entities of the population source share a match key
    #[error("Match key {key} maps to municipalities {first} and {second}")]
    ConflictingEntity {
        /// Match key rendered as `NAME/ST`
        key: String,
        /// First entity
        first: String,
        /// Second entity
        second: String,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
