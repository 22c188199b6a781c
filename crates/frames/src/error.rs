//! Error types for result frame processing

use arrow::error::ArrowError;
use thiserror::Error;

/// Result type for frame operations
pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors that can occur while decoding or reshaping result frames
#[derive(Error, Debug)]
pub enum FrameError {
    /// Error building Arrow data structures
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A serviceTags value is not valid JSON
    #[error("Invalid serviceTags JSON at row {row}: {source}")]
    ServiceTags {
        row: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A cell does not match its declared column type
    #[error("Invalid value for column {column} at row {row}: expected {expected}, got {value}")]
    InvalidValue {
        column: String,
        row: usize,
        expected: String,
        value: String,
    },

    /// A row has a different number of cells than the table has columns
    #[error("Row {row} has {actual} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
}
