//! Error types for the entity-outliers library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum OutlierError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Type lookup failed for entity '{entity}': {reason}")]
    Lookup { entity: String, reason: String },

    #[error("No viable clustering: all {n_candidates} candidate configurations failed to fit")]
    NoViableModel { n_candidates: usize },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, OutlierError>;
