//! Error types for study-core.

use thiserror::Error;

/// Result type alias using StudyError.
pub type Result<T> = std::result::Result<T, StudyError>;

/// Errors raised by domain validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StudyError {
    #[error("quality rating {0} is outside 0..=5")]
    InvalidQuality(u8),

    #[error("unknown favorite kind: {0}")]
    UnknownFavoriteKind(String),
}
