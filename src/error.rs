use std::path::PathBuf;
use thiserror::Error;

/// Validation and loading failures raised by the document model itself.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A list-typed text block requires both a guid and a reference.
    #[error("structured text of type list requires both guid and reference")]
    InvalidStructuredText,

    #[error("failed to read statute file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to deserialize statute: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures raised while parsing a Retsinformation HTML document.
///
/// All variants are fatal: the parser never recovers or returns a partial
/// tree. The caller of the parse entry point sees exactly one of these.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("input file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse HTML document: {0}")]
    Html(String),

    /// An expected element or attribute could not be located.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// An element was found but its content did not match the expected pattern.
    #[error("malformed field: {0}")]
    MalformedField(&'static str),

    /// A structural precondition of the flat document walk was violated.
    #[error("structural error: found {0}")]
    Structural(&'static str),

    #[error(transparent)]
    Model(#[from] ModelError),
}
