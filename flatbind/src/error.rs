//! Error types for the generation engine.

use thiserror::Error;

/// Errors raised while emitting wrappers and registration tables.
///
/// `MissingInformation` is recoverable at the granularity of a single
/// wrapper, and only the static-call wrapper pass actually recovers (it
/// warns and moves on). An I/O failure on the output sink aborts the run.
#[derive(Debug, Error)]
pub enum GenError {
    /// A required fact about the program model could not be resolved
    /// (typically an unresolved parameter or return type).
    #[error("missing information: {0}")]
    MissingInformation(String),

    /// The output sink failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GenError>;
