//! Error types used by the crate.

use thiserror::Error;

/// Veduta error type.
#[derive(Debug, Error)]
pub enum VedutaError {
    /// The external style surface rejected a mutation.
    #[error("style mutation failed: {0}")]
    StyleMutation(String),
    /// Item not found.
    #[error("item not found")]
    NotFound,
    /// The location provider reported a failure.
    #[error("location provider failure: {0}")]
    Provider(String),
    /// Generic error - details are inside.
    #[error("{0}")]
    Generic(String),
}
