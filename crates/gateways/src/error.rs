//! Gateway-level error type.

use thiserror::Error;

/// Errors returned by an external collaborator.
///
/// The engine wraps these with the name of the step that made the call:
/// - `NotFound`: the addressed tool/template/key does not exist.
/// - `Unavailable`: the collaborator could not be reached.
/// - `Failed`: the collaborator ran and reported an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),
}
