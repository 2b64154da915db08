use thiserror::Error;

/// Errors that can occur in the lease protocol.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
