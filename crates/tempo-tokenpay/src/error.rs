use thiserror::Error;

use crate::machine::FailureReason;

/// Errors returned by tokenpay operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A transaction was rejected or failed at the gateway. `cause` carries
    /// the provider's message verbatim.
    #[error("{reason}: {cause}")]
    Submission { reason: FailureReason, cause: String },

    #[error("allowance query failed: {0}")]
    Query(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("config error: {0}")]
    Config(String),
}
