//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while decoding or encoding messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Binary frames are not supported")]
    UnexpectedBinary,
}
