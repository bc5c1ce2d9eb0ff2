use std::path::PathBuf;

use crate::agent::protocol::MAX_FRAME_SIZE;

pub type Result<T, E = SignerError> = std::result::Result<T, E>;

/// Failures surfaced by [`AgentSigner`](crate::AgentSigner) construction and signing.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("{0} is not set")]
    Config(&'static str),
    #[error("error dialing SSH agent at {}: {source}", .path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error listing keys in SSH agent: {0}")]
    AgentList(#[source] AgentError),
    #[error("no key in the SSH agent matches fingerprint: {0}")]
    KeyNotFound(String),
    #[error("unsupported algorithm from SSH agent: {0}")]
    UnsupportedAlgorithm(String),
    #[error("error reading {format} signature: {reason}")]
    SignatureDecode { format: String, reason: String },
    #[error("error signing {operation}: {source}")]
    Signing {
        operation: &'static str,
        #[source]
        source: AgentError,
    },
}

/// Failures of a single agent protocol round-trip.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("agent refused the request")]
    Failure,
    #[error("unexpected agent message type {0}")]
    UnexpectedMessage(u8),
    #[error("agent frame too large: {0} bytes (max {max})", max = MAX_FRAME_SIZE)]
    FrameTooLarge(u32),
    #[error("empty agent frame")]
    EmptyFrame,
    #[error("malformed agent message: {0}")]
    Malformed(#[from] ssh_encoding::Error),
    #[error("agent connection is out of sync after an earlier failed exchange")]
    Desynchronized,
}
