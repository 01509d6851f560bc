//! Error types for the StrataDB client
//!
//! One error enum covers the whole client surface so callers can match
//! exhaustively on the failure kind. Every variant is `Clone`: a single
//! connection loss fans the same error out to every pending request slot.
//!
//! # Taxonomy
//!
//! - **Connection**: transport unreachable, closed, or a write failed.
//! - **Authentication**: the server rejected the handshake.
//! - **Timeout**: the connect-level or a per-request deadline elapsed.
//! - **Protocol**: a malformed frame; codec [`ParseError`]s convert into it.
//! - **Server**: the reply carried an explicit `error` field.
//!
//! Each call resolves with exactly one of typed success, `Connection`,
//! `Timeout`, `Server`, or `Protocol`; nothing is silently dropped.

use crate::json::ParseError;
use thiserror::Error;

/// Result type for StrataDB client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Client error.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Transport unreachable, closed, or a write failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected the authentication handshake.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A connect-level or per-request deadline elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A frame that does not follow the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The reply carried an explicit server-side error message.
    #[error("server error: {0}")]
    Server(String),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Protocol(err.to_string())
    }
}
