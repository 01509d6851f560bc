//! Core wire types and codec for the StrataDB client
//!
//! This crate provides the protocol-level building blocks the client runtime
//! is assembled from:
//!
//! - **json**: dependency-free JSON parser, serializer, and builder — the
//!   protocol mandates framing without any third-party serialization library
//! - **envelope**: outbound request envelope, inbound frame view, and the
//!   protocol message-type constants
//! - **request_id**: correlation id generation
//! - **error**: the client error taxonomy
//!
//! The crate is transport-agnostic: it encodes and decodes frames but never
//! touches a socket. `strata-client` builds the connection runtime on top.

pub mod envelope;
pub mod error;
pub mod json;
pub mod request_id;

// Re-export the most commonly used types for convenience
pub use envelope::{encode_request, message_type, Frame};
pub use error::{Error, Result};
pub use json::{JsonBuilder, Object, ParseError, ParseErrorKind, Value};
