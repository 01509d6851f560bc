//! Wire envelope and protocol message types
//!
//! Every outbound request is a JSON object `{"id", "type", "data"}` where
//! `data` is the operation payload — JSON text carried as a JSON string.
//! Inbound frames echo the `id`, may carry an `error` string, and otherwise
//! hold operation-specific fields the typed wrappers decode. The handshake
//! is the one inbound frame with no id: `{"type": "ready", ...}`.

use crate::json::{self, JsonBuilder, ParseError, Value};

/// Protocol message type codes.
///
/// These are wire constants; the short forms are what the server matches on.
pub mod message_type {
    pub const INSERT: &str = "ins";
    pub const QUERY_RECORDS: &str = "qry";
    pub const QUERY_COLLECTIONS: &str = "cols";
    pub const QUERY_DOCUMENT: &str = "qdoc";
    pub const DELETE_DOCUMENT: &str = "ddoc";
    pub const DELETE_COLLECTION: &str = "dcol";
    pub const DELETE_RECORD: &str = "drec";
    pub const DELETE_MULTIPLE_RECORDS: &str = "dmrec";
    pub const DELETE_RECORDS_RANGE: &str = "drrng";
    pub const SET_VALUE: &str = "sval";
    pub const GET_VALUE: &str = "gval";
    pub const GET_VALUES: &str = "gvalues";
    pub const REMOVE_VALUE: &str = "rval";
    pub const GET_ALL_VALUES: &str = "gvals";
    pub const GET_ALL_KEYS: &str = "gkeys";
    pub const MANAGE_API_KEYS: &str = "keys";
    pub const CONNECTIONS: &str = "conn";

    /// Handshake frame type sent by the server once authentication succeeds.
    pub const READY: &str = "ready";
}

/// Serialize an outbound request envelope.
///
/// `payload` is JSON text produced by the caller (typically with
/// [`JsonBuilder`]); it travels as a string field, escaped by the codec.
pub fn encode_request(id: &str, message_type: &str, payload: &str) -> String {
    JsonBuilder::new()
        .add("id", id)
        .add("type", message_type)
        .add("data", payload)
        .build()
}

/// A parsed inbound frame.
///
/// Wraps the decoded [`Value`] and exposes the envelope fields the
/// connection manager routes on. Operation-specific fields stay inside the
/// value for the typed wrappers.
#[derive(Debug, Clone)]
pub struct Frame {
    value: Value,
}

impl Frame {
    /// Parse one complete inbound message.
    pub fn parse(text: &str) -> Result<Frame, ParseError> {
        let value = json::parse(text)?;
        Ok(Frame { value })
    }

    /// The correlation id, when present.
    pub fn id(&self) -> Option<&str> {
        self.value.get("id").and_then(Value::as_str)
    }

    /// The frame type, when present. Replies usually omit it.
    pub fn frame_type(&self) -> Option<&str> {
        self.value.get("type").and_then(Value::as_str)
    }

    /// The server-provided error message, when present and non-null.
    pub fn error(&self) -> Option<&str> {
        self.value.get("error").and_then(Value::as_str)
    }

    /// Whether this is the authentication handshake frame.
    pub fn is_ready(&self) -> bool {
        self.frame_type() == Some(message_type::READY)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}
