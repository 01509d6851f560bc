//! Typed request parameters and response models
//!
//! Thin data types for the operation surface. Response types decode
//! themselves from a parsed [`Value`]; a reply that does not match the
//! expected shape is a protocol error.

use strata_core::{Error, JsonBuilder, Result, Value};

/// Access scope of an API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyScope {
    ReadOnly,
    ReadWrite,
    ReadWriteDelete,
}

impl ApiKeyScope {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ApiKeyScope::ReadOnly => "readonly",
            ApiKeyScope::ReadWrite => "read_write",
            ApiKeyScope::ReadWriteDelete => "read_write_delete",
        }
    }

    pub fn from_wire(text: &str) -> Result<Self> {
        match text {
            "readonly" => Ok(ApiKeyScope::ReadOnly),
            "read_write" => Ok(ApiKeyScope::ReadWrite),
            "read_write_delete" => Ok(ApiKeyScope::ReadWriteDelete),
            other => Err(Error::Protocol(format!("unknown api key scope `{other}`"))),
        }
    }
}

impl std::fmt::Display for ApiKeyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One time-series record to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInsert {
    pub col: String,
    pub doc: String,
    pub ts: i64,
    pub data: String,
}

impl RecordInsert {
    pub fn new(
        col: impl Into<String>,
        doc: impl Into<String>,
        ts: i64,
        data: impl Into<String>,
    ) -> Self {
        Self {
            col: col.into(),
            doc: doc.into(),
            ts,
            data: data.into(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        JsonBuilder::new()
            .add("ts", self.ts)
            .add("doc", self.doc.as_str())
            .add("data", self.data.as_str())
            .add("col", self.col.as_str())
            .into_value()
    }
}

/// A stored time-series record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub ts: i64,
    pub data: String,
}

impl Record {
    pub(crate) fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            ts: i64_field(value, "ts")?,
            data: str_field(value, "data")?.to_string(),
        })
    }
}

/// Identifies one record for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub col: String,
    pub doc: String,
    pub ts: i64,
}

impl RecordRef {
    pub fn new(col: impl Into<String>, doc: impl Into<String>, ts: i64) -> Self {
        Self {
            col: col.into(),
            doc: doc.into(),
            ts,
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        JsonBuilder::new()
            .add("col", self.col.as_str())
            .add("doc", self.doc.as_str())
            .add("ts", self.ts)
            .into_value()
    }
}

/// Time range and paging options for fetching a document's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordQuery {
    pub from: i64,
    pub to: i64,
    pub limit: Option<u32>,
    pub reverse: Option<bool>,
}

impl RecordQuery {
    pub fn range(from: i64, to: i64) -> Self {
        Self {
            from,
            to,
            limit: None,
            reverse: None,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = Some(true);
        self
    }
}

/// A registered API key as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyInfo {
    pub key: String,
    pub scope: ApiKeyScope,
    pub deletable: bool,
}

impl ApiKeyInfo {
    pub(crate) fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            key: str_field(value, "key")?.to_string(),
            scope: ApiKeyScope::from_wire(str_field(value, "scope")?)?,
            deletable: bool_field(value, "deletable")?,
        })
    }
}

/// A live connection as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub ip: String,
    /// Millisecond timestamp the connection was accepted.
    pub since: i64,
    /// Whether this entry is the connection that issued the query.
    pub is_self: bool,
    pub name: Option<String>,
}

impl ConnectionInfo {
    pub(crate) fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            ip: str_field(value, "ip")?.to_string(),
            since: i64_field(value, "since")?,
            is_self: bool_field(value, "self")?,
            name: value
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

pub(crate) fn field<'a>(value: &'a Value, name: &str) -> Result<&'a Value> {
    value
        .get(name)
        .ok_or_else(|| Error::Protocol(format!("reply missing field `{name}`")))
}

pub(crate) fn str_field<'a>(value: &'a Value, name: &str) -> Result<&'a str> {
    field(value, name)?
        .as_str()
        .ok_or_else(|| Error::Protocol(format!("reply field `{name}` is not a string")))
}

pub(crate) fn i64_field(value: &Value, name: &str) -> Result<i64> {
    field(value, name)?
        .as_i64()
        .ok_or_else(|| Error::Protocol(format!("reply field `{name}` is not an integer")))
}

pub(crate) fn bool_field(value: &Value, name: &str) -> Result<bool> {
    field(value, name)?
        .as_bool()
        .ok_or_else(|| Error::Protocol(format!("reply field `{name}` is not a boolean")))
}

pub(crate) fn array_field<'a>(value: &'a Value, name: &str) -> Result<&'a [Value]> {
    field(value, name)?
        .as_array()
        .ok_or_else(|| Error::Protocol(format!("reply field `{name}` is not an array")))
}

pub(crate) fn object_field<'a>(
    value: &'a Value,
    name: &str,
) -> Result<&'a strata_core::Object> {
    field(value, name)?
        .as_object()
        .ok_or_else(|| Error::Protocol(format!("reply field `{name}` is not an object")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::json;

    #[test]
    fn scope_wire_round_trip() {
        for scope in [
            ApiKeyScope::ReadOnly,
            ApiKeyScope::ReadWrite,
            ApiKeyScope::ReadWriteDelete,
        ] {
            assert_eq!(ApiKeyScope::from_wire(scope.as_wire()).unwrap(), scope);
        }
        assert!(ApiKeyScope::from_wire("admin").is_err());
    }

    #[test]
    fn record_insert_serialized_field_order() {
        let value = RecordInsert::new("flights", "x-123", 1700000000000, r#"{"alt":812}"#).to_value();
        assert_eq!(
            json::serialize(&value),
            r#"{"ts":1700000000000,"doc":"x-123","data":"{\"alt\":812}","col":"flights"}"#
        );
    }

    #[test]
    fn record_decodes_from_reply_shape() {
        let value = json::parse(r#"{"ts":1000,"data":"payload"}"#).unwrap();
        let record = Record::from_value(&value).unwrap();
        assert_eq!(record.ts, 1000);
        assert_eq!(record.data, "payload");
    }

    #[test]
    fn record_missing_field_is_protocol_error() {
        let value = json::parse(r#"{"ts":1000}"#).unwrap();
        assert!(matches!(
            Record::from_value(&value),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn connection_info_name_is_optional() {
        let named =
            json::parse(r#"{"ip":"10.0.0.7","since":99,"self":true,"name":"ingest"}"#).unwrap();
        let info = ConnectionInfo::from_value(&named).unwrap();
        assert!(info.is_self);
        assert_eq!(info.name.as_deref(), Some("ingest"));

        let anonymous = json::parse(r#"{"ip":"10.0.0.8","since":100,"self":false}"#).unwrap();
        let info = ConnectionInfo::from_value(&anonymous).unwrap();
        assert!(info.name.is_none());
    }

    #[test]
    fn api_key_info_decodes() {
        let value =
            json::parse(r#"{"key":"abc","scope":"read_write","deletable":true}"#).unwrap();
        let info = ApiKeyInfo::from_value(&value).unwrap();
        assert_eq!(info.scope, ApiKeyScope::ReadWrite);
        assert!(info.deletable);
    }

    #[test]
    fn record_query_builders() {
        let query = RecordQuery::range(0, 500).with_limit(10).reversed();
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.reverse, Some(true));
    }
}
