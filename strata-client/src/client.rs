//! StrataDB client
//!
//! This module provides the main `StrataClient` type: typed operation
//! wrappers over the connection manager. Each method builds a JSON payload,
//! sends it under the matching protocol message type, and decodes the raw
//! reply into a typed result. No concurrency or protocol logic lives here.
//!
//! # Cloning
//!
//! `StrataClient` is cheaply cloneable; all clones share the same connection
//! and state, so the client can be used from multiple tasks.

use crate::connection::{ConnectionManager, ConnectionState};
use crate::types::{
    array_field, object_field, str_field, ApiKeyInfo, ApiKeyScope, ConnectionInfo, Record,
    RecordInsert, RecordQuery, RecordRef,
};
use std::collections::HashMap;
use std::fmt;
use strata_core::{json, message_type, Error, JsonBuilder, Result, Value};
use tokio::sync::watch;

/// StrataDB client over a persistent WebSocket connection.
#[derive(Clone)]
pub struct StrataClient {
    connection: ConnectionManager,
}

impl fmt::Debug for StrataClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrataClient")
            .field("state", &self.connection.state())
            .finish_non_exhaustive()
    }
}

impl StrataClient {
    pub(crate) fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Establish the connection, waiting for the server's ready handshake.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await
    }

    /// Close the client permanently. Idempotent.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Subscribe to connection state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    /// Check if the client is currently connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Set the connection label shown in [`StrataClient::connections`].
    /// Takes effect on the next connection attempt.
    pub async fn set_connection_name(&self, name: impl Into<String>) {
        self.connection.set_connection_name(name).await;
    }

    // --- time series ---

    /// Insert a single record.
    pub async fn insert_record(&self, record: RecordInsert) -> Result<()> {
        self.insert_records(&[record]).await
    }

    /// Insert a batch of records in one request.
    pub async fn insert_records(&self, records: &[RecordInsert]) -> Result<()> {
        let payload = json::to_json_array(records.iter().map(RecordInsert::to_value));
        self.connection
            .send(message_type::INSERT, &payload)
            .await?;
        Ok(())
    }

    /// Fetch the latest record per document in a collection at `ts`.
    ///
    /// `doc` narrows the query to one document; `from` bounds how far back
    /// the server looks.
    pub async fn fetch_latest(
        &self,
        col: &str,
        ts: i64,
        doc: Option<&str>,
        from: Option<i64>,
    ) -> Result<HashMap<String, Record>> {
        let mut builder = JsonBuilder::new().add("col", col).add("ts", ts);
        if let Some(doc) = doc {
            builder = builder.add("doc", doc);
        }
        if let Some(from) = from {
            builder = builder.add("from", from);
        }

        let raw = self
            .connection
            .send(message_type::QUERY_RECORDS, &builder.build())
            .await?;
        decode_record_map(&raw)
    }

    /// Fetch a document's records over a time range, oldest first unless
    /// the query is reversed.
    pub async fn fetch_document(
        &self,
        col: &str,
        doc: &str,
        query: RecordQuery,
    ) -> Result<Vec<Record>> {
        let mut builder = JsonBuilder::new()
            .add("col", col)
            .add("doc", doc)
            .add("from", query.from)
            .add("to", query.to);
        if let Some(limit) = query.limit {
            builder = builder.add("limit", limit);
        }
        if let Some(reverse) = query.reverse {
            builder = builder.add("reverse", reverse);
        }

        let raw = self
            .connection
            .send(message_type::QUERY_DOCUMENT, &builder.build())
            .await?;
        decode_record_list(&raw)
    }

    /// Delete a document and all its records.
    pub async fn delete_document(&self, col: &str, doc: &str) -> Result<()> {
        let payload = JsonBuilder::new().add("col", col).add("doc", doc).build();
        self.connection
            .send(message_type::DELETE_DOCUMENT, &payload)
            .await?;
        Ok(())
    }

    /// Delete one record.
    pub async fn delete_record(&self, col: &str, doc: &str, ts: i64) -> Result<()> {
        let payload = JsonBuilder::new()
            .add("col", col)
            .add("doc", doc)
            .add("ts", ts)
            .build();
        self.connection
            .send(message_type::DELETE_RECORD, &payload)
            .await?;
        Ok(())
    }

    /// Delete a batch of records in one request.
    pub async fn delete_records(&self, records: &[RecordRef]) -> Result<()> {
        let payload = json::to_json_array(records.iter().map(RecordRef::to_value));
        self.connection
            .send(message_type::DELETE_MULTIPLE_RECORDS, &payload)
            .await?;
        Ok(())
    }

    /// Delete a document's records inside a timestamp range.
    pub async fn delete_records_range(
        &self,
        col: &str,
        doc: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<()> {
        let payload = JsonBuilder::new()
            .add("col", col)
            .add("doc", doc)
            .add("fromTs", from_ts)
            .add("toTs", to_ts)
            .build();
        self.connection
            .send(message_type::DELETE_RECORDS_RANGE, &payload)
            .await?;
        Ok(())
    }

    // --- collections ---

    /// List all collections.
    pub async fn collections(&self) -> Result<Vec<String>> {
        let raw = self
            .connection
            .send(message_type::QUERY_COLLECTIONS, "{}")
            .await?;
        decode_string_list(&raw, "collections")
    }

    /// Delete a collection and everything in it.
    pub async fn delete_collection(&self, col: &str) -> Result<()> {
        let payload = JsonBuilder::new().add("col", col).build();
        self.connection
            .send(message_type::DELETE_COLLECTION, &payload)
            .await?;
        Ok(())
    }

    // --- key-value ---

    /// Set a value under a key.
    pub async fn set_value(&self, col: &str, key: &str, value: &str) -> Result<()> {
        let payload = JsonBuilder::new()
            .add("col", col)
            .add("key", key)
            .add("value", value)
            .build();
        self.connection
            .send(message_type::SET_VALUE, &payload)
            .await?;
        Ok(())
    }

    /// Get one value. `None` if the key does not exist.
    pub async fn get_value(&self, col: &str, key: &str) -> Result<Option<String>> {
        let payload = JsonBuilder::new().add("col", col).add("key", key).build();
        let raw = self
            .connection
            .send(message_type::GET_VALUE, &payload)
            .await?;
        decode_value(&raw)
    }

    /// Get values by key prefix, or every value in the collection when
    /// `prefix` is `None`.
    pub async fn get_values(
        &self,
        col: &str,
        prefix: Option<&str>,
    ) -> Result<HashMap<String, String>> {
        let mut builder = JsonBuilder::new().add("col", col);
        if let Some(prefix) = prefix {
            builder = builder.add("key", prefix);
        }
        let message_type = if prefix.is_some() {
            message_type::GET_VALUES
        } else {
            message_type::GET_ALL_VALUES
        };

        let raw = self.connection.send(message_type, &builder.build()).await?;
        decode_values_map(&raw)
    }

    /// List all keys in a collection.
    pub async fn keys(&self, col: &str) -> Result<Vec<String>> {
        let payload = JsonBuilder::new().add("col", col).build();
        let raw = self
            .connection
            .send(message_type::GET_ALL_KEYS, &payload)
            .await?;
        decode_string_list(&raw, "keys")
    }

    /// Delete one value.
    pub async fn delete_value(&self, col: &str, key: &str) -> Result<()> {
        let payload = JsonBuilder::new().add("col", col).add("key", key).build();
        self.connection
            .send(message_type::REMOVE_VALUE, &payload)
            .await?;
        Ok(())
    }

    // --- management ---

    /// Register a new API key with the given scope.
    pub async fn add_api_key(&self, key: &str, scope: ApiKeyScope) -> Result<()> {
        let payload = JsonBuilder::new()
            .add("action", "add")
            .add("key", key)
            .add("scope", scope.as_wire())
            .build();
        let raw = self
            .connection
            .send(message_type::MANAGE_API_KEYS, &payload)
            .await?;
        check_status(&raw)
    }

    /// Revoke an API key.
    pub async fn remove_api_key(&self, key: &str) -> Result<()> {
        let payload = JsonBuilder::new()
            .add("action", "remove")
            .add("key", key)
            .build();
        let raw = self
            .connection
            .send(message_type::MANAGE_API_KEYS, &payload)
            .await?;
        check_status(&raw)
    }

    /// List registered API keys.
    pub async fn list_api_keys(&self) -> Result<Vec<ApiKeyInfo>> {
        let payload = JsonBuilder::new()
            .add("action", "list")
            .add("key", "")
            .build();
        let raw = self
            .connection
            .send(message_type::MANAGE_API_KEYS, &payload)
            .await?;
        decode_api_keys(&raw)
    }

    /// List live connections to the server.
    pub async fn connections(&self) -> Result<Vec<ConnectionInfo>> {
        let raw = self.connection.send(message_type::CONNECTIONS, "{}").await?;
        decode_connections(&raw)
    }
}

fn parse_reply(raw: &str) -> Result<Value> {
    Ok(json::parse(raw)?)
}

fn decode_record_map(raw: &str) -> Result<HashMap<String, Record>> {
    let reply = parse_reply(raw)?;
    let records = object_field(&reply, "records")?;

    let mut result = HashMap::with_capacity(records.len());
    for (doc, value) in records.iter() {
        result.insert(doc.to_string(), Record::from_value(value)?);
    }
    Ok(result)
}

fn decode_record_list(raw: &str) -> Result<Vec<Record>> {
    let reply = parse_reply(raw)?;
    array_field(&reply, "records")?
        .iter()
        .map(Record::from_value)
        .collect()
}

fn decode_string_list(raw: &str, name: &str) -> Result<Vec<String>> {
    let reply = parse_reply(raw)?;
    array_field(&reply, name)?
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                Error::Protocol(format!("reply field `{name}` holds a non-string entry"))
            })
        })
        .collect()
}

fn decode_value(raw: &str) -> Result<Option<String>> {
    let reply = parse_reply(raw)?;
    match reply.get("value") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| Error::Protocol("reply field `value` is not a string".to_string())),
    }
}

fn decode_values_map(raw: &str) -> Result<HashMap<String, String>> {
    let reply = parse_reply(raw)?;
    let values = object_field(&reply, "values")?;

    let mut result = HashMap::with_capacity(values.len());
    for (key, value) in values.iter() {
        let value = value.as_str().ok_or_else(|| {
            Error::Protocol(format!("reply field `values` holds a non-string entry for `{key}`"))
        })?;
        result.insert(key.to_string(), value.to_string());
    }
    Ok(result)
}

fn decode_api_keys(raw: &str) -> Result<Vec<ApiKeyInfo>> {
    let reply = parse_reply(raw)?;
    array_field(&reply, "keys")?
        .iter()
        .map(ApiKeyInfo::from_value)
        .collect()
}

fn decode_connections(raw: &str) -> Result<Vec<ConnectionInfo>> {
    let reply = parse_reply(raw)?;
    array_field(&reply, "connections")?
        .iter()
        .map(ConnectionInfo::from_value)
        .collect()
}

fn check_status(raw: &str) -> Result<()> {
    let reply = parse_reply(raw)?;
    match str_field(&reply, "status")? {
        "ok" => Ok(()),
        other => Err(Error::Server(format!("server reported status `{other}`"))),
    }
}
