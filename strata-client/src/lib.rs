//! StrataDB client over a persistent WebSocket connection
//!
//! This crate provides the client runtime for the StrataDB protocol:
//! request/response multiplexing with per-request timeouts over a single
//! full-duplex connection, an authenticated ready handshake, and automatic
//! reconnection with linear backoff when an established connection drops.
//!
//! # Core Features
//!
//! - **Request Correlation**: every request carries a unique id and resolves
//!   with its matching reply, timeout, or connection failure — exactly once
//! - **Authenticated Handshake**: a connection counts only once the server's
//!   `"ready"` frame arrives; credentials travel as connect-URL parameters
//! - **Auto-Reconnection**: bounded linear backoff, pending requests failed
//!   immediately on loss so no caller hangs
//! - **Typed Operations**: time-series records, key-value storage,
//!   collections, API keys, and live-connection listing
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use strata_client::{ClientBuilder, RecordInsert};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new("ws://localhost:8080", "my-api-key")
//!         .connect()
//!         .await?;
//!
//!     client
//!         .insert_record(RecordInsert::new("flights", "x-1", 1700000000000, r#"{"alt":812}"#))
//!         .await?;
//!
//!     let collections = client.collections().await?;
//!     println!("collections: {collections:?}");
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod connection;
mod reconnect;
mod request;
mod types;

pub use client::StrataClient;
pub use client_builder::ClientBuilder;
pub use connection::{ConnectionManager, ConnectionState};
pub use reconnect::ReconnectPolicy;
pub use types::{ApiKeyInfo, ApiKeyScope, ConnectionInfo, Record, RecordInsert, RecordQuery, RecordRef};
