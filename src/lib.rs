//! Strata - StrataDB client for Rust
//!
//! This is the main convenience crate that re-exports the Strata sub-crates.
//! Use this crate if you want a single dependency for talking to a StrataDB
//! server.
//!
//! # Architecture
//!
//! - **strata-core**: wire codec, envelope, request ids, error taxonomy
//! - **strata-client**: connection runtime and typed operations
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use strata::{ClientBuilder, RecordInsert};
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
//!     let latest = client.fetch_latest("flights", 1700000000000, None, None).await?;
//!     println!("latest: {latest:?}");
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

// Re-export the public APIs of the sub-crates under one prefix
pub use strata_client as client;
pub use strata_core as core;

// Convenience re-exports of the most commonly used types
pub use strata_client::{
    ApiKeyInfo, ApiKeyScope, ClientBuilder, ConnectionInfo, ConnectionState, Record,
    RecordInsert, RecordQuery, RecordRef, StrataClient,
};
pub use strata_core::{Error, Result, Value};
