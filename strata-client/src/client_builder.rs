//! Client builder
//!
//! Fluent configuration for [`StrataClient`]: server URL, API key, optional
//! connection label, request timeout, and the reconnection budget.
//!
//! # Examples
//!
//! ```rust,no_run
//! use strata_client::ClientBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> strata_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8080", "my-api-key")
//!     .connection_name("ingest-1")
//!     .request_timeout(Duration::from_secs(10))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::connection::ConnectionManager;
use crate::reconnect::ReconnectPolicy;
use crate::StrataClient;
use std::time::Duration;
use strata_core::{Error, Result};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Builder for configuring and creating a [`StrataClient`]
pub struct ClientBuilder {
    url: String,
    api_key: String,
    name: Option<String>,
    request_timeout: Duration,
    max_reconnect_attempts: u32,
    reconnect_interval: Duration,
}

impl ClientBuilder {
    /// Create a builder with the default timeout and reconnection budget.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            name: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }

    /// Label this connection in the server's connection listing.
    pub fn connection_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Per-request timeout (default 30 seconds).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reconnection attempt budget after a lost connection (default 5).
    /// Zero disables reconnection entirely.
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Base backoff interval between reconnection attempts (default 5
    /// seconds); the delay grows linearly with the attempt number.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Build the client without connecting.
    pub fn build(self) -> Result<StrataClient> {
        if self.url.trim().is_empty() {
            return Err(Error::Connection("server url must not be empty".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(Error::Authentication(
                "api key must not be empty".to_string(),
            ));
        }

        let policy = ReconnectPolicy::new(self.max_reconnect_attempts, self.reconnect_interval);
        let connection = ConnectionManager::new(
            self.url,
            self.api_key,
            self.name,
            self.request_timeout,
            policy,
        );
        Ok(StrataClient::new(connection))
    }

    /// Build the client and establish the connection.
    pub async fn connect(self) -> Result<StrataClient> {
        let client = self.build()?;
        client.connect().await?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;

    #[test]
    fn defaults() {
        let builder = ClientBuilder::new("ws://localhost:8080", "key");
        assert_eq!(builder.request_timeout, Duration::from_secs(30));
        assert_eq!(builder.max_reconnect_attempts, 5);
        assert_eq!(builder.reconnect_interval, Duration::from_secs(5));
        assert!(builder.name.is_none());
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = ClientBuilder::new("", "key").build().unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        let err = ClientBuilder::new("   ", "key").build().unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = ClientBuilder::new("ws://localhost:8080", "")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn build_does_not_connect() {
        let client = ClientBuilder::new("ws://localhost:8080", "key")
            .build()
            .unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn built_client_is_debuggable() {
        let client = ClientBuilder::new("ws://localhost:8080", "key")
            .build()
            .unwrap();
        let rendered = format!("{client:?}");
        assert!(rendered.contains("StrataClient"));
        assert!(rendered.contains("Disconnected"));
    }

    #[test]
    fn chaining() {
        let builder = ClientBuilder::new("ws://localhost:8080", "key")
            .connection_name("tracker")
            .request_timeout(Duration::from_secs(2))
            .max_reconnect_attempts(10)
            .reconnect_interval(Duration::from_millis(250));

        assert_eq!(builder.name.as_deref(), Some("tracker"));
        assert_eq!(builder.request_timeout, Duration::from_secs(2));
        assert_eq!(builder.max_reconnect_attempts, 10);
        assert_eq!(builder.reconnect_interval, Duration::from_millis(250));
    }
}
