//! Connection lifecycle management
//!
//! This module owns the WebSocket transport: establishing the authenticated
//! connection, reading and routing inbound frames, and reconnecting with
//! backoff when an established connection drops.
//!
//! # Connection States
//!
//! - **Disconnected**: not connected; the initial state
//! - **Connecting**: a connection attempt (dial + handshake) is in flight
//! - **Connected**: handshake complete, requests may flow
//! - **Reconnecting**: an established connection was lost; the bounded
//!   reconnect loop is running
//! - **Closed**: terminal; entered only by explicit `close()`
//!
//! # Handshake
//!
//! Credentials travel as query parameters on the connect URL; the server
//! sends a `"ready"` frame once authentication succeeds. A connection attempt
//! counts as successful only after `"ready"` arrives — a socket that opens
//! and then closes (or sends anything else first) fails the attempt. The
//! whole attempt is bounded by a fixed 10 second timeout.
//!
//! # Reconnection
//!
//! Only a connection lost *after* a successful handshake triggers the
//! reconnect loop. Every pending request is failed immediately on loss, then
//! the policy's delay/attempt schedule drives retries. When the attempt
//! budget is exhausted the manager parks in `Disconnected` and refuses new
//! requests until the caller explicitly reconnects.
//!
//! # Single attempt in flight
//!
//! All paths that need a connection (user `connect()`, `send()` on a
//! disconnected client, the reconnect loop) funnel through one shared
//! connect future, so concurrent callers await the same attempt instead of
//! racing dials.

use crate::reconnect::ReconnectPolicy;
use crate::request::RequestRegistry;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::sync::Arc;
use std::time::Duration;
use strata_core::{request_id, Error, Frame, Result};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// Time budget for one connection attempt, dial through `"ready"`.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters percent-encoded in query parameter values.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=')
    .add(b'?');

type Transport = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<Transport, Message>;
type WsStream = SplitStream<Transport>;
type ConnectFuture = Shared<BoxFuture<'static, Result<()>>>;

/// Connection state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Handshake complete, operational
    Connected,
    /// Connection lost, reconnect loop running
    Reconnecting { attempt: u32 },
    /// Explicitly closed, terminal
    Closed,
}

#[derive(Default)]
struct RetryState {
    /// Failed attempts since the last `"ready"` handshake.
    attempts: u32,
    /// Set when the attempt budget ran out; cleared only by `connect()`.
    exhausted: bool,
}

struct Inner {
    url: String,
    api_key: String,
    name: Mutex<Option<String>>,
    policy: ReconnectPolicy,
    registry: RequestRegistry,
    sink: Mutex<Option<WsSink>>,
    state_tx: watch::Sender<ConnectionState>,
    retry: Mutex<RetryState>,
    connect_gate: Mutex<Option<ConnectFuture>>,
}

/// Manages the transport, frame routing, and reconnection.
///
/// Cheaply cloneable; all clones share the same connection and state.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub(crate) fn new(
        url: String,
        api_key: String,
        name: Option<String>,
        request_timeout: Duration,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url,
                api_key,
                name: Mutex::new(name),
                policy,
                registry: RequestRegistry::new(request_timeout),
                sink: Mutex::new(None),
                state_tx,
                retry: Mutex::new(RetryState::default()),
                connect_gate: Mutex::new(None),
            }),
        }
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Establish the connection, completing only once `"ready"` arrives.
    ///
    /// Joins an already in-flight attempt instead of starting a second one.
    /// Also clears the exhausted flag, so this is how a caller recovers after
    /// the reconnect budget ran out.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut retry = self.inner.retry.lock().await;
            retry.attempts = 0;
            retry.exhausted = false;
        }
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }
        Inner::begin_connect(&self.inner).await
    }

    /// Send a request and wait for its correlated reply.
    ///
    /// Returns the raw reply text; typed decoding is the caller's concern.
    /// Connects first if necessary. A write failure fails only this request.
    pub async fn send(&self, message_type: &str, payload: &str) -> Result<String> {
        match self.state() {
            ConnectionState::Closed => {
                return Err(Error::Connection("client is closed".to_string()));
            }
            ConnectionState::Connected => {}
            _ => {
                if self.inner.retry.lock().await.exhausted {
                    return Err(Error::Connection(
                        "max reconnection attempts exceeded".to_string(),
                    ));
                }
                Inner::begin_connect(&self.inner).await?;
            }
        }

        let id = request_id::generate();
        let rx = self.inner.registry.register(&id).await;
        let text = strata_core::encode_request(&id, message_type, payload);
        tracing::debug!(id = %id, message_type, "sending request");

        let write_result = {
            let mut sink = self.inner.sink.lock().await;
            match sink.as_mut() {
                Some(sink) => sink
                    .send(Message::Text(text))
                    .await
                    .map_err(|e| Error::Connection(e.to_string())),
                None => Err(Error::Connection("not connected".to_string())),
            }
        };
        if let Err(e) = write_result {
            self.inner.registry.fail(&id, e.clone()).await;
            return Err(e);
        }

        rx.await
            .map_err(|_| Error::Connection("reply channel dropped".to_string()))?
    }

    /// Close the connection permanently. Idempotent.
    ///
    /// Disables reconnection, fails every pending request, and makes any
    /// further `connect()`/`send()` return a connection error.
    pub async fn close(&self) {
        if self.state() == ConnectionState::Closed {
            return;
        }
        self.inner.set_state(ConnectionState::Closed);

        if let Some(mut sink) = self.inner.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
        self.inner
            .registry
            .invalidate_all(Error::Connection("client closed".to_string()))
            .await;
        tracing::info!("client closed");
    }

    /// Set the connection label reported to the server.
    ///
    /// Takes effect on the next connection attempt (including reconnects).
    pub async fn set_connection_name(&self, name: impl Into<String>) {
        *self.inner.name.lock().await = Some(name.into());
    }
}

impl Inner {
    fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Boxed entry point for the reconnect loop. The loop runs inside the
    /// read task, which `establish` spawns; without the box the spawned
    /// future's type would contain itself and could not be proven `Send`.
    fn begin_connect_boxed(inner: Arc<Inner>) -> BoxFuture<'static, Result<()>> {
        async move { Inner::begin_connect(&inner).await }.boxed()
    }

    /// Join the in-flight connect attempt, starting one if none is running.
    async fn begin_connect(inner: &Arc<Inner>) -> Result<()> {
        let fut = {
            let mut gate = inner.connect_gate.lock().await;
            match gate.as_ref() {
                Some(fut) => fut.clone(),
                None => {
                    let owner = Arc::clone(inner);
                    let fut = async move {
                        let result = Inner::establish(&owner).await;
                        *owner.connect_gate.lock().await = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *gate = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    /// One connection attempt: dial, await `"ready"`, install the transport.
    async fn establish(inner: &Arc<Inner>) -> Result<()> {
        match inner.state() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => {
                return Err(Error::Connection("client is closed".to_string()));
            }
            ConnectionState::Disconnected => inner.set_state(ConnectionState::Connecting),
            _ => {}
        }

        let url = inner.connect_url().await;
        tracing::info!(url = %inner.url, "connecting");

        let dialed = tokio::time::timeout(CONNECT_TIMEOUT, Inner::dial(&url)).await;
        let (sink, stream) = match dialed {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => {
                inner.fail_attempt();
                tracing::warn!(error = %e, "connection attempt failed");
                return Err(e);
            }
            Err(_) => {
                inner.fail_attempt();
                let e = Error::Timeout(format!(
                    "connection not ready within {}s",
                    CONNECT_TIMEOUT.as_secs()
                ));
                tracing::warn!(error = %e, "connection attempt failed");
                return Err(e);
            }
        };

        // close() may have run while the dial was in flight; Closed is
        // terminal, so drop the fresh transport instead of installing it.
        if inner.state() == ConnectionState::Closed {
            drop(sink);
            drop(stream);
            return Err(Error::Connection("client is closed".to_string()));
        }

        *inner.sink.lock().await = Some(sink);
        {
            let mut retry = inner.retry.lock().await;
            retry.attempts = 0;
            retry.exhausted = false;
        }
        inner.set_state(ConnectionState::Connected);
        tracing::info!("connected and ready");

        tokio::spawn(Inner::read_loop(Arc::clone(inner), stream));
        Ok(())
    }

    /// Dial the server and wait for the `"ready"` handshake frame.
    async fn dial(url: &str) -> Result<(WsSink, WsStream)> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        let (sink, mut stream) = ws_stream.split();

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame = Frame::parse(&text)
                        .map_err(|e| Error::Protocol(format!("malformed handshake frame: {e}")))?;
                    if frame.is_ready() {
                        return Ok((sink, stream));
                    }
                    return Err(Error::Protocol(format!(
                        "expected ready frame, got type {:?}",
                        frame.frame_type()
                    )));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(Error::Authentication(
                        "connection closed before ready handshake".to_string(),
                    ));
                }
                Some(Ok(_)) => {} // control frames may precede the handshake
                Some(Err(e)) => return Err(Error::Connection(e.to_string())),
            }
        }
    }

    /// Roll back `Connecting` after a failed user-initiated attempt.
    /// The reconnect loop manages its own state, so `Reconnecting` stays.
    fn fail_attempt(&self) {
        if self.state() == ConnectionState::Connecting {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    async fn connect_url(&self) -> String {
        // A bare authority like `ws://host:port` would produce an upgrade
        // request line with no path, which servers reject; insert "/" then.
        let separator = if self.url.contains('?') {
            "&"
        } else {
            let after_scheme = self
                .url
                .split_once("://")
                .map_or(self.url.as_str(), |(_, rest)| rest);
            if after_scheme.contains('/') {
                "?"
            } else {
                "/?"
            }
        };
        let mut url = format!(
            "{}{}api-key={}",
            self.url,
            separator,
            utf8_percent_encode(&self.api_key, QUERY_VALUE)
        );
        if let Some(name) = self.name.lock().await.as_ref() {
            url.push_str("&name=");
            url.push_str(&utf8_percent_encode(name, QUERY_VALUE).to_string());
        }
        url
    }

    /// Owns the stream half for one connection generation.
    async fn read_loop(inner: Arc<Inner>, mut stream: WsStream) {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => inner.route_frame(&text).await,
                Ok(Message::Close(_)) => {
                    tracing::info!("connection closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "transport error");
                    break;
                }
            }
        }

        if inner.state() == ConnectionState::Closed {
            return;
        }

        // Established connection lost: nothing pending can complete now.
        inner.sink.lock().await.take();
        inner
            .registry
            .invalidate_all(Error::Connection("connection lost".to_string()))
            .await;
        Inner::reconnect_loop(inner).await;
    }

    /// Route one inbound frame to its pending request.
    async fn route_frame(&self, text: &str) {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed frame");
                return;
            }
        };
        if frame.is_ready() {
            tracing::debug!("ready frame outside handshake ignored");
            return;
        }
        match frame.id() {
            Some(id) => {
                if let Some(message) = frame.error() {
                    self.registry
                        .fail(id, Error::Server(message.to_string()))
                        .await;
                } else {
                    self.registry.resolve(id, text.to_string()).await;
                }
            }
            None => tracing::warn!("discarding frame without correlation id"),
        }
    }

    /// Bounded retry loop after an established connection dropped.
    async fn reconnect_loop(inner: Arc<Inner>) {
        loop {
            if inner.state() == ConnectionState::Closed {
                return;
            }

            let attempt = {
                let mut retry = inner.retry.lock().await;
                if !inner.policy.should_retry(retry.attempts) {
                    retry.exhausted = true;
                    drop(retry);
                    inner.set_state(ConnectionState::Disconnected);
                    tracing::error!(
                        max_attempts = inner.policy.max_attempts(),
                        "reconnection abandoned, max attempts exceeded"
                    );
                    return;
                }
                retry.attempts += 1;
                retry.attempts
            };

            let delay = inner.policy.delay(attempt);
            inner.set_state(ConnectionState::Reconnecting { attempt });
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::time::sleep(delay).await;

            if inner.state() == ConnectionState::Closed {
                return;
            }
            match Inner::begin_connect_boxed(Arc::clone(&inner)).await {
                Ok(()) => {
                    tracing::info!(attempt, "reconnected");
                    return;
                }
                Err(e) => tracing::warn!(attempt, error = %e, "reconnection attempt failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(url: &str) -> ConnectionManager {
        ConnectionManager::new(
            url.to_string(),
            "secret".to_string(),
            None,
            Duration::from_secs(5),
            ReconnectPolicy::default(),
        )
    }

    #[tokio::test]
    async fn initial_state_is_disconnected() {
        let manager = manager("ws://localhost:9999");
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_terminal() {
        let manager = manager("ws://localhost:9999");

        manager.close().await;
        assert_eq!(manager.state(), ConnectionState::Closed);
        manager.close().await;
        assert_eq!(manager.state(), ConnectionState::Closed);

        let err = manager.send("cols", "{}").await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn send_fails_fast_after_exhaustion() {
        let manager = manager("ws://localhost:9999");
        manager.inner.retry.lock().await.exhausted = true;

        let err = manager.send("cols", "{}").await.unwrap_err();
        match err {
            Error::Connection(message) => {
                assert!(message.contains("max reconnection attempts exceeded"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_refused_reports_connection_error() {
        // Port 1 is never listening; the dial fails immediately.
        let manager = manager("ws://127.0.0.1:1");

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_url_percent_encodes_credentials_and_name() {
        let manager = ConnectionManager::new(
            "ws://localhost:8080".to_string(),
            "k&y =1%".to_string(),
            None,
            Duration::from_secs(5),
            ReconnectPolicy::default(),
        );
        assert_eq!(
            manager.inner.connect_url().await,
            "ws://localhost:8080/?api-key=k%26y%20%3D1%25"
        );

        manager.set_connection_name("ingest #2").await;
        assert_eq!(
            manager.inner.connect_url().await,
            "ws://localhost:8080/?api-key=k%26y%20%3D1%25&name=ingest%20%232"
        );
    }

    #[tokio::test]
    async fn connect_url_keeps_an_explicit_path() {
        let manager = ConnectionManager::new(
            "ws://localhost:8080/db".to_string(),
            "k".to_string(),
            None,
            Duration::from_secs(5),
            ReconnectPolicy::default(),
        );
        assert_eq!(
            manager.inner.connect_url().await,
            "ws://localhost:8080/db?api-key=k"
        );
    }

    #[tokio::test]
    async fn connect_url_respects_existing_query() {
        let manager = ConnectionManager::new(
            "ws://localhost:8080/db?tls=0".to_string(),
            "k".to_string(),
            None,
            Duration::from_secs(5),
            ReconnectPolicy::default(),
        );
        assert_eq!(
            manager.inner.connect_url().await,
            "ws://localhost:8080/db?tls=0&api-key=k"
        );
    }
}
