//! Common test utilities for strata-client integration tests
//!
//! This module provides a scriptable mock StrataDB server so client behavior
//! can be exercised without a real database instance.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_core::Frame;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// The handshake frame a real server sends once authentication succeeds.
pub fn ready_frame() -> String {
    r#"{"type":"ready"}"#.to_string()
}

/// Default reply: acknowledge any request by echoing its id.
pub fn ack_reply(request: &str) -> Option<String> {
    let frame = Frame::parse(request).ok()?;
    let id = frame.id()?;
    Some(format!(r#"{{"id":"{id}"}}"#))
}

/// Mock StrataDB server for client testing
///
/// Accepts WebSocket connections, optionally sends a handshake frame, and
/// answers each inbound message through a scriptable handler. Captures every
/// inbound message and every upgrade request URI for assertions.
pub struct MockDbServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    drop_tx: watch::Sender<u64>,
    message_rx: mpsc::Receiver<String>,
    connections: Arc<AtomicUsize>,
    uris: Arc<Mutex<Vec<String>>>,
}

impl MockDbServer {
    /// Start a server that completes the ready handshake and acks every
    /// request.
    pub async fn new() -> Self {
        Self::start(Some(ready_frame()), Duration::ZERO, |text| async move {
            ack_reply(&text)
        })
        .await
    }

    /// Start a server that completes the ready handshake and answers through
    /// the given handler. Returning `None` leaves the request unanswered.
    pub async fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        Self::start(Some(ready_frame()), Duration::ZERO, handler).await
    }

    /// Start a server whose first frame is not the usual handshake.
    /// `None` closes each connection immediately after the upgrade.
    pub async fn with_first_frame(first_frame: Option<String>) -> Self {
        Self::start(first_frame, Duration::ZERO, |text| async move {
            ack_reply(&text)
        })
        .await
    }

    /// Start a server that waits before sending the ready frame.
    pub async fn with_ready_delay(delay: Duration) -> Self {
        Self::start(Some(ready_frame()), delay, |text| async move {
            ack_reply(&text)
        })
        .await
    }

    async fn start<F, Fut>(first_frame: Option<String>, first_delay: Duration, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (drop_tx, drop_rx) = watch::channel(0u64);
        let (msg_tx, message_rx) = mpsc::channel::<String>(100);
        let connections = Arc::new(AtomicUsize::new(0));
        let uris = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        {
            let connections = Arc::clone(&connections);
            let uris = Arc::clone(&uris);
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        accepted = listener.accept() => {
                            let Ok((stream, _)) = accepted else { break };
                            connections.fetch_add(1, Ordering::SeqCst);
                            tokio::spawn(Self::serve_connection(
                                stream,
                                first_frame.clone(),
                                first_delay,
                                Arc::clone(&handler),
                                msg_tx.clone(),
                                drop_rx.clone(),
                                Arc::clone(&uris),
                            ));
                        }
                    }
                }
            });
        }

        // Give the accept loop a moment to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            shutdown_tx,
            drop_tx,
            message_rx,
            connections,
            uris,
        }
    }

    async fn serve_connection<F, Fut>(
        stream: tokio::net::TcpStream,
        first_frame: Option<String>,
        first_delay: Duration,
        handler: Arc<F>,
        msg_tx: mpsc::Sender<String>,
        mut drop_rx: watch::Receiver<u64>,
        uris: Arc<Mutex<Vec<String>>>,
    ) where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        // Connections accepted after a drop_connections() call must not see
        // the old watch value as a fresh change.
        drop_rx.borrow_and_update();
        let capture_uri =
            move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                uris.lock().unwrap().push(request.uri().to_string());
                Ok(response)
            };
        let Ok(ws_stream) = accept_hdr_async(stream, capture_uri).await else {
            return;
        };
        let (mut write, mut read) = ws_stream.split();

        match first_frame {
            Some(frame) => {
                if !first_delay.is_zero() {
                    tokio::time::sleep(first_delay).await;
                }
                let _ = write.send(Message::Text(frame)).await;
            }
            None => {
                let _ = write.close().await;
                return;
            }
        }

        loop {
            tokio::select! {
                _ = drop_rx.changed() => {
                    let _ = write.close().await;
                    break;
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let _ = msg_tx.send(text.clone()).await;
                            if let Some(reply) = handler(text).await {
                                let _ = write.send(Message::Text(reply)).await;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    /// Get the WebSocket URL for connecting to this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Close every live connection while keeping the listener up, so clients
    /// can reconnect.
    pub async fn drop_connections(&self) {
        let next = *self.drop_tx.borrow() + 1;
        let _ = self.drop_tx.send(next);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    /// Number of connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Upgrade request URIs seen so far, in accept order.
    pub fn request_uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    /// Wait for the next message received by the server.
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Shutdown the mock server, dropping every connection.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let next = *self.drop_tx.borrow() + 1;
        let _ = self.drop_tx.send(next);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
