//! Pending-request registry
//!
//! Tracks every in-flight request from registration until it resolves, and
//! guarantees each one resolves exactly once — via the matching reply, its
//! timeout, or bulk invalidation on connection loss, whichever comes first.
//!
//! # Lifecycle
//!
//! 1. **Register**: a oneshot slot is created under the correlation id and a
//!    timer task is armed for the configured request timeout.
//! 2. **Resolve / Fail**: the read loop routes the reply by id; the entry is
//!    removed, its timer aborted, and the slot completed.
//! 3. **Expire**: if the timer fires first, the entry is removed and failed
//!    with a timeout error. A reply arriving later finds no entry and is a
//!    no-op, so the race is harmless in both directions.
//! 4. **Invalidate**: on connection loss every remaining slot is failed with
//!    the same connection error and the map is cleared, so no caller hangs
//!    across a drop.
//!
//! Oneshot channels give single-assignment semantics for free: completing a
//! slot consumes the sender, so double resolution is unrepresentable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strata_core::{Error, Result};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

struct PendingRequest {
    tx: oneshot::Sender<Result<String>>,
    timer: JoinHandle<()>,
}

/// Thread-safe map of correlation id to pending result slot.
#[derive(Clone)]
pub(crate) struct RequestRegistry {
    pending: Arc<Mutex<HashMap<String, PendingRequest>>>,
    timeout: Duration,
}

impl RequestRegistry {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Register a pending request and arm its timeout timer.
    ///
    /// Returns the receiver immediately; the caller awaits it for the raw
    /// reply text or the failure.
    pub(crate) async fn register(&self, id: &str) -> oneshot::Receiver<Result<String>> {
        let (tx, rx) = oneshot::channel();

        let timer = tokio::spawn({
            let registry = self.clone();
            let id = id.to_string();
            let timeout = self.timeout;
            async move {
                tokio::time::sleep(timeout).await;
                registry.expire(&id).await;
            }
        });

        self.pending
            .lock()
            .await
            .insert(id.to_string(), PendingRequest { tx, timer });

        rx
    }

    /// Complete a pending request with the raw reply text.
    ///
    /// No-op if the id is unknown (late or duplicate reply).
    pub(crate) async fn resolve(&self, id: &str, raw: String) {
        if let Some(entry) = self.pending.lock().await.remove(id) {
            entry.timer.abort();
            let _ = entry.tx.send(Ok(raw));
        } else {
            tracing::debug!(id, "reply for unknown or already-resolved request");
        }
    }

    /// Fail a pending request. No-op if the id is unknown.
    pub(crate) async fn fail(&self, id: &str, error: Error) {
        if let Some(entry) = self.pending.lock().await.remove(id) {
            entry.timer.abort();
            let _ = entry.tx.send(Err(error));
        }
    }

    /// Timer path: fail the request with a timeout if it is still pending.
    async fn expire(&self, id: &str) {
        if let Some(entry) = self.pending.lock().await.remove(id) {
            tracing::debug!(id, timeout_ms = self.timeout.as_millis() as u64, "request timed out");
            let _ = entry.tx.send(Err(Error::Timeout(format!(
                "request {id} timed out after {}ms",
                self.timeout.as_millis()
            ))));
        }
    }

    /// Fail every pending request with the given error and clear the map.
    pub(crate) async fn invalidate_all(&self, error: Error) {
        let mut pending = self.pending.lock().await;
        if !pending.is_empty() {
            tracing::warn!(count = pending.len(), %error, "invalidating pending requests");
        }
        for (_, entry) in pending.drain() {
            entry.timer.abort();
            let _ = entry.tx.send(Err(error.clone()));
        }
    }

    #[cfg(test)]
    pub(crate) async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
