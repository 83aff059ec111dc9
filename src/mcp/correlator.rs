//! Request/response correlation for the HTTP transport.
//!
//! The dispatcher consumes inbound messages from a channel and pushes replies
//! to another channel with no notion of who is waiting. The correlator keys
//! every admitted request by its id so the reply can be routed back to the
//! HTTP call that submitted it.
//!
//! Flow:
//! 1. `submit()` validates the envelope and registers a oneshot sender by id
//! 2. The message is sent on the dispatcher's inbound channel
//! 3. `run_resolver()` drains the dispatcher's outbound channel, calling `resolve()`
//! 4. `submit()` returns the reply, or a timeout error once the deadline passes
//!
//! Entries are taken with a single `DashMap::remove`, so a reply racing the
//! timeout resolves the request exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::dispatcher::{spawn_handler, McpHandler, CHANNEL_CAPACITY};
use super::protocol::{InboundMessage, McpResponse, Rejection, RequestId};
use crate::error::GatewayError;

/// Default time a caller waits for its reply
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful submit
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The dispatcher's reply to a request
    Reply(McpResponse),
    /// The message was a notification; nothing will be sent back
    NoReply,
}

struct PendingEntry {
    sender: oneshot::Sender<McpResponse>,
    /// Distinguishes this registration from a later one reusing the id
    token: u64,
    created_at: Instant,
    method: String,
}

/// Counters for correlator activity
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    pub registered: AtomicU64,
    pub resolved: AtomicU64,
    pub timed_out: AtomicU64,
    /// Replies whose id had no pending entry
    pub orphaned: AtomicU64,
}

/// Removes a pending entry if the waiting caller goes away before resolution
struct PendingGuard<'a> {
    pending: &'a DashMap<RequestId, PendingEntry>,
    id: RequestId,
    token: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let token = self.token;
        self.pending.remove_if(&self.id, |_, entry| entry.token == token);
    }
}

/// Correlates asynchronous dispatcher replies with synchronous callers
pub struct Correlator {
    pending: DashMap<RequestId, PendingEntry>,
    handler: RwLock<Option<mpsc::Sender<InboundMessage>>>,
    timeout: Duration,
    next_token: AtomicU64,
    stats: CorrelatorStats,
}

impl Correlator {
    /// Create a correlator with no handler attached
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            handler: RwLock::new(None),
            timeout,
            next_token: AtomicU64::new(0),
            stats: CorrelatorStats::default(),
        }
    }

    /// Create a correlator wired to a running handler loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(handler: Arc<dyn McpHandler>, timeout: Duration) -> Arc<Self> {
        let correlator = Arc::new(Self::new(timeout));
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        correlator.attach(spawn_handler(handler, outbound_tx));
        tokio::spawn(correlator.clone().run_resolver(outbound_rx));
        correlator
    }

    /// Attach the dispatcher's inbound channel
    pub fn attach(&self, handler: mpsc::Sender<InboundMessage>) {
        *self.handler.write() = Some(handler);
    }

    /// Detach the handler. Pending requests keep waiting for their deadline.
    pub fn detach(&self) {
        *self.handler.write() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Get number of requests currently awaiting a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }

    /// Validate a raw envelope and submit it
    pub async fn submit_value(&self, raw: Value) -> Result<SubmitOutcome, Rejection> {
        let message = InboundMessage::parse(raw)?;
        self.submit(message).await
    }

    /// Hand a message to the dispatcher and, for requests, wait for its reply
    pub async fn submit(&self, message: InboundMessage) -> Result<SubmitOutcome, Rejection> {
        let handler = self.handler.read().clone();
        let Some(handler) = handler else {
            return Err(Rejection::new(
                message.id,
                GatewayError::Internal("message handler not initialized".to_string()),
            ));
        };

        let Some(id) = message.id.clone() else {
            debug!(method = %message.method, "Forwarding notification");
            handler.send(message).await.map_err(|_| handler_closed(None))?;
            return Ok(SubmitOutcome::NoReply);
        };

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = oneshot::channel();

        match self.pending.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(Rejection::new(
                    Some(id),
                    GatewayError::InvalidRequest("duplicate request id".to_string()),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingEntry {
                    sender: tx,
                    token,
                    created_at: Instant::now(),
                    method: message.method.clone(),
                });
            }
        }
        let _guard = PendingGuard {
            pending: &self.pending,
            id: id.clone(),
            token,
        };
        self.stats.registered.fetch_add(1, Ordering::Relaxed);
        debug!(id = %id, method = %message.method, "Registered pending request");

        if handler.send(message).await.is_err() {
            return Err(handler_closed(Some(id)));
        }

        match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(response)) => Ok(SubmitOutcome::Reply(response)),
            Ok(Err(_)) => Err(Rejection::new(
                Some(id),
                GatewayError::Internal("reply channel closed".to_string()),
            )),
            Err(_) => self.settle_after_deadline(id, token, rx).await,
        }
    }

    /// Decide the outcome of a request whose deadline has passed.
    ///
    /// If `resolve` took the entry first, its reply is already on the way and
    /// is returned instead of the timeout. The caller sees one outcome and
    /// only that outcome is counted.
    async fn settle_after_deadline(
        &self,
        id: RequestId,
        token: u64,
        rx: oneshot::Receiver<McpResponse>,
    ) -> Result<SubmitOutcome, Rejection> {
        let taken = self
            .pending
            .remove_if(&id, |_, entry| entry.token == token)
            .is_some();
        if !taken {
            // `resolve` sends right after its remove, so this wait is short
            if let Ok(response) = rx.await {
                debug!(id = %id, "Reply won the race against the deadline");
                return Ok(SubmitOutcome::Reply(response));
            }
        }

        self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
        warn!(
            id = %id,
            timeout_ms = self.timeout.as_millis() as u64,
            "Request timed out awaiting reply"
        );
        Err(Rejection::new(Some(id), GatewayError::Timeout(self.timeout)))
    }

    /// Deliver a reply to its waiting caller.
    ///
    /// Returns false if no caller was waiting (unknown, timed out, or gone).
    pub fn resolve(&self, response: McpResponse) -> bool {
        let Some(id) = response.id.clone() else {
            self.stats.orphaned.fetch_add(1, Ordering::Relaxed);
            warn!("Reply without id cannot be correlated");
            return false;
        };

        let Some((_, entry)) = self.pending.remove(&id) else {
            self.stats.orphaned.fetch_add(1, Ordering::Relaxed);
            warn!(id = %id, "Reply for unknown or expired request id");
            return false;
        };

        let elapsed = entry.created_at.elapsed();
        match entry.sender.send(response) {
            Ok(()) => {
                self.stats.resolved.fetch_add(1, Ordering::Relaxed);
                debug!(
                    id = %id,
                    method = %entry.method,
                    response_time_ms = elapsed.as_millis() as u64,
                    "Resolved pending request"
                );
                true
            }
            Err(_) => {
                debug!(id = %id, method = %entry.method, "Caller dropped before reply");
                false
            }
        }
    }

    /// Drain the dispatcher's outbound channel until it closes
    pub async fn run_resolver(self: Arc<Self>, mut outbound: mpsc::Receiver<McpResponse>) {
        while let Some(response) = outbound.recv().await {
            self.resolve(response);
        }
        debug!("Dispatcher outbound channel closed");
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

fn handler_closed(id: Option<RequestId>) -> Rejection {
    Rejection::new(
        id,
        GatewayError::Internal("message handler closed".to_string()),
    )
}
