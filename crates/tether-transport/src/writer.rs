//! Buffering, chunking outbound writer.
//!
//! Guarantees in-order delivery of outbound messages despite connection
//! absence and churn. Messages that cannot be delivered are held in an
//! ordered backlog and replayed head-to-tail when the next session is
//! bound.
//!
//! Known gap: when a send fails partway through a multi-frame message, the
//! whole message is re-queued and replayed from its first frame on the
//! next session. A peer that already received some frames may observe a
//! malformed or duplicated logical message; the layer above this transport
//! must tolerate replays.

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use tether_protocol::{chunks, OutboundFrame};

use crate::error::TransportError;

/// Write-side seam over one established connection.
///
/// Implemented by [`crate::session::WsSession`] for real traffic and by
/// in-memory mocks in tests.
pub trait MessageTransport: Send + 'static {
    /// Stable identity for this session, used to release the right binding.
    fn id(&self) -> Uuid;

    /// Whether the session can currently accept frames.
    fn is_open(&self) -> bool;

    /// Transmit one frame.
    fn send_frame(
        &mut self,
        frame: OutboundFrame<'_>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

struct Inner<S> {
    pending: VecDeque<String>,
    session: Option<S>,
}

/// Ordered, buffering writer over at most one bound session.
///
/// One mutex covers the pending queue and the session binding, and it is
/// held across the network I/O of a delivery: a `bind` can never race a
/// `send` into reordering or duplicating messages. The trade-off (callers
/// block while another send is on the wire) is accepted for the ordering
/// guarantee.
pub struct OutboundWriter<S> {
    inner: Mutex<Inner<S>>,
}

impl<S: MessageTransport> OutboundWriter<S> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                session: None,
            }),
        }
    }

    /// Send one opaque serialized message.
    ///
    /// Delivered immediately when an open session is bound; buffered
    /// otherwise. Delivery failures are logged and the message is buffered
    /// for the next session — they never surface to the caller.
    pub async fn send(&self, message: impl Into<String>) {
        let message = message.into();
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        match inner.session {
            Some(ref mut session) if session.is_open() => {
                if let Err(err) = deliver(session, &message).await {
                    warn!(%err, "message delivery failed, buffering for next session");
                    inner.pending.push_back(message);
                }
            }
            _ => inner.pending.push_back(message),
        }
    }

    /// Bind a new session and replay the backlog head-to-tail.
    ///
    /// Replaces any previous binding. Replay stops at the first failing
    /// message, which goes back to the head so the backlog keeps its order
    /// for the next bind.
    pub async fn bind(&self, session: S) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.session = Some(session);

        let backlog = inner.pending.len();
        let pending = &mut inner.pending;
        if let Some(session) = inner.session.as_mut() {
            while let Some(message) = pending.pop_front() {
                if !session.is_open() {
                    pending.push_front(message);
                    break;
                }
                if let Err(err) = deliver(session, &message).await {
                    warn!(%err, "backlog replay failed, keeping message for next session");
                    pending.push_front(message);
                    break;
                }
            }
        }
        if backlog > 0 {
            debug!(backlog, remaining = pending.len(), "drained pending backlog");
        }
    }

    /// Drop the binding if the bound session has the given id.
    ///
    /// Session teardown goes through here so a stale release (from a
    /// session that already ended) can never unbind a newer session.
    pub async fn release(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.session {
            Some(ref session) if session.id() == id => {
                inner.session = None;
                true
            }
            _ => false,
        }
    }

    /// Number of messages waiting for a session.
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Whether a session is currently bound (open or not).
    pub async fn is_bound(&self) -> bool {
        self.inner.lock().await.session.is_some()
    }
}

impl<S: MessageTransport> Default for OutboundWriter<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Transmit one message as consecutive frames, final flag on the last.
async fn deliver<S: MessageTransport>(
    session: &mut S,
    message: &str,
) -> Result<(), TransportError> {
    for frame in chunks(message) {
        session.send_frame(frame).await?;
    }
    Ok(())
}
