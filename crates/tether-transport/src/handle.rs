//! Connection lifetime handle: awaitable outcome plus cancellation.

use std::sync::Arc;

use tokio::sync::watch;

use tether_protocol::CloseInfo;

use crate::error::TransportError;
use crate::session::SessionState;

/// Lifecycle of one connection attempt.
///
/// `Connecting -> Open -> {Closed | Errored | Cancelled}`. Exactly one
/// terminal transition ever happens; later completion attempts are no-ops.
#[derive(Debug, Clone)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Graceful close with the peer's code and reason.
    Closed(CloseInfo),
    /// Abnormal termination.
    Errored(Arc<TransportError>),
    /// Locally cancelled via [`ConnectionHandle::cancel`].
    Cancelled,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed(_) | Self::Errored(_) | Self::Cancelled)
    }
}

#[derive(Debug)]
struct Shared {
    state: watch::Sender<ConnectionState>,
    session: SessionState,
}

/// Awaitable, cancellable handle over one connection's lifetime.
///
/// Cloning is cheap; every clone observes the same lifecycle.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    /// Create a handle in the `Connecting` state, tied to the session's
    /// open flag so cancellation can force the session closed.
    pub fn new(session: SessionState) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            shared: Arc::new(Shared { state, session }),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    /// Watch receiver over the lifecycle. The client's reader task selects
    /// on this to observe the terminal transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Resolve once the connection reaches a terminal state.
    ///
    /// Every waiter receives the terminal value; waiters attached after
    /// resolution resolve immediately.
    pub async fn wait(&self) -> ConnectionState {
        let mut rx = self.shared.state.subscribe();
        let state = rx
            .wait_for(ConnectionState::is_terminal)
            .await
            .expect("state sender is held by this handle");
        (*state).clone()
    }

    /// Mark the session open. No-op unless currently `Connecting`.
    pub fn mark_open(&self) {
        self.shared.state.send_if_modified(|state| {
            if matches!(state, ConnectionState::Connecting) {
                *state = ConnectionState::Open;
                true
            } else {
                false
            }
        });
    }

    /// Resolve with a graceful close. Returns false if already terminal.
    pub fn complete_closed(&self, info: CloseInfo) -> bool {
        self.complete(ConnectionState::Closed(info))
    }

    /// Resolve with a transport error. Returns false if already terminal.
    pub fn complete_errored(&self, err: TransportError) -> bool {
        self.complete(ConnectionState::Errored(Arc::new(err)))
    }

    /// Force-close the bound session and resolve `Cancelled`.
    ///
    /// Immediate: the session's open flag drops synchronously (in-flight
    /// sends are not awaited and partially delivered messages are not
    /// rolled back), and the reader task tears the socket down on its next
    /// poll.
    pub fn cancel(&self) {
        self.shared.session.mark_closed();
        self.complete(ConnectionState::Cancelled);
    }

    fn complete(&self, terminal: ConnectionState) -> bool {
        self.shared.state.send_if_modified(|state| {
            if state.is_terminal() {
                false
            } else {
                *state = terminal;
                true
            }
        })
    }
}
