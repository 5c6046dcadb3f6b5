//! Transport error taxonomy.

use thiserror::Error;

/// A frame delivery or session-level failure.
///
/// Send-path instances never reach `send` callers — the writer re-queues
/// the message and logs. Session-level instances surface through the
/// connection handle's `Errored` terminal state.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    /// The stream ended without a close handshake.
    #[error("connection ended unexpectedly")]
    UnexpectedEof,
}
