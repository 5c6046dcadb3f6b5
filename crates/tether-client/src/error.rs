//! Connection establishment errors — the only synchronously propagated
//! failure class; everything after a successful handshake surfaces through
//! the connection handle instead.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid endpoint URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("header value contains invalid characters: `{0}`")]
    InvalidHeader(String),
    #[error("failed to reach the endpoint: {0}")]
    Dial(#[from] std::io::Error),
    #[error("proxy `{proxy}` refused the tunnel: {reason}")]
    ProxyHandshake { proxy: String, reason: String },
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
}
