//! tether client — connection establishment.
//!
//! Performs one connection attempt: proxy traversal, TLS, and handshake
//! header injection; then wires inbound messages to the caller's sink,
//! binds the session into the writer (draining any backlog), and returns
//! the connection's lifetime handle. Reconnection policy lives with the
//! caller: call [`connect`] again to hand the writer a fresh session.

mod connect;
mod dial;
mod error;

pub use connect::{connect, derive_origin, ConnectOptions};
pub use error::ConnectError;
pub use tokio_tungstenite::Connector;
