//! tether transport core.
//!
//! The stateful heart of the client: an ordered, buffering outbound writer
//! bound to at most one live session, and a cancellable handle over each
//! connection's lifetime. Establishment (TLS, proxies, handshake headers)
//! lives in `tether-client`; this crate never dials.

pub mod error;
pub mod handle;
pub mod session;
pub mod sink;
pub mod writer;

pub use error::TransportError;
pub use handle::{ConnectionHandle, ConnectionState};
pub use session::{inbound_websocket_config, SessionState, WsSession, WsSink, WsSource, WsStream};
pub use sink::InboundSink;
pub use writer::{MessageTransport, OutboundWriter};
