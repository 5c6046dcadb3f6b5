//! tether protocol types — frames, chunking, proxy configuration.
//!
//! This crate is the single source of truth for the transport's wire-level
//! constants and pure types. It never touches the network; everything here
//! is testable without I/O.

pub mod close;
pub mod error;
pub mod frame;
pub mod proxy;

pub use close::CloseInfo;
pub use error::ProxyParseError;
pub use frame::{
    chunks, FrameKind, OutboundFrame, MAX_INBOUND_MESSAGE_BYTES, MAX_OUTBOUND_FRAME_BYTES,
};
pub use proxy::{ProxyConfig, ProxyScheme};
