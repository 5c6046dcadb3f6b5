//! Inbound collaborator seam.

/// Receives every raw inbound message from the currently bound session.
///
/// The transport never parses message contents; whatever RPC layer sits
/// above supplies one of these and does its own framing and correlation.
pub trait InboundSink: Send + Sync + 'static {
    fn on_message(&self, raw: String);
}
