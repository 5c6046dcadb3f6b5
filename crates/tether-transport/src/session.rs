//! WebSocket-backed session: the write half plus a shared open flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::Frame;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use tether_protocol::{FrameKind, OutboundFrame, MAX_INBOUND_MESSAGE_BYTES};

use crate::error::TransportError;
use crate::writer::MessageTransport;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, Message>;
pub type WsSource = SplitStream<WsStream>;

/// Open/closed flag shared between a session, its reader task, and the
/// connection handle. Once closed it never reopens.
#[derive(Debug, Clone)]
pub struct SessionState {
    open: Arc<AtomicBool>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Session configuration accepting very large server-to-client payloads,
/// independent of the outbound frame limit. Applied at handshake time —
/// the underlying library fixes limits when the session is constructed,
/// which is strictly before the session can be bound.
pub fn inbound_websocket_config() -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(MAX_INBOUND_MESSAGE_BYTES))
        .max_frame_size(Some(MAX_INBOUND_MESSAGE_BYTES))
}

/// The write half of one established connection.
pub struct WsSession {
    id: Uuid,
    state: SessionState,
    sink: WsSink,
}

impl WsSession {
    pub fn new(sink: WsSink, state: SessionState) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            sink,
        }
    }
}

impl MessageTransport for WsSession {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    async fn send_frame(&mut self, frame: OutboundFrame<'_>) -> Result<(), TransportError> {
        let opcode = match frame.kind {
            FrameKind::Text => OpCode::Data(Data::Text),
            FrameKind::Continuation => OpCode::Data(Data::Continue),
        };
        let raw = Frame::message(Bytes::copy_from_slice(frame.payload), opcode, frame.fin);
        self.sink.send(Message::Frame(raw)).await?;
        Ok(())
    }
}
