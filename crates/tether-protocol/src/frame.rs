//! Outbound frame model and message chunking.
//!
//! A logical message travels as a single final text frame when it fits the
//! outbound limit, or as a text frame followed by continuation frames when
//! it does not. Only the last frame of a message carries the final flag,
//! and all frames of one message are transmitted back-to-back.

/// Maximum payload carried by one outbound frame.
pub const MAX_OUTBOUND_FRAME_BYTES: usize = 64 * 1024;

/// Maximum inbound message size accepted from the server.
///
/// Server-to-client payloads can be far larger than anything the client
/// sends; sessions are configured with this limit, independent of the
/// outbound frame limit, so legitimate large messages are not rejected.
pub const MAX_INBOUND_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

/// Position of a frame within its logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// First (possibly only) frame of a message.
    Text,
    /// Follow-up frame of a fragmented message.
    Continuation,
}

/// One frame of a chunked outbound message.
///
/// The payload is a byte slice because fragment boundaries may fall inside
/// a multi-byte character; only the reassembled message is valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundFrame<'a> {
    pub kind: FrameKind,
    pub payload: &'a [u8],
    pub fin: bool,
}

/// Split a message into outbound frames.
///
/// Messages of up to [`MAX_OUTBOUND_FRAME_BYTES`] yield exactly one final
/// frame (an empty message still yields one); larger messages yield
/// `ceil(len / MAX_OUTBOUND_FRAME_BYTES)` frames in order.
pub fn chunks(message: &str) -> Chunks<'_> {
    Chunks {
        rest: message.as_bytes(),
        first: true,
    }
}

/// Iterator over the frames of one message. See [`chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    rest: &'a [u8],
    first: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = OutboundFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() && !self.first {
            return None;
        }
        let take = self.rest.len().min(MAX_OUTBOUND_FRAME_BYTES);
        let (payload, rest) = self.rest.split_at(take);
        self.rest = rest;
        let kind = if self.first {
            FrameKind::Text
        } else {
            FrameKind::Continuation
        };
        self.first = false;
        Some(OutboundFrame {
            kind,
            payload,
            fin: rest.is_empty(),
        })
    }
}
