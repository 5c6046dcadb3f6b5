//! Writer tests — buffering order, backlog drain, chunked delivery, and
//! failure re-queueing against an in-memory mock session.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use uuid::Uuid;

    use tether_protocol::{FrameKind, OutboundFrame, MAX_OUTBOUND_FRAME_BYTES};
    use tether_transport::{MessageTransport, OutboundWriter, SessionState, TransportError};

    // ─────────────────────────────────────────────────────────────────────
    // Mock session
    // ─────────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct LogInner {
        frames: Vec<(FrameKind, Vec<u8>, bool)>,
        attempts: usize,
        fail_at_attempt: Option<usize>,
    }

    /// Records every frame a session receives; can be scripted to fail one
    /// specific send attempt.
    #[derive(Clone, Default)]
    struct FrameLog(Arc<Mutex<LogInner>>);

    impl FrameLog {
        fn session(&self) -> (MockSession, SessionState) {
            let state = SessionState::new();
            let session = MockSession {
                id: Uuid::new_v4(),
                state: state.clone(),
                log: self.clone(),
            };
            (session, state)
        }

        fn fail_at_attempt(&self, attempt: usize) {
            self.0.lock().fail_at_attempt = Some(attempt);
        }

        fn frames(&self) -> Vec<(FrameKind, usize, bool)> {
            self.0
                .lock()
                .frames
                .iter()
                .map(|(kind, payload, fin)| (*kind, payload.len(), *fin))
                .collect()
        }

        /// Reassemble logical messages from the recorded frames.
        fn messages(&self) -> Vec<String> {
            let mut messages = Vec::new();
            let mut current = Vec::new();
            for (kind, payload, fin) in &self.0.lock().frames {
                if *kind == FrameKind::Text {
                    current.clear();
                }
                current.extend_from_slice(payload);
                if *fin {
                    messages.push(String::from_utf8(std::mem::take(&mut current)).unwrap());
                }
            }
            messages
        }
    }

    struct MockSession {
        id: Uuid,
        state: SessionState,
        log: FrameLog,
    }

    impl MessageTransport for MockSession {
        fn id(&self) -> Uuid {
            self.id
        }

        fn is_open(&self) -> bool {
            self.state.is_open()
        }

        async fn send_frame(&mut self, frame: OutboundFrame<'_>) -> Result<(), TransportError> {
            let mut log = self.log.0.lock();
            let attempt = log.attempts;
            log.attempts += 1;
            if log.fail_at_attempt == Some(attempt) {
                log.fail_at_attempt = None;
                return Err(TransportError::UnexpectedEof);
            }
            log.frames.push((frame.kind, frame.payload.to_vec(), frame.fin));
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Buffering and draining
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn sends_without_a_session_buffer_in_call_order() {
        let writer = OutboundWriter::new();
        writer.send("first").await;
        writer.send("second").await;
        writer.send("third").await;
        assert_eq!(writer.pending_len().await, 3);
        assert!(!writer.is_bound().await);

        let log = FrameLog::default();
        let (session, _state) = log.session();
        writer.bind(session).await;

        assert_eq!(writer.pending_len().await, 0);
        assert_eq!(log.messages(), ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn buffered_ping_arrives_as_one_final_frame() {
        let writer = OutboundWriter::new();
        writer.send("ping").await;
        assert_eq!(writer.pending_len().await, 1);

        let log = FrameLog::default();
        let (session, _state) = log.session();
        writer.bind(session).await;

        assert_eq!(writer.pending_len().await, 0);
        assert_eq!(log.frames(), [(FrameKind::Text, 4, true)]);
    }

    #[tokio::test]
    async fn send_on_open_session_skips_the_buffer() {
        let log = FrameLog::default();
        let (session, _state) = log.session();
        let writer = OutboundWriter::new();
        writer.bind(session).await;

        writer.send("direct").await;
        assert_eq!(writer.pending_len().await, 0);
        assert_eq!(log.messages(), ["direct"]);
    }

    #[tokio::test]
    async fn send_after_session_closes_buffers_instead() {
        let log = FrameLog::default();
        let (session, state) = log.session();
        let writer = OutboundWriter::new();
        writer.bind(session).await;

        state.mark_closed();
        writer.send("held back").await;

        assert_eq!(writer.pending_len().await, 1);
        assert!(log.messages().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Chunked delivery
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn large_message_is_fragmented_with_final_flag_on_last() {
        let log = FrameLog::default();
        let (session, _state) = log.session();
        let writer = OutboundWriter::new();
        writer.bind(session).await;

        writer.send("z".repeat(200_000)).await;

        assert_eq!(
            log.frames(),
            [
                (FrameKind::Text, 65536, false),
                (FrameKind::Continuation, 65536, false),
                (FrameKind::Continuation, 65536, false),
                (FrameKind::Continuation, 3392, true),
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_large_sends_never_interleave_frames() {
        let log = FrameLog::default();
        let (session, _state) = log.session();
        let writer = Arc::new(OutboundWriter::new());
        writer.bind(session).await;

        let big_a = "a".repeat(MAX_OUTBOUND_FRAME_BYTES * 2 + 7);
        let big_b = "b".repeat(MAX_OUTBOUND_FRAME_BYTES * 3 + 1);
        let wa = writer.clone();
        let wb = writer.clone();
        let ta = tokio::spawn(async move { wa.send(big_a).await });
        let tb = tokio::spawn(async move { wb.send(big_b).await });
        ta.await.unwrap();
        tb.await.unwrap();

        // Each message's frames must be contiguous: a Text frame may only
        // appear after the previous message finished.
        let mut in_message = false;
        for (kind, _, fin) in log.frames() {
            match kind {
                FrameKind::Text => {
                    assert!(!in_message, "new message started mid-fragmentation");
                    in_message = !fin;
                }
                FrameKind::Continuation => {
                    assert!(in_message, "continuation without a message in flight");
                    in_message = !fin;
                }
            }
        }
        assert!(!in_message);
        let mut messages = log.messages();
        messages.sort_by_key(|m| m.len());
        assert_eq!(messages[0].len(), MAX_OUTBOUND_FRAME_BYTES * 2 + 7);
        assert_eq!(messages[1].len(), MAX_OUTBOUND_FRAME_BYTES * 3 + 1);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Failure handling
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn failed_send_requeues_and_replays_verbatim_on_next_bind() {
        let log = FrameLog::default();
        let (session, _state) = log.session();
        let writer = OutboundWriter::new();
        writer.bind(session).await;

        // Fail mid-transmission: the second frame of a four-frame message.
        log.fail_at_attempt(1);
        let message = "r".repeat(200_000);
        writer.send(message.clone()).await;
        assert_eq!(writer.pending_len().await, 1);

        let retry_log = FrameLog::default();
        let (retry_session, _state) = retry_log.session();
        writer.bind(retry_session).await;

        assert_eq!(writer.pending_len().await, 0);
        assert_eq!(retry_log.messages(), [message]);
    }

    #[tokio::test]
    async fn drain_failure_keeps_backlog_order_for_next_bind() {
        let writer = OutboundWriter::new();
        writer.send("one").await;
        writer.send("two").await;
        writer.send("three").await;

        let log = FrameLog::default();
        let (session, _state) = log.session();
        log.fail_at_attempt(0);
        writer.bind(session).await;

        // Nothing was delivered; the whole backlog waits, in order.
        assert!(log.messages().is_empty());
        assert_eq!(writer.pending_len().await, 3);

        let retry_log = FrameLog::default();
        let (retry_session, _state) = retry_log.session();
        writer.bind(retry_session).await;
        assert_eq!(retry_log.messages(), ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn drain_failure_midway_stops_without_losing_the_tail() {
        let writer = OutboundWriter::new();
        writer.send("one").await;
        writer.send("two").await;
        writer.send("three").await;

        let log = FrameLog::default();
        let (session, _state) = log.session();
        // "one" goes through (attempt 0), "two" fails (attempt 1).
        log.fail_at_attempt(1);
        writer.bind(session).await;

        assert_eq!(log.messages(), ["one"]);
        assert_eq!(writer.pending_len().await, 2);

        let retry_log = FrameLog::default();
        let (retry_session, _state) = retry_log.session();
        writer.bind(retry_session).await;
        assert_eq!(retry_log.messages(), ["two", "three"]);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Rebinding and release
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn second_bind_with_empty_backlog_delivers_nothing_twice() {
        let first_log = FrameLog::default();
        let (first_session, _state) = first_log.session();
        let writer = OutboundWriter::new();
        writer.bind(first_session).await;
        writer.send("once").await;

        let second_log = FrameLog::default();
        let (second_session, _state) = second_log.session();
        writer.bind(second_session).await;

        assert_eq!(first_log.messages(), ["once"]);
        assert!(second_log.messages().is_empty());
        assert_eq!(writer.pending_len().await, 0);
    }

    #[tokio::test]
    async fn release_only_unbinds_the_matching_session() {
        let log = FrameLog::default();
        let (session, _state) = log.session();
        let id = session.id();
        let writer = OutboundWriter::new();
        writer.bind(session).await;

        assert!(!writer.release(Uuid::new_v4()).await);
        assert!(writer.is_bound().await);
        assert!(writer.release(id).await);
        assert!(!writer.is_bound().await);
        assert!(!writer.release(id).await);
    }
}
