//! Outbound message emission to a single WebSocket connection (§4.8).
//!
//! Only one task ever writes to the socket sink, mirroring the teacher's
//! single-writer-task rule in `api/ws.rs` (multiple tasks calling
//! `sender.send` on the same split sink interleave frames). Everything else
//! — the recorder loop, the idle-timeout checker, the status ticker — hands
//! its [`ServerMessage`] to this emitter's channel instead of touching the
//! socket directly.

use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

/// One queued outbound unit: either a JSON message, or a request to close
/// the socket with a specific WebSocket close code.
#[derive(Debug)]
pub enum Outbound {
    Message(ServerMessage),
    Close(u16),
}

/// Handle other tasks use to queue outbound messages.
#[derive(Clone)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<Outbound>,
}

/// The receiving half, owned by the single task that writes to the socket.
pub struct EmitterSink {
    rx: mpsc::UnboundedReceiver<Outbound>,
}

/// Creates a connected emitter/sink pair for one session.
#[must_use]
pub fn channel() -> (Emitter, EmitterSink) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Emitter { tx }, EmitterSink { rx })
}

impl Emitter {
    /// Queues a message. Silently drops it if the sink side has already
    /// gone away (the socket closed).
    pub fn send(&self, message: ServerMessage) {
        let _ = self.tx.send(Outbound::Message(message));
    }

    /// Requests the writer task close the socket with the given close code
    /// once prior queued messages have been flushed.
    pub fn close(&self, code: u16) {
        let _ = self.tx.send(Outbound::Close(code));
    }
}

impl EmitterSink {
    /// Awaits the next queued item.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StatusDetail;

    #[tokio::test]
    async fn queued_message_is_received_in_order() {
        let (emitter, mut sink) = channel();
        emitter.send(ServerMessage::Stable {
            full: "one".into(),
            seq: 1,
            t_ms: 0,
        });
        emitter.send(ServerMessage::Status {
            stage: "listening",
            detail: StatusDetail::default(),
        });

        let first = sink.recv().await.unwrap();
        assert!(matches!(
            first,
            Outbound::Message(ServerMessage::Stable { ref full, .. }) if full == "one"
        ));
        let second = sink.recv().await.unwrap();
        assert!(matches!(
            second,
            Outbound::Message(ServerMessage::Status { .. })
        ));
    }

    #[tokio::test]
    async fn close_request_is_received() {
        let (emitter, mut sink) = channel();
        emitter.close(1008);
        let item = sink.recv().await.unwrap();
        assert!(matches!(item, Outbound::Close(1008)));
    }

    #[tokio::test]
    async fn send_after_sink_dropped_does_not_panic() {
        let (emitter, sink) = channel();
        drop(sink);
        emitter.send(ServerMessage::Stable {
            full: "x".into(),
            seq: 1,
            t_ms: 0,
        });
    }
}
