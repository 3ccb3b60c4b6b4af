//! Single-writer outbound channel for the translation WebSocket (§4.8).
//!
//! Concurrent producers (the commit worker, the draft worker, the session
//! loop itself) never touch the socket directly; they submit through an
//! `Emitter` clone, and one writer task drains the paired `EmitterSink`,
//! mirroring the teacher's single-writer-task rule.

use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

/// An item queued for the writer task.
#[derive(Debug)]
pub enum Outbound {
    Message(ServerMessage),
    Close(u16),
}

/// Cheaply cloned handle producers use to submit outbound frames.
#[derive(Clone)]
pub struct Emitter {
    tx: mpsc::UnboundedSender<Outbound>,
}

/// The writer task's receiving half.
pub struct EmitterSink {
    rx: mpsc::UnboundedReceiver<Outbound>,
}

/// Creates a connected `Emitter`/`EmitterSink` pair for one session.
#[must_use]
pub fn channel() -> (Emitter, EmitterSink) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Emitter { tx }, EmitterSink { rx })
}

impl Emitter {
    /// Queues a message for the writer task. Silently dropped if the sink
    /// side (the session has ended) is gone.
    pub fn send(&self, message: ServerMessage) {
        let _ = self.tx.send(Outbound::Message(message));
    }

    /// Requests the writer task close the socket with the given WS close code.
    pub fn close(&self, code: u16) {
        let _ = self.tx.send(Outbound::Close(code));
    }
}

impl EmitterSink {
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_message_is_received_in_order() {
        let (emitter, mut sink) = channel();
        emitter.send(ServerMessage::Status {
            detail: crate::protocol::StatusDetail {
                en_len: 1,
                units_committed: 0,
                vi_len: 0,
            },
        });
        match sink.recv().await {
            Some(Outbound::Message(ServerMessage::Status { detail })) => {
                assert_eq!(detail.en_len, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_request_is_received() {
        let (emitter, mut sink) = channel();
        emitter.close(1000);
        match sink.recv().await {
            Some(Outbound::Close(code)) => assert_eq!(code, 1000),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn send_after_sink_dropped_does_not_panic() {
        let (emitter, sink) = channel();
        drop(sink);
        emitter.send(ServerMessage::Error {
            error: "x".to_string(),
            code: "INTERNAL_ERROR",
        });
    }
}
