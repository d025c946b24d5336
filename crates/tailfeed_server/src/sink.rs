//! Per-session output channel.

use tailfeed_protocol::WireEvent;
use tokio::sync::mpsc;

/// The reader side of the output channel is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Write handle onto a session's reply stream.
///
/// Every producer (the event pipeline and the keepalive ticker) holds a
/// clone; the single receiver writes events to the transport in the
/// order they were accepted, so producers never touch the transport.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<WireEvent>,
}

impl EventSink {
    /// Creates a sink and the receiver that drains it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WireEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queues an event, waiting for capacity.
    pub async fn send(&self, event: WireEvent) -> Result<(), SinkClosed> {
        self.tx.send(event).await.map_err(|_| SinkClosed)
    }

    /// Returns true once the receiver is dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
