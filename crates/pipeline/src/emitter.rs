//! Event sink and wire framing.
//!
//! Stages push [`StreamEvent`]s into an [`EventSink`]; the transport reads
//! the receiving half and writes one frame per event with no extra buffering.
//! A dropped receiver means the caller disconnected.

use crate::events::StreamEvent;
use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Frame delimiter: each event is one JSON object followed by a blank line.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Default number of events buffered between the pipeline and the transport.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Sending half of a request's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    /// Send an event. Returns `false` when the caller is gone.
    pub async fn send(&self, event: StreamEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the receiving half has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Create a sink and the matching receiver.
pub fn channel(capacity: usize) -> (EventSink, mpsc::Receiver<StreamEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, rx)
}

/// Serialize one event as a frame.
pub fn frame(event: &StreamEvent) -> String {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize stream event");
        r#"{"type":"content","done":false,"error":"internal serialization error"}"#.to_string()
    });
    format!("{}{}", json, FRAME_DELIMITER)
}

/// Turn the receiving half into a stream of frames.
pub fn frames(rx: mpsc::Receiver<StreamEvent>) -> impl Stream<Item = String> + Send + 'static {
    ReceiverStream::new(rx).map(|event| frame(&event))
}
