//! SPI bus seam and the event-log hook shared by both device drivers.

use crate::HalResult;
use async_trait::async_trait;
use switch_types::EventCode;
use tokio::sync::mpsc;

/// One chip-select-framed, full-duplex SPI transaction.
///
/// Implementations assert chip select, clock out every byte of `tx` while
/// capturing the byte received in its place, then release chip select. The
/// returned buffer always has the same length as `tx`.
#[async_trait]
pub trait SpiBus: Send {
    async fn transfer(&mut self, tx: &[u8]) -> HalResult<Vec<u8>>;
}

#[async_trait]
impl SpiBus for Box<dyn SpiBus> {
    async fn transfer(&mut self, tx: &[u8]) -> HalResult<Vec<u8>> {
        (**self).transfer(tx).await
    }
}

/// Non-blocking hook into the event-log queue.
///
/// Device drivers report read/write/error events through this sink. Sends
/// never block and never fail the calling operation: if the logger task is
/// not running or its queue is full, the event is dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<EventCode>>,
}

impl EventSink {
    /// Creates a sink feeding the given logger queue.
    pub fn new(tx: mpsc::Sender<EventCode>) -> Self {
        EventSink { tx: Some(tx) }
    }

    /// Creates a sink that discards every event.
    pub fn disabled() -> Self {
        EventSink { tx: None }
    }

    /// Enqueues an event code, dropping it if the queue is unavailable.
    pub fn record(&self, code: EventCode) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_delivers_and_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        sink.record(EventCode::EepromReadOp);
        // Queue is full now; the second record is dropped, not an error.
        sink.record(EventCode::EepromWriteOp);
        assert_eq!(rx.recv().await, Some(EventCode::EepromReadOp));
        assert!(rx.try_recv().is_err());

        EventSink::disabled().record(EventCode::EepromReadOp);
    }
}
