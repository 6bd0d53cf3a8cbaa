//! Step-event broadcasting.
//!
//! The state machine emits an ordered sequence of step events per
//! transfer. Consumers (UIs, loggers, relayer triggers) subscribe
//! independently; the channel is single-producer multi-consumer and a
//! slow or dropped consumer never blocks the producer — laggards miss
//! events rather than applying backpressure.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::transfer::{TransferId, TransferStatus};

/// Buffered events per subscriber before laggards start missing them.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A step event emitted on every transfer transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferEvent {
    /// The transfer this event belongs to.
    pub transfer_id: TransferId,
    /// Status after the transition.
    pub status: TransferStatus,
    /// Short step name, mirroring the step log.
    pub step: String,
    /// Human-readable message.
    pub message: String,
    /// Unix time of the transition.
    pub timestamp: u64,
    /// Whether the event records an error.
    pub is_error: bool,
}

/// Single-producer multi-consumer event fan-out.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TransferEvent>,
}

impl EventBus {
    /// Create a bus with the given per-subscriber buffer.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.sender.subscribe()
    }

    /// Emit an event. Never blocks; an absent audience is not an error.
    pub fn emit(&self, event: TransferEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: TransferStatus, step: &str) -> TransferEvent {
        TransferEvent {
            transfer_id: [7u8; 32],
            status,
            step: step.to_string(),
            message: step.to_string(),
            timestamp: 0,
            is_error: false,
        }
    }

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(event(TransferStatus::Pending, "pending"));
        bus.emit(event(TransferStatus::Locked, "locked"));

        assert_eq!(rx.recv().await.unwrap().step, "pending");
        assert_eq!(rx.recv().await.unwrap().step, "locked");
    }

    #[tokio::test]
    async fn emitting_without_subscribers_does_not_fail() {
        let bus = EventBus::default();
        bus.emit(event(TransferStatus::Pending, "pending"));
    }

    #[tokio::test]
    async fn each_subscriber_gets_its_own_stream() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(event(TransferStatus::Settled, "settled"));

        assert_eq!(a.recv().await.unwrap().step, "settled");
        assert_eq!(b.recv().await.unwrap().step, "settled");
    }
}
