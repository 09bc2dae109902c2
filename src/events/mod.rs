use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Events emitted by the booking core. Consumed in-process; the consumer
/// only logs today, but the variants carry enough to drive notifications
/// or an analytics sink later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        booking_id: Uuid,
        booking_reference: String,
        channel: String,
    },
    BookingConfirmed(Uuid),
    BookingCancelled {
        booking_id: Uuid,
        actor: String,
    },
    BookingCompleted(Uuid),
    BookingNoShow(Uuid),
    BookingRefunded(Uuid),

    SlotsBlocked {
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    },
    SlotsReleased {
        item_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
        quantity: i32,
    },

    PaymentCaptured(Uuid),
    PaymentFailed(Uuid),

    InventoryItemCreated(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel until all senders are dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::BookingCreated {
                booking_id,
                booking_reference,
                channel,
            } => {
                info!(%booking_id, %booking_reference, %channel, "booking created");
            }
            Event::BookingConfirmed(id) => info!(booking_id = %id, "booking confirmed"),
            Event::BookingCancelled { booking_id, actor } => {
                info!(%booking_id, %actor, "booking cancelled");
            }
            Event::BookingCompleted(id) => info!(booking_id = %id, "booking completed"),
            Event::BookingNoShow(id) => info!(booking_id = %id, "booking marked no-show"),
            Event::BookingRefunded(id) => info!(booking_id = %id, "booking refunded"),
            Event::SlotsBlocked {
                item_id,
                check_in,
                check_out,
                quantity,
            } => {
                info!(%item_id, %check_in, %check_out, quantity, "slots blocked");
            }
            Event::SlotsReleased {
                item_id,
                check_in,
                check_out,
                quantity,
            } => {
                info!(%item_id, %check_in, %check_out, quantity, "slots released");
            }
            Event::PaymentCaptured(id) => info!(booking_id = %id, "payment captured"),
            Event::PaymentFailed(id) => info!(booking_id = %id, "payment failed"),
            Event::InventoryItemCreated(id) => info!(item_id = %id, "inventory item created"),
        }
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::BookingConfirmed(Uuid::nil()))
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::BookingConfirmed(id)) => assert_eq!(id, Uuid::nil()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::PaymentCaptured(Uuid::nil())).await.is_err());
    }
}
