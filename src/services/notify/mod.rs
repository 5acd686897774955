pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::models::BookingEvent;

/// Receives booking lifecycle events after they commit.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

/// Writes events to the log and nowhere else.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn publish(&self, event: &BookingEvent) -> anyhow::Result<()> {
        tracing::info!(
            kind = event.kind.as_str(),
            booking = %event.booking_id,
            customer = %event.customer_id,
            provider = %event.provider_id,
            date = %event.date,
            "booking event"
        );
        Ok(())
    }
}

/// Broadcast `event` to in-process subscribers and hand it to the sink on a
/// background task. Delivery failures are logged and otherwise ignored.
pub fn dispatch(
    sink: &Arc<dyn NotificationSink>,
    events_tx: &broadcast::Sender<BookingEvent>,
    event: BookingEvent,
) {
    // No subscribers is fine.
    let _ = events_tx.send(event.clone());

    let sink = Arc::clone(sink);
    tokio::spawn(async move {
        if let Err(e) = sink.publish(&event).await {
            tracing::warn!(
                booking = %event.booking_id,
                kind = event.kind.as_str(),
                "failed to publish booking event: {e:#}"
            );
        }
    });
}
