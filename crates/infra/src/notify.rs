//! Post-commit change notifications.

use serde::Serialize;
use serde_json::Value as JsonValue;

use stockline_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};

/// The bus services publish on once their unit of work has committed.
pub type NotificationBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

pub const STREAM_ITEM_TYPE: &str = "catalog.item_type";
pub const STREAM_LEDGER: &str = "inventory.ledger";
pub const STREAM_TRANSFER: &str = "transfers.request";

/// Publish one committed event. Failures are logged, never returned: the
/// change is already durable and must not be reported as failed.
pub(crate) fn publish<E>(bus: &NotificationBus, stream_type: &'static str, stream_id: String, event: &E)
where
    E: Event + Serialize,
{
    let envelope = match EventEnvelope::from_typed(stream_type, stream_id, event) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::error!(event_type = event.event_type(), error = %err, "failed to encode event");
            return;
        }
    };

    if let Err(err) = bus.publish(envelope) {
        tracing::error!(event_type = event.event_type(), error = ?err, "failed to publish event");
    }
}
