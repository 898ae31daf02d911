use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::Event;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("payload serialization failed: {0}")]
    Serialize(String),
}

/// Envelope for a published event, carrying stream metadata.
///
/// Notes:
/// - `stream_type` names the kind of record that changed ("transfers.request",
///   "inventory.ledger").
/// - `stream_id` identifies the record within that kind (transfer id, or
///   `ownerKind/ownerId/itemTypeId` for ledger rows) so subscribers can scope
///   invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    stream_type: String,
    stream_id: String,
    event_type: String,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        stream_type: impl Into<String>,
        stream_id: impl Into<String>,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            stream_type: stream_type.into(),
            stream_id: stream_id.into(),
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl EventEnvelope<JsonValue> {
    /// Wrap a typed domain event as a JSON envelope ready for publication.
    pub fn from_typed<T>(
        stream_type: impl Into<String>,
        stream_id: impl Into<String>,
        event: &T,
    ) -> Result<Self, EnvelopeError>
    where
        T: Event + Serialize,
    {
        let payload =
            serde_json::to_value(event).map_err(|e| EnvelopeError::Serialize(e.to_string()))?;

        Ok(Self::new(
            Uuid::now_v7(),
            stream_type,
            stream_id,
            event.event_type(),
            event.occurred_at(),
            payload,
        ))
    }
}
