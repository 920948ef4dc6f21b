//! Entity events and the broadcast bus that distributes them.
//!
//! Reconciliation cycles emit events for label creation, label counter
//! changes, record updates and deletions. Consumers (search indexers,
//! counters, notification streams) subscribe independently.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

// ============================================================================
// Event Envelope
// ============================================================================

/// Who or what caused an event.
#[derive(Debug, Clone, Serialize)]
pub struct EventActor {
    /// Actor type: `"system"` or `"user"`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl EventActor {
    /// Background pipelines (metadata extraction, classification, geocoding).
    pub fn system() -> Self {
        Self {
            kind: "system".to_string(),
            id: None,
        }
    }

    /// A user submitting an edit form.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: "user".to_string(),
            id: Some(id.into()),
        }
    }
}

/// Optional emission context.
#[derive(Debug, Clone, Default)]
pub struct EventContext {
    /// Defaults to the system actor.
    pub actor: Option<EventActor>,
    /// Correlates all events emitted by one reconciliation cycle.
    pub correlation_id: Option<Uuid>,
}

/// Versioned wrapper around a [`ServerEvent`].
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// UUIDv7 for temporal ordering.
    pub event_id: Uuid,
    /// Namespaced event type (e.g. `"label.created"`).
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: EventActor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    pub payload_version: u32,
    pub payload: ServerEvent,
}

impl EventEnvelope {
    pub fn new(event: ServerEvent) -> Self {
        Self::with_context(event, EventContext::default())
    }

    pub fn with_context(event: ServerEvent, ctx: EventContext) -> Self {
        Self {
            event_id: crate::uuid_utils::new_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            actor: ctx.actor.unwrap_or_else(EventActor::system),
            entity_type: Some(event.entity_type().to_string()),
            entity_id: event.entity_id().map(|id| id.to_string()),
            correlation_id: ctx.correlation_id,
            payload_version: 1,
            payload: event,
        }
    }
}

// ============================================================================
// Server Event (domain payloads)
// ============================================================================

/// Domain events, serialized with a `type` tag:
/// `{"type":"LabelCreated","label_id":"...","slug":"cat",...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A label entity was created by a find-or-create call.
    LabelCreated {
        label_id: Uuid,
        slug: String,
        name: String,
        priority: i32,
    },
    /// The global label counter changed.
    LabelCountChanged { delta: i64 },
    /// A reconciliation cycle persisted a record.
    RecordUpdated {
        record_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        keyword_count: usize,
        label_count: usize,
    },
    /// A record was soft or permanently deleted.
    RecordDeleted { record_id: Uuid, permanent: bool },
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::LabelCreated { .. } => "LabelCreated",
            ServerEvent::LabelCountChanged { .. } => "LabelCountChanged",
            ServerEvent::RecordUpdated { .. } => "RecordUpdated",
            ServerEvent::RecordDeleted { .. } => "RecordDeleted",
        }
    }

    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            ServerEvent::LabelCreated { .. } => "label.created",
            ServerEvent::LabelCountChanged { .. } => "count.labels",
            ServerEvent::RecordUpdated { .. } => "record.updated",
            ServerEvent::RecordDeleted { .. } => "record.deleted",
        }
    }

    pub fn entity_type(&self) -> &'static str {
        match self {
            ServerEvent::LabelCreated { .. } | ServerEvent::LabelCountChanged { .. } => "label",
            ServerEvent::RecordUpdated { .. } | ServerEvent::RecordDeleted { .. } => "record",
        }
    }

    pub fn entity_id(&self) -> Option<Uuid> {
        match self {
            ServerEvent::LabelCreated { label_id, .. } => Some(*label_id),
            ServerEvent::LabelCountChanged { .. } => None,
            ServerEvent::RecordUpdated { record_id, .. }
            | ServerEvent::RecordDeleted { record_id, .. } => Some(*record_id),
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast bus for [`EventEnvelope`]s.
///
/// Slow receivers get `Lagged` and miss events. Emitting without
/// subscribers drops the event.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit with the system actor.
    pub fn emit(&self, event: ServerEvent) {
        self.emit_with_context(event, EventContext::default());
    }

    pub fn emit_with_context(&self, event: ServerEvent, ctx: EventContext) {
        let envelope = EventEnvelope::with_context(event, ctx);
        tracing::debug!(
            subsystem = "events",
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        let label_id = Uuid::new_v4();

        bus.emit(ServerEvent::LabelCreated {
            label_id,
            slug: "cat".to_string(),
            name: "Cat".to_string(),
            priority: 0,
        });

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "label.created");
        assert_eq!(envelope.entity_type.as_deref(), Some("label"));
        assert_eq!(envelope.entity_id, Some(label_id.to_string()));
        assert_eq!(envelope.actor.kind, "system");
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::new(4);
        bus.emit(ServerEvent::LabelCountChanged { delta: 1 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_emit_with_user_context() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let correlation = Uuid::new_v4();

        bus.emit_with_context(
            ServerEvent::RecordDeleted {
                record_id: Uuid::nil(),
                permanent: true,
            },
            EventContext {
                actor: Some(EventActor::user("alice")),
                correlation_id: Some(correlation),
            },
        );

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.actor.kind, "user");
        assert_eq!(envelope.correlation_id, Some(correlation));
    }

    #[test]
    fn test_server_event_json() {
        let event = ServerEvent::RecordUpdated {
            record_id: Uuid::nil(),
            title: None,
            keyword_count: 3,
            label_count: 1,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"RecordUpdated""#));
        assert!(json.contains(r#""keyword_count":3"#));
        assert!(!json.contains("title"));
    }
}
