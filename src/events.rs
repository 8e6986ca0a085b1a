use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;
use uuid::Uuid;

/// What happened to a row in a watched table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

/// A change notification for one row. Consumers are expected to re-fetch the
/// affected list rather than patch local copies, so a missed event (lagged
/// subscriber) is harmless.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub action: ChangeAction,
    pub id: Uuid,
}

/// Fan-out channel for table change events, one broadcast sender shared by
/// every handler through `AppState`.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a change. Send errors only mean nobody is listening.
    pub fn publish(&self, table: &'static str, action: ChangeAction, id: Uuid) {
        let event = ChangeEvent { table, action, id };
        if self.tx.send(event).is_err() {
            tracing::trace!(table, "change event dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();
        bus.publish("products", ChangeAction::Created, id);

        let event = rx.recv().await.expect("event");
        assert_eq!(event.table, "products");
        assert_eq!(event.action, ChangeAction::Created);
        assert_eq!(event.id, id);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new(8);
        bus.publish("orders", ChangeAction::Deleted, Uuid::new_v4());
    }
}
