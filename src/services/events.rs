use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

pub const APPOINTMENTS_KEY: &str = "appointments";

pub fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    Cleared,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub key: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Publish/subscribe on a key. Publishing never blocks; a subscriber that
/// falls behind skips the events it missed.
#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, key: &str, kind: ChangeKind, id: Option<&str>) {
        let event = ChangeEvent {
            key: key.to_string(),
            kind,
            id: id.map(str::to_string),
        };
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Events for `key` published after this call.
    pub fn subscribe(&self, key: &str) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        let key = key.to_string();
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |result| match result {
            Ok(event) if event.key == key => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(key = %key, skipped, "change subscriber lagged");
                None
            }
        })
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_subscriber_only_sees_its_key() {
        let notifier = ChangeNotifier::default();
        let mut appointments = Box::pin(notifier.subscribe(APPOINTMENTS_KEY));

        notifier.publish(&session_key("s-1"), ChangeKind::Updated, None);
        notifier.publish(APPOINTMENTS_KEY, ChangeKind::Created, Some("a-1"));

        let event = tokio::time::timeout(Duration::from_secs(1), appointments.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.key, APPOINTMENTS_KEY);
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.id.as_deref(), Some("a-1"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let notifier = ChangeNotifier::new(4);
        for _ in 0..10 {
            notifier.publish(APPOINTMENTS_KEY, ChangeKind::Cleared, None);
        }
    }
}
