//! Outbound notifications about rule activity.

use std::future::Future;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::event::Event;

/// Sink for [`Event`]s consumed by the live stream and any other listener.
pub trait EventPublisher {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), AdPilotError>> + Send;

    /// Publish, logging a failure instead of returning it.
    ///
    /// Rule mutations and executions are already persisted when their
    /// event is raised, so a lost notification must not fail them.
    fn notify(&self, event: Event) -> impl Future<Output = ()> + Send
    where
        Self: Sync,
    {
        async move {
            let event_type = event.event_type;
            let rule_id = event.rule_id;
            if let Err(err) = self.publish(event).await {
                tracing::warn!(%event_type, ?rule_id, error = %err, "failed to publish event");
            }
        }
    }
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        (**self).publish(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use adpilot_domain::event::EventType;
    use adpilot_domain::id::RuleId;

    use super::*;

    #[derive(Default)]
    struct Refusing {
        attempts: Mutex<usize>,
    }

    impl EventPublisher for Refusing {
        fn publish(&self, _event: Event) -> impl Future<Output = Result<(), AdPilotError>> + Send {
            *self.attempts.lock().unwrap() += 1;
            async { Err(AdPilotError::Storage("bus closed".into())) }
        }
    }

    #[tokio::test]
    async fn should_swallow_publish_failure_when_notifying() {
        let publisher = Refusing::default();
        let event = Event::new(EventType::RuleCreated, Some(RuleId::new()), serde_json::json!({}));

        publisher.notify(event).await;

        assert_eq!(*publisher.attempts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn should_forward_through_arc() {
        let publisher = std::sync::Arc::new(Refusing::default());
        let event = Event::new(EventType::RuleUpdated, None, serde_json::json!({}));

        assert!(publisher.publish(event).await.is_err());
        assert_eq!(*publisher.attempts.lock().unwrap(), 1);
    }
}
