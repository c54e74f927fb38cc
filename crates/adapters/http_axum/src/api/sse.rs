//! Server-Sent Events (SSE) stream for real-time updates.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use adpilot_app::ports::{EventPublisher, ExecutionStore, RuleRepository, RuleRunner};
use adpilot_domain::event::Event as DomainEvent;
use adpilot_domain::id::RuleId;

use crate::error::ApiError;
use crate::state::AppState;

/// Query string of the stream endpoint.
#[derive(Deserialize)]
pub struct StreamQuery {
    /// Only forward events about this rule.
    pub rule_id: Option<String>,
}

/// `GET /api/events/stream` — SSE stream of domain events.
///
/// Each event is sent as a JSON `data:` frame named after its event type,
/// so clients can listen for `execution_recorded`, `trust_gate_hold`, …
/// individually. Events dropped because the client lagged are logged and
/// skipped.
///
/// # Errors
///
/// Returns a validation error when `rule_id` is not a valid identifier.
pub async fn stream<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let only = query
        .rule_id
        .as_deref()
        .map(super::parse_rule_id)
        .transpose()?;

    let event_rx = state.event_bus.subscribe();
    tracing::debug!(
        rule_id = ?only,
        subscribers = state.event_bus.subscriber_count(),
        "event stream opened"
    );
    let event_stream = BroadcastStream::new(event_rx).filter_map(move |result| match result {
        Ok(event) if wanted(&event, only) => to_frame(&event).map(Ok::<_, Infallible>),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some events were dropped");
            None
        }
    });

    Ok(Sse::new(event_stream).keep_alive(KeepAlive::default()))
}

fn wanted(event: &DomainEvent, only: Option<RuleId>) -> bool {
    only.is_none_or(|id| event.rule_id == Some(id))
}

fn to_frame(event: &DomainEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event.event_type.as_str()).data(json)),
        Err(err) => {
            tracing::warn!(%err, "failed to serialize event for SSE stream");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adpilot_domain::event::EventType;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::test_support::{StubRunner, TestApp};

    #[test]
    fn should_filter_events_by_rule() {
        let id = RuleId::new();
        let mine = DomainEvent::new(EventType::RuleUpdated, Some(id), serde_json::json!({}));
        let other = DomainEvent::new(
            EventType::RuleUpdated,
            Some(RuleId::new()),
            serde_json::json!({}),
        );

        assert!(wanted(&mine, Some(id)));
        assert!(!wanted(&other, Some(id)));
        assert!(wanted(&other, None));
    }

    #[tokio::test]
    async fn should_forward_published_event_as_named_frame() {
        let app = TestApp::new(StubRunner::NotTriggered);
        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/events/stream")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let event = DomainEvent::new(EventType::RuleCreated, None, serde_json::json!({}));
        app.event_bus.publish(event).await.unwrap();

        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(text.starts_with("event: rule_created\n"));
        assert!(text.contains("\"event_type\":\"rule_created\""));
    }

    #[tokio::test]
    async fn should_reject_malformed_rule_filter() {
        let app = TestApp::new(StubRunner::NotTriggered);

        let (status, _) = app.get("/api/events/stream?rule_id=nope").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
