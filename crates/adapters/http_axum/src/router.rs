//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use adpilot_app::ports::{EventPublisher, ExecutionStore, RuleRepository, RuleRunner};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the JSON API under `/api` and exposes `/health`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<R, S, P, X>(state: AppState<R, S, P, X>) -> Router
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
