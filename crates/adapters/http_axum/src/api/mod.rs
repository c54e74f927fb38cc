//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod catalog;
#[allow(clippy::missing_errors_doc)]
pub mod rules;
pub mod sse;
#[allow(clippy::missing_errors_doc)]
pub mod templates;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, post};

use adpilot_app::ports::{EventPublisher, ExecutionStore, RuleRepository, RuleRunner};
use adpilot_domain::error::ValidationError;
use adpilot_domain::id::RuleId;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<R, S, P, X>() -> Router<AppState<R, S, P, X>>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    Router::new()
        // Rules
        .route(
            "/rules",
            get(rules::list::<R, S, P, X>).post(rules::create::<R, S, P, X>),
        )
        .route("/rules/validate", post(rules::validate::<R, S, P, X>))
        .route(
            "/rules/{id}",
            get(rules::get::<R, S, P, X>)
                .put(rules::update::<R, S, P, X>)
                .delete(rules::delete::<R, S, P, X>),
        )
        .route("/rules/{id}/toggle", post(rules::toggle::<R, S, P, X>))
        .route("/rules/{id}/duplicate", post(rules::duplicate::<R, S, P, X>))
        .route("/rules/{id}/execute", post(rules::execute::<R, S, P, X>))
        .route(
            "/rules/{id}/executions",
            get(rules::executions::<R, S, P, X>),
        )
        // Templates
        .route("/rule-templates", get(templates::list::<R, S, P, X>))
        .route(
            "/rule-templates/{key}",
            post(templates::instantiate::<R, S, P, X>),
        )
        // Catalog & events
        .route("/catalog", get(catalog::get))
        .route("/events/stream", get(sse::stream::<R, S, P, X>))
}

/// Parse a rule id path segment.
fn parse_rule_id(raw: &str) -> Result<RuleId, ApiError> {
    RuleId::from_str(raw).map_err(|_| ValidationError::InvalidId(raw.to_string()).into())
}
