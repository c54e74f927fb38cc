//! JSON REST handlers for the built-in rule templates.

use axum::Json;
use axum::extract::{Path, State};

use adpilot_app::ports::{EventPublisher, ExecutionStore, RuleRepository, RuleRunner};
use adpilot_domain::template::RuleTemplate;

use super::rules::RuleResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/rule-templates` — list the built-in templates.
pub async fn list<R, S, P, X>(State(state): State<AppState<R, S, P, X>>) -> Json<Vec<RuleTemplate>>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    Json(state.rule_service.list_templates())
}

/// `POST /api/rule-templates/{key}` — save a draft rule from a template.
pub async fn instantiate<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Path(key): Path<String>,
) -> Result<RuleResponse, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let rule = state.rule_service.create_from_template(&key).await?;
    Ok(RuleResponse::Created(Json(rule)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::{StubRunner, TestApp};

    #[tokio::test]
    async fn should_list_builtin_templates() {
        let app = TestApp::new(StubRunner::NotTriggered);

        let (status, body) = app.get("/api/rule-templates").await;

        assert_eq!(status, StatusCode::OK);
        let keys: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["key"].as_str().unwrap().to_string())
            .collect();
        assert!(keys.contains(&"pause_low_roas".to_string()));
        assert_eq!(keys.len(), 5);
    }

    #[tokio::test]
    async fn should_instantiate_template_as_draft() {
        let app = TestApp::new(StubRunner::NotTriggered);

        let (status, body) = app.post("/api/rule-templates/cpa_guardrail", None).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "draft");
        assert_eq!(body["trust_gate"]["min_signal_health"], 70.0);
    }

    #[tokio::test]
    async fn should_reject_unknown_template() {
        let app = TestApp::new(StubRunner::NotTriggered);

        let (status, _) = app.post("/api/rule-templates/does_not_exist", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
