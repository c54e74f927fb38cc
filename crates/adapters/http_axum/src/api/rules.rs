//! JSON REST handlers for rules.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use adpilot_app::ports::{
    EventPublisher, ExecutionStore, Page, PageRequest, RuleRepository, RuleRunner, RunOutcome,
};
use adpilot_app::services::rule_service::ExpressionPreview;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution::RuleExecution;
use adpilot_domain::metric::MetricSnapshot;
use adpilot_domain::rule::{
    ConditionExpression, Rule, RuleAction, RuleStatus, Schedule, Targeting, TriggerSource,
    TriggerType, TrustGateConfig,
};

use super::parse_rule_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating or replacing a rule.
///
/// Omitted optional fields fall back to the domain defaults; an omitted
/// trust gate uses the account's signal health threshold.
#[derive(Deserialize)]
pub struct RuleRequest {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<RuleStatus>,
    #[serde(default)]
    pub trigger: TriggerType,
    #[serde(default)]
    pub expression: ConditionExpression,
    pub actions: Vec<RuleAction>,
    #[serde(default)]
    pub targeting: Targeting,
    pub schedule: Option<Schedule>,
    pub trust_gate: Option<TrustGateConfig>,
    pub cooldown_hours: Option<u32>,
    pub max_executions_per_day: Option<u32>,
}

impl RuleRequest {
    fn into_rule(
        self,
        status: RuleStatus,
        trust_gate: TrustGateConfig,
    ) -> Result<Rule, AdPilotError> {
        let mut builder = Rule::builder()
            .name(self.name)
            .status(self.status.unwrap_or(status))
            .trigger(self.trigger)
            .expression(self.expression)
            .actions(self.actions)
            .targeting(self.targeting)
            .trust_gate(self.trust_gate.unwrap_or(trust_gate));

        if let Some(description) = self.description {
            builder = builder.description(description);
        }
        if let Some(schedule) = self.schedule {
            builder = builder.schedule(schedule);
        }
        if let Some(hours) = self.cooldown_hours {
            builder = builder.cooldown_hours(hours);
        }
        if let Some(max) = self.max_executions_per_day {
            builder = builder.max_executions_per_day(max);
        }

        builder.build()
    }
}

/// Query string of the list endpoint.
#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<RuleStatus>,
}

/// Request body of the expression validation endpoint.
#[derive(Deserialize)]
pub struct ValidateRequest {
    pub expression: ConditionExpression,
    /// Optional metrics to preview the expression against.
    pub snapshot: Option<MetricSnapshot>,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Rule>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from endpoints returning a single rule.
pub enum RuleResponse {
    Ok(Json<Rule>),
    Created(Json<Rule>),
}

impl IntoResponse for RuleResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/rules` — list rules, optionally filtered by `?status=`.
pub async fn list<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Query(query): Query<ListQuery>,
) -> Result<ListResponse, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let rules = state.rule_service.list_rules(query.status).await?;
    Ok(ListResponse::Ok(Json(rules)))
}

/// `GET /api/rules/{id}` — get rule by ID.
pub async fn get<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Path(id): Path<String>,
) -> Result<RuleResponse, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let rule = state.rule_service.get_rule(parse_rule_id(&id)?).await?;
    Ok(RuleResponse::Ok(Json(rule)))
}

/// `POST /api/rules` — create a new rule, draft unless a status is given.
pub async fn create<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Json(req): Json<RuleRequest>,
) -> Result<RuleResponse, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let rule = req.into_rule(RuleStatus::Draft, state.rule_service.default_trust_gate())?;
    let created = state.rule_service.create_rule(rule).await?;
    Ok(RuleResponse::Created(Json(created)))
}

/// `PUT /api/rules/{id}` — replace the editable fields of a rule.
///
/// An omitted status keeps the current one.
pub async fn update<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Path(id): Path<String>,
    Json(req): Json<RuleRequest>,
) -> Result<RuleResponse, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let rule_id = parse_rule_id(&id)?;
    let current = state.rule_service.get_rule(rule_id).await?;
    let edit = req.into_rule(current.status, state.rule_service.default_trust_gate())?;
    let updated = state.rule_service.update_rule(rule_id, edit).await?;
    Ok(RuleResponse::Ok(Json(updated)))
}

/// `DELETE /api/rules/{id}` — archive a rule.
pub async fn delete<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    state.rule_service.delete_rule(parse_rule_id(&id)?).await?;
    Ok(DeleteResponse::NoContent)
}

/// `POST /api/rules/{id}/toggle` — flip active ↔ paused.
pub async fn toggle<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Path(id): Path<String>,
) -> Result<RuleResponse, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let rule = state.rule_service.toggle_rule(parse_rule_id(&id)?).await?;
    Ok(RuleResponse::Ok(Json(rule)))
}

/// `POST /api/rules/{id}/duplicate` — save a draft copy.
pub async fn duplicate<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Path(id): Path<String>,
) -> Result<RuleResponse, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let copy = state
        .rule_service
        .duplicate_rule(parse_rule_id(&id)?)
        .await?;
    Ok(RuleResponse::Created(Json(copy)))
}

/// `POST /api/rules/{id}/execute` — evaluate the rule now.
pub async fn execute<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Path(id): Path<String>,
) -> Result<Json<RunOutcome>, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let rule_id = parse_rule_id(&id)?;
    let outcome = state.runner.run(rule_id, TriggerSource::Manual).await?;
    Ok(Json(outcome))
}

/// `GET /api/rules/{id}/executions?page=&per_page=` — history, newest first.
pub async fn executions<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Path(id): Path<String>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<RuleExecution>>, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let history = state
        .rule_service
        .list_executions(parse_rule_id(&id)?, page)
        .await?;
    Ok(Json(history))
}

/// `POST /api/rules/validate` — check an expression without saving it.
pub async fn validate<R, S, P, X>(
    State(state): State<AppState<R, S, P, X>>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ExpressionPreview>, ApiError>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    let preview = state
        .rule_service
        .validate_expression(&req.expression, req.snapshot.as_ref())?;
    Ok(Json(preview))
}
