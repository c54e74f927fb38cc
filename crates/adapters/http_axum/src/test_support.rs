//! In-memory ports and a request helper for the handler tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use adpilot_app::event_bus::InProcessEventBus;
use adpilot_app::ports::{
    ExecutionStore, Page, PageRequest, RuleRepository, RuleRunner, RunOutcome,
};
use adpilot_app::services::rule_service::RuleService;
use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution::RuleExecution;
use adpilot_domain::id::RuleId;
use adpilot_domain::rule::{Rule, TriggerSource, TrustSettings};
use adpilot_domain::time::Timestamp;

use crate::router;
use crate::state::AppState;

#[derive(Default)]
pub struct MemoryRules(Mutex<HashMap<RuleId, Rule>>);

impl RuleRepository for MemoryRules {
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send {
        self.0.lock().unwrap().insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AdPilotError>> + Send {
        let rule = self.0.lock().unwrap().get(&id).cloned();
        async { Ok(rule) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Rule>, AdPilotError>> + Send {
        let rules: Vec<_> = self.0.lock().unwrap().values().cloned().collect();
        async { Ok(rules) }
    }

    fn get_active(&self) -> impl Future<Output = Result<Vec<Rule>, AdPilotError>> + Send {
        let rules: Vec<_> = self
            .0
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        async { Ok(rules) }
    }

    fn update(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send {
        self.0.lock().unwrap().insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn record_run(
        &self,
        _id: RuleId,
        _at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        async { Ok(()) }
    }
}

#[derive(Default)]
pub struct MemoryExecutions;

impl ExecutionStore for MemoryExecutions {
    fn append(
        &self,
        execution: RuleExecution,
    ) -> impl Future<Output = Result<RuleExecution, AdPilotError>> + Send {
        async { Ok(execution) }
    }

    fn list_by_rule(
        &self,
        _rule_id: RuleId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<RuleExecution>, AdPilotError>> + Send {
        async move {
            Ok(Page {
                items: Vec::new(),
                page: page.page.max(1),
                per_page: page.per_page,
                total: 0,
            })
        }
    }

    fn count_since(
        &self,
        _rule_id: RuleId,
        _since: Timestamp,
    ) -> impl Future<Output = Result<u64, AdPilotError>> + Send {
        async { Ok(0) }
    }

    fn last_counted_at(
        &self,
        _rule_id: RuleId,
    ) -> impl Future<Output = Result<Option<Timestamp>, AdPilotError>> + Send {
        async { Ok(None) }
    }

    fn has_success(
        &self,
        _rule_id: RuleId,
    ) -> impl Future<Output = Result<bool, AdPilotError>> + Send {
        async { Ok(false) }
    }
}

/// Canned answers for manual executions.
pub enum StubRunner {
    NotTriggered,
    Upstream,
}

impl RuleRunner for StubRunner {
    fn run(
        &self,
        _rule_id: RuleId,
        _source: TriggerSource,
    ) -> impl Future<Output = Result<RunOutcome, AdPilotError>> + Send {
        let result = match self {
            Self::NotTriggered => Ok(RunOutcome::NotTriggered),
            Self::Upstream => Err(AdPilotError::Upstream("metrics api down".into())),
        };
        async { result }
    }
}

type State = AppState<MemoryRules, MemoryExecutions, Arc<InProcessEventBus>, StubRunner>;

pub struct TestApp {
    state: State,
    pub event_bus: Arc<InProcessEventBus>,
}

impl TestApp {
    pub fn new(runner: StubRunner) -> Self {
        let event_bus = Arc::new(InProcessEventBus::new(16));
        let service = RuleService::new(
            MemoryRules::default(),
            MemoryExecutions,
            Arc::clone(&event_bus),
            TrustSettings::default(),
        );
        Self {
            state: AppState::new(service, Arc::new(runner), Arc::clone(&event_bus)),
            event_bus,
        }
    }

    pub fn router(&self) -> Router {
        router::build(self.state.clone())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, body).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
