//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use adpilot_domain::error::{ActionError, AdPilotError, NotFoundError};
use adpilot_domain::event::{Event, EventType};
use adpilot_domain::execution::{ExecutionStatus, RuleExecution};
use adpilot_domain::id::RuleId;
use adpilot_domain::metric::{MetricQuery, MetricSnapshot};
use adpilot_domain::rule::{ActionType, Rule, Targeting};
use adpilot_domain::time::Timestamp;

use crate::ports::{
    ActionBackend, ActionOutcome, ActionRequest, EventPublisher, ExecutionStore, MetricSource,
    Page, PageRequest, RuleRepository, SignalHealthSource,
};

// ── Rules ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRuleRepo {
    store: Mutex<HashMap<RuleId, Rule>>,
    failing_record_runs: Mutex<u32>,
}

impl InMemoryRuleRepo {
    pub fn with(rules: Vec<Rule>) -> Self {
        Self {
            store: Mutex::new(rules.into_iter().map(|r| (r.id, r)).collect()),
            failing_record_runs: Mutex::new(0),
        }
    }

    /// Make the next `count` counter updates fail with a storage error.
    pub fn fail_record_runs(&self, count: u32) {
        *self.failing_record_runs.lock().unwrap() = count;
    }

    pub fn stored(&self, id: RuleId) -> Option<Rule> {
        self.store.lock().unwrap().get(&id).cloned()
    }
}

impl RuleRepository for InMemoryRuleRepo {
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send {
        self.store.lock().unwrap().insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AdPilotError>> + Send {
        let r = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(r) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Rule>, AdPilotError>> + Send {
        let r: Vec<_> = self.store.lock().unwrap().values().cloned().collect();
        async { Ok(r) }
    }

    fn get_active(&self) -> impl Future<Output = Result<Vec<Rule>, AdPilotError>> + Send {
        let r: Vec<_> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        async { Ok(r) }
    }

    fn update(&self, mut rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send {
        let mut store = self.store.lock().unwrap();
        if let Some(existing) = store.get(&rule.id) {
            rule.last_run_at = existing.last_run_at;
            rule.run_count = existing.run_count;
        }
        store.insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn record_run(
        &self,
        id: RuleId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        {
            let mut failing = self.failing_record_runs.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return std::future::ready(Err(AdPilotError::Storage("disk I/O error".into())));
            }
        }
        let result = match self.store.lock().unwrap().get_mut(&id) {
            Some(rule) => {
                rule.last_run_at = Some(at);
                rule.run_count += 1;
                Ok(())
            }
            None => Err(NotFoundError {
                entity: "Rule",
                id: id.to_string(),
            }
            .into()),
        };
        std::future::ready(result)
    }
}

// ── Executions ─────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: Mutex<Vec<RuleExecution>>,
}

impl InMemoryExecutionStore {
    pub fn with(executions: Vec<RuleExecution>) -> Self {
        Self {
            executions: Mutex::new(executions),
        }
    }

    pub fn all(&self) -> Vec<RuleExecution> {
        self.executions.lock().unwrap().clone()
    }
}

impl ExecutionStore for InMemoryExecutionStore {
    fn append(
        &self,
        execution: RuleExecution,
    ) -> impl Future<Output = Result<RuleExecution, AdPilotError>> + Send {
        self.executions.lock().unwrap().push(execution.clone());
        async { Ok(execution) }
    }

    fn list_by_rule(
        &self,
        rule_id: RuleId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<RuleExecution>, AdPilotError>> + Send {
        let mut matching: Vec<_> = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.rule_id == rule_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap())
            .take(page.per_page as usize)
            .collect();
        async move {
            Ok(Page {
                items,
                page: page.page.max(1),
                per_page: page.per_page,
                total,
            })
        }
    }

    fn count_since(
        &self,
        rule_id: RuleId,
        since: Timestamp,
    ) -> impl Future<Output = Result<u64, AdPilotError>> + Send {
        let n = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.rule_id == rule_id && e.counts_toward_cap() && e.triggered_at >= since)
            .count() as u64;
        async move { Ok(n) }
    }

    fn last_counted_at(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Option<Timestamp>, AdPilotError>> + Send {
        let last = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.rule_id == rule_id && e.counts_toward_cap())
            .map(|e| e.completed_at)
            .max();
        async move { Ok(last) }
    }

    fn has_success(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<bool, AdPilotError>> + Send {
        let found = self
            .executions
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.rule_id == rule_id && e.status == ExecutionStatus::Success);
        async move { Ok(found) }
    }
}

// ── Metrics & signal health ────────────────────────────────────

pub struct FixedMetrics {
    snapshot: Mutex<MetricSnapshot>,
    pub queries: Mutex<Vec<MetricQuery>>,
}

impl FixedMetrics {
    pub fn new(snapshot: MetricSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            queries: Mutex::new(Vec::new()),
        }
    }
}

impl MetricSource for FixedMetrics {
    fn snapshot(
        &self,
        query: &MetricQuery,
    ) -> impl Future<Output = Result<MetricSnapshot, AdPilotError>> + Send {
        self.queries.lock().unwrap().push(query.clone());
        let s = self.snapshot.lock().unwrap().clone();
        async { Ok(s) }
    }
}

pub struct FixedHealth(pub f64);

impl SignalHealthSource for FixedHealth {
    fn score(
        &self,
        _scope: &Targeting,
    ) -> impl Future<Output = Result<f64, AdPilotError>> + Send {
        let score = self.0;
        async move { Ok(score) }
    }
}

// ── Action backend ─────────────────────────────────────────────

/// Records every call; fails the configured action types; optionally stalls.
#[derive(Default)]
pub struct ScriptedBackend {
    failing: HashSet<ActionType>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<ActionRequest>>,
}

impl ScriptedBackend {
    pub fn failing(action_types: &[ActionType]) -> Self {
        Self {
            failing: action_types.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ActionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl ActionBackend for ScriptedBackend {
    fn apply(
        &self,
        request: &ActionRequest,
    ) -> impl Future<Output = Result<ActionOutcome, ActionError>> + Send {
        self.calls.lock().unwrap().push(request.clone());
        let action_type = request.config.action_type();
        let fails = self.failing.contains(&action_type);
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if fails {
                Err(ActionError::Rejected(format!("{action_type} refused")))
            } else {
                Ok(ActionOutcome {
                    detail: format!("{action_type} applied"),
                })
            }
        }
    }
}

// ── Spy publisher ──────────────────────────────────────────────

#[derive(Default)]
pub struct SpyPublisher {
    pub events: Mutex<Vec<Event>>,
}

impl SpyPublisher {
    pub fn event_types(&self) -> Vec<EventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }
}

impl EventPublisher for SpyPublisher {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        self.events.lock().unwrap().push(event);
        async { Ok(()) }
    }
}
