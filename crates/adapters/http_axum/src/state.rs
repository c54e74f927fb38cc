//! Shared application state for axum handlers.

use std::sync::Arc;

use adpilot_app::event_bus::InProcessEventBus;
use adpilot_app::ports::{EventPublisher, ExecutionStore, RuleRepository, RuleRunner};
use adpilot_app::services::rule_service::RuleService;

/// Application state shared across all axum handlers.
///
/// Generic over the rule repository, execution store, event publisher and
/// rule runner to avoid dynamic dispatch. `Clone` is implemented manually so
/// the underlying types themselves do not need to be `Clone`; only the `Arc`
/// wrappers are cloned.
pub struct AppState<R, S, P, X> {
    /// Rule CRUD, templates and history.
    pub rule_service: Arc<RuleService<R, S, P>>,
    /// Runs a single rule evaluation on demand.
    pub runner: Arc<X>,
    /// Source of the SSE stream.
    pub event_bus: Arc<InProcessEventBus>,
}

impl<R, S, P, X> Clone for AppState<R, S, P, X> {
    fn clone(&self) -> Self {
        Self {
            rule_service: Arc::clone(&self.rule_service),
            runner: Arc::clone(&self.runner),
            event_bus: Arc::clone(&self.event_bus),
        }
    }
}

impl<R, S, P, X> AppState<R, S, P, X>
where
    R: RuleRepository + Send + Sync + 'static,
    S: ExecutionStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    X: RuleRunner + Send + Sync + 'static,
{
    /// Create a new application state from pre-wrapped `Arc`s.
    ///
    /// The runner and the event bus are usually shared with the scheduler
    /// and the rule engine, so they are taken already wrapped.
    pub fn new(
        rule_service: RuleService<R, S, P>,
        runner: Arc<X>,
        event_bus: Arc<InProcessEventBus>,
    ) -> Self {
        Self {
            rule_service: Arc::new(rule_service),
            runner,
            event_bus,
        }
    }
}
