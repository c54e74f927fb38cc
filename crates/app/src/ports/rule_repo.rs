//! Rule repository port — persistence for rules.

use std::future::Future;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::RuleId;
use adpilot_domain::rule::Rule;
use adpilot_domain::time::Timestamp;

/// Repository for persisting and querying [`Rule`]s.
///
/// Rules are never removed: deletion is an archive status change.
pub trait RuleRepository {
    /// Create a new rule in storage.
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send;

    /// Get a rule by its unique identifier.
    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AdPilotError>> + Send;

    /// Get all rules, archived included.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Rule>, AdPilotError>> + Send;

    /// Get all rules with status `active`.
    fn get_active(&self) -> impl Future<Output = Result<Vec<Rule>, AdPilotError>> + Send;

    /// Persist the user-editable fields and status of an existing rule.
    ///
    /// Implementations must leave `last_run_at` and `run_count` as stored:
    /// those are written only through [`record_run`](Self::record_run).
    fn update(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send;

    /// Atomically set `last_run_at` and increment `run_count`.
    fn record_run(
        &self,
        id: RuleId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send;
}

impl<T: RuleRepository + Send + Sync> RuleRepository for std::sync::Arc<T> {
    fn create(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send {
        (**self).create(rule)
    }

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, AdPilotError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Rule>, AdPilotError>> + Send {
        (**self).get_all()
    }

    fn get_active(&self) -> impl Future<Output = Result<Vec<Rule>, AdPilotError>> + Send {
        (**self).get_active()
    }

    fn update(&self, rule: Rule) -> impl Future<Output = Result<Rule, AdPilotError>> + Send {
        (**self).update(rule)
    }

    fn record_run(
        &self,
        id: RuleId,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), AdPilotError>> + Send {
        (**self).record_run(id, at)
    }
}
