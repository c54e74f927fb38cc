//! Rule service — CRUD use-cases for rules, templates and execution history.

use serde::Serialize;

use adpilot_domain::error::{AdPilotError, NotFoundError, ValidationError};
use adpilot_domain::event::{Event, EventType};
use adpilot_domain::execution::RuleExecution;
use adpilot_domain::id::RuleId;
use adpilot_domain::metric::{BaselineKey, MetricKey, MetricSnapshot};
use adpilot_domain::rule::{
    ConditionExpression, Rule, RuleStatus, TrustGateConfig, TrustSettings,
};
use adpilot_domain::template::{self, RuleTemplate};
use adpilot_domain::time::now;

use crate::ports::{EventPublisher, ExecutionStore, Page, PageRequest, RuleRepository};

/// Result of validating a condition expression without saving it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpressionPreview {
    /// Readings a metric source must provide to evaluate the expression.
    pub readings: Vec<MetricKey>,
    /// Baselines needed by `change_*` operators.
    pub baselines: Vec<BaselineKey>,
    /// Evaluation against the supplied snapshot, if one was given.
    pub triggered: Option<bool>,
}

/// Application service for rule CRUD operations.
pub struct RuleService<R, S, P> {
    rules: R,
    executions: S,
    publisher: P,
    trust: TrustSettings,
}

impl<R, S, P> RuleService<R, S, P>
where
    R: RuleRepository,
    S: ExecutionStore,
    P: EventPublisher + Sync,
{
    pub fn new(rules: R, executions: S, publisher: P, trust: TrustSettings) -> Self {
        Self {
            rules,
            executions,
            publisher,
            trust,
        }
    }

    /// Save a new rule after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] if invariants fail or the rule
    /// is archived, or a storage error propagated from the repository.
    #[tracing::instrument(skip(self, rule), fields(rule_name = %rule.name))]
    pub async fn create_rule(&self, rule: Rule) -> Result<Rule, AdPilotError> {
        if rule.status == RuleStatus::Archived {
            return Err(ValidationError::CreatedArchived.into());
        }
        rule.validate()?;
        let rule = self.rules.create(rule).await?;
        tracing::info!(rule_id = %rule.id, "rule created");
        self.publish(
            EventType::RuleCreated,
            rule.id,
            serde_json::json!({ "name": rule.name, "status": rule.status }),
        )
        .await;
        Ok(rule)
    }

    /// Look up a rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::NotFound`] when no rule with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_rule(&self, id: RuleId) -> Result<Rule, AdPilotError> {
        self.rules.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Rule",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List rules with the given status, or every non-archived rule.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_rules(&self, status: Option<RuleStatus>) -> Result<Vec<Rule>, AdPilotError> {
        let mut rules = self.rules.get_all().await?;
        rules.retain(|rule| match status {
            Some(status) => rule.status == status,
            None => rule.status != RuleStatus::Archived,
        });
        rules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rules)
    }

    /// Replace the editable fields of rule `id` with those of `edit`.
    ///
    /// Identity, creation time and the governor counters are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::NotFound`], [`AdPilotError::Validation`] when
    /// the edited rule is invalid or its status is unreachable, or a storage
    /// error.
    #[tracing::instrument(skip(self, edit))]
    pub async fn update_rule(&self, id: RuleId, edit: Rule) -> Result<Rule, AdPilotError> {
        let mut rule = self.get_rule(id).await?;
        let previous = rule.status;
        rule.apply_edit(edit, now())?;
        rule.validate()?;
        let rule = self.rules.update(rule).await?;
        self.publish(
            EventType::RuleUpdated,
            rule.id,
            serde_json::json!({ "name": rule.name }),
        )
        .await;
        if rule.status != previous {
            self.status_changed(&rule, previous).await;
        }
        Ok(rule)
    }

    /// Archive rule `id`. Rows are never removed; archiving is terminal and
    /// repeating it is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::NotFound`] or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, id: RuleId) -> Result<(), AdPilotError> {
        let mut rule = self.get_rule(id).await?;
        if rule.status == RuleStatus::Archived {
            return Ok(());
        }
        let previous = rule.status;
        rule.set_status(RuleStatus::Archived, now())?;
        let rule = self.rules.update(rule).await?;
        tracing::info!("rule archived");
        self.status_changed(&rule, previous).await;
        Ok(())
    }

    /// Flip active ↔ paused; activate a draft.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::NotFound`], a validation error for archived
    /// rules, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_rule(&self, id: RuleId) -> Result<Rule, AdPilotError> {
        let mut rule = self.get_rule(id).await?;
        let previous = rule.status;
        rule.toggle(now())?;
        let rule = self.rules.update(rule).await?;
        tracing::info!(from = %previous, to = %rule.status, "rule toggled");
        self.status_changed(&rule, previous).await;
        Ok(rule)
    }

    /// Save a draft copy of rule `id` with fresh identity and counters.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::NotFound`] or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn duplicate_rule(&self, id: RuleId) -> Result<Rule, AdPilotError> {
        let copy = self.get_rule(id).await?.duplicate(now());
        self.create_rule(copy).await
    }

    /// Execution history of rule `id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] for an invalid page size,
    /// [`AdPilotError::NotFound`] for an unknown rule, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn list_executions(
        &self,
        id: RuleId,
        page: PageRequest,
    ) -> Result<Page<RuleExecution>, AdPilotError> {
        page.validate()?;
        self.get_rule(id).await?;
        self.executions.list_by_rule(id, page).await
    }

    #[must_use]
    pub fn list_templates(&self) -> Vec<RuleTemplate> {
        template::builtin()
    }

    /// Save a new draft rule from the built-in template `key`, using the
    /// account's signal health threshold.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] for an unknown template, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn create_from_template(&self, key: &str) -> Result<Rule, AdPilotError> {
        let mut rule = template::find(key)?.instantiate()?;
        rule.trust_gate.min_signal_health = self.trust.min_signal_health();
        self.create_rule(rule).await
    }

    /// Trust gate settings new rules start with.
    #[must_use]
    pub fn default_trust_gate(&self) -> TrustGateConfig {
        TrustGateConfig {
            min_signal_health: self.trust.min_signal_health(),
            ..TrustGateConfig::default()
        }
    }

    /// Validate `expression` and, when a snapshot is supplied, evaluate it.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] describing the first malformed
    /// condition.
    pub fn validate_expression(
        &self,
        expression: &ConditionExpression,
        snapshot: Option<&MetricSnapshot>,
    ) -> Result<ExpressionPreview, AdPilotError> {
        expression.validate()?;
        Ok(ExpressionPreview {
            readings: expression.reading_keys(),
            baselines: expression.baseline_keys(),
            triggered: snapshot.map(|s| expression.evaluate(s)),
        })
    }

    async fn status_changed(&self, rule: &Rule, from: RuleStatus) {
        self.publish(
            EventType::RuleStatusChanged,
            rule.id,
            serde_json::json!({ "from": from, "to": rule.status }),
        )
        .await;
    }

    async fn publish(&self, event_type: EventType, rule_id: RuleId, data: serde_json::Value) {
        self.publisher
            .notify(Event::new(event_type, Some(rule_id), data))
            .await;
    }
}
