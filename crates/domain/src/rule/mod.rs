//! Rule — condition expression → trust gate → governed actions.
//!
//! A [`Rule`] is evaluated when its [`TriggerType`] fires. If its
//! [`ConditionExpression`] holds against the current metrics and the trust
//! gate passes, its [`RuleAction`]s are applied in priority order, subject
//! to cooldown and the daily cap.
//!
//! `last_run_at` and `run_count` belong to the execution governor: they are
//! never touched by CRUD updates.

mod action;
mod condition;
mod trigger;
mod trust;

pub use action::{
    ActionConfig, ActionDescriptor, ActionType, AlertChannel, RuleAction, execution_order,
};
pub use condition::{
    Condition, ConditionExpression, ConditionGroup, ConditionValue, LogicOperator, Operator,
};
pub use trigger::{Schedule, ScheduleFrequency, TriggerSource, TriggerType};
pub use trust::{TrustDecision, TrustGateConfig, TrustSettings, classify};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AdPilotError, ValidationError};
use crate::execution::SkipReason;
use crate::id::{CampaignId, RuleId};
use crate::metric::MetricQuery;
use crate::time::{self, Timestamp};

/// Default minimum gap between two executions of the same rule.
pub const DEFAULT_COOLDOWN_HOURS: u32 = 24;
/// Default daily cap.
pub const DEFAULT_MAX_EXECUTIONS_PER_DAY: u32 = 3;

/// Lifecycle state of a rule. `Archived` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

impl RuleStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Archived => "archived",
        }
    }

    /// Whether a rule may move from `self` to `to`. Staying put is allowed
    /// for every state but `Archived`.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Draft | Self::Active | Self::Archived)
                | (Self::Active | Self::Paused, Self::Active | Self::Paused | Self::Archived)
        )
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown rule status: {other}")),
        }
    }
}

/// Advertising platform a rule may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleAds,
    Meta,
    Tiktok,
    Linkedin,
    MicrosoftAds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Search,
    Display,
    Shopping,
    Video,
    Social,
    PerformanceMax,
}

/// Which campaigns a rule reads metrics from and acts upon.
///
/// Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targeting {
    pub platforms: Vec<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_type: Option<CampaignType>,
    pub campaign_ids: Vec<CampaignId>,
}

impl Targeting {
    #[must_use]
    pub fn matches(
        &self,
        platform: Platform,
        campaign_type: CampaignType,
        campaign_id: &CampaignId,
    ) -> bool {
        (self.platforms.is_empty() || self.platforms.contains(&platform))
            && self.campaign_type.is_none_or(|t| t == campaign_type)
            && (self.campaign_ids.is_empty() || self.campaign_ids.contains(campaign_id))
    }
}

/// A user-defined automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: RuleStatus,
    pub trigger: TriggerType,
    pub expression: ConditionExpression,
    pub actions: Vec<RuleAction>,
    pub targeting: Targeting,
    pub schedule: Option<Schedule>,
    pub trust_gate: TrustGateConfig,
    pub cooldown_hours: u32,
    pub max_executions_per_day: u32,
    pub last_run_at: Option<Timestamp>,
    pub run_count: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - `actions` is empty ([`ValidationError::NoActions`])
    /// - a condition, an action payload or the trust gate is malformed
    /// - `max_executions_per_day` is zero ([`ValidationError::ZeroDailyCap`])
    /// - a schedule trigger has no schedule ([`ValidationError::MissingSchedule`])
    pub fn validate(&self) -> Result<(), AdPilotError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions.into());
        }
        if self.max_executions_per_day == 0 {
            return Err(ValidationError::ZeroDailyCap.into());
        }
        if self.trigger == TriggerType::Schedule && self.schedule.is_none() {
            return Err(ValidationError::MissingSchedule.into());
        }
        self.expression.validate()?;
        for action in &self.actions {
            action.config.validate()?;
        }
        self.trust_gate.validate()?;
        Ok(())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// Move to `to`, refusing illegal transitions.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidStatusTransition`].
    pub fn set_status(&mut self, to: RuleStatus, now: Timestamp) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(to) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        if self.status != to {
            self.status = to;
            self.updated_at = now;
        }
        Ok(())
    }

    /// Flip active ↔ paused; a draft becomes active.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidStatusTransition`] for archived rules.
    pub fn toggle(&mut self, now: Timestamp) -> Result<RuleStatus, ValidationError> {
        let to = match self.status {
            RuleStatus::Active => RuleStatus::Paused,
            RuleStatus::Draft | RuleStatus::Paused | RuleStatus::Archived => RuleStatus::Active,
        };
        self.set_status(to, now)?;
        Ok(to)
    }

    /// Copy into a new draft with fresh identity and reset counters.
    #[must_use]
    pub fn duplicate(&self, now: Timestamp) -> Self {
        Self {
            id: RuleId::new(),
            name: format!("{} (copy)", self.name),
            status: RuleStatus::Draft,
            last_run_at: None,
            run_count: 0,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Overwrite the user-editable fields with `edit`'s, keeping identity,
    /// governor counters and creation time.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidStatusTransition`] when `edit`
    /// carries a status unreachable from the current one.
    pub fn apply_edit(&mut self, edit: Self, now: Timestamp) -> Result<(), ValidationError> {
        if !self.status.can_transition_to(edit.status) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status,
                to: edit.status,
            });
        }
        *self = Self {
            id: self.id,
            last_run_at: self.last_run_at,
            run_count: self.run_count,
            created_at: self.created_at,
            updated_at: now,
            ..edit
        };
        Ok(())
    }

    /// Governor limits: cooldown first, then the rolling 24h daily cap.
    ///
    /// `recorded_run` is the completion time of the latest execution in
    /// history that counts toward the cap. The cooldown runs from the later
    /// of it and `last_run_at`, so a run whose counter update was lost still
    /// cools the rule down. `executions_in_window` is the number of such
    /// executions triggered within the last 24 hours.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] of the first limit hit.
    pub fn check_limits(
        &self,
        recorded_run: Option<Timestamp>,
        executions_in_window: u64,
        now: Timestamp,
    ) -> Result<(), SkipReason> {
        let cooldown = time::hours(self.cooldown_hours);
        if self
            .last_run_at
            .max(recorded_run)
            .is_some_and(|last| time::within(last, now, cooldown))
        {
            return Err(SkipReason::Cooldown);
        }
        if executions_in_window >= u64::from(self.max_executions_per_day) {
            return Err(SkipReason::DailyCap);
        }
        Ok(())
    }

    /// Start of the rolling window the daily cap counts executions in.
    #[must_use]
    pub fn daily_cap_window_start(now: Timestamp) -> Timestamp {
        time::daily_cap_window_start(now)
    }

    /// The readings and baselines a metric source must provide for this rule.
    #[must_use]
    pub fn metric_query(&self) -> MetricQuery {
        MetricQuery {
            scope: self.targeting.clone(),
            readings: self.expression.reading_keys(),
            baselines: self.expression.baseline_keys(),
        }
    }

    /// Actions in the order the executor applies them.
    #[must_use]
    pub fn ordered_actions(&self) -> Vec<&RuleAction> {
        execution_order(&self.actions)
    }

    /// Whether the poll loop should evaluate this rule now.
    ///
    /// `last_evaluated` is when the scheduler last evaluated it, if ever.
    /// Returns the trigger source to record, or `None` when not due.
    #[must_use]
    pub fn due(&self, last_evaluated: Option<Timestamp>, now: Timestamp) -> Option<TriggerSource> {
        if !self.is_active() {
            return None;
        }
        match self.trigger {
            TriggerType::MetricThreshold => Some(TriggerSource::Metric),
            TriggerType::Schedule => {
                let interval = self.schedule.unwrap_or_default().frequency.interval();
                let elapsed = last_evaluated.is_none_or(|at| now.signed_duration_since(at) >= interval);
                elapsed.then_some(TriggerSource::Schedule)
            }
            TriggerType::Event | TriggerType::Manual => None,
        }
    }
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    description: Option<String>,
    status: Option<RuleStatus>,
    trigger: Option<TriggerType>,
    expression: ConditionExpression,
    actions: Vec<RuleAction>,
    targeting: Targeting,
    schedule: Option<Schedule>,
    trust_gate: Option<TrustGateConfig>,
    cooldown_hours: Option<u32>,
    max_executions_per_day: Option<u32>,
    last_run_at: Option<Timestamp>,
    run_count: u64,
}

impl RuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: RuleStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: TriggerType) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn expression(mut self, expression: ConditionExpression) -> Self {
        self.expression = expression;
        self
    }

    /// Append a group to the expression.
    #[must_use]
    pub fn group(mut self, group: ConditionGroup) -> Self {
        self.expression.groups.push(group);
        self
    }

    #[must_use]
    pub fn action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn actions(mut self, actions: Vec<RuleAction>) -> Self {
        self.actions = actions;
        self
    }

    #[must_use]
    pub fn targeting(mut self, targeting: Targeting) -> Self {
        self.targeting = targeting;
        self
    }

    #[must_use]
    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    #[must_use]
    pub fn trust_gate(mut self, trust_gate: TrustGateConfig) -> Self {
        self.trust_gate = Some(trust_gate);
        self
    }

    #[must_use]
    pub fn cooldown_hours(mut self, hours: u32) -> Self {
        self.cooldown_hours = Some(hours);
        self
    }

    #[must_use]
    pub fn max_executions_per_day(mut self, max: u32) -> Self {
        self.max_executions_per_day = Some(max);
        self
    }

    #[must_use]
    pub fn last_run_at(mut self, ts: Timestamp) -> Self {
        self.last_run_at = Some(ts);
        self
    }

    #[must_use]
    pub fn run_count(mut self, count: u64) -> Self {
        self.run_count = count;
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// # Errors
    ///
    /// Returns [`AdPilotError::Validation`] if any invariant fails.
    pub fn build(self) -> Result<Rule, AdPilotError> {
        let now = crate::time::now();
        let rule = Rule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            status: self.status.unwrap_or_default(),
            trigger: self.trigger.unwrap_or_default(),
            expression: self.expression,
            actions: self.actions,
            targeting: self.targeting,
            schedule: self.schedule,
            trust_gate: self.trust_gate.unwrap_or_default(),
            cooldown_hours: self.cooldown_hours.unwrap_or(DEFAULT_COOLDOWN_HOURS),
            max_executions_per_day: self
                .max_executions_per_day
                .unwrap_or(DEFAULT_MAX_EXECUTIONS_PER_DAY),
            last_run_at: self.last_run_at,
            run_count: self.run_count,
            created_at: now,
            updated_at: now,
        };
        rule.validate()?;
        Ok(rule)
    }
}
