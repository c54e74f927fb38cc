//! Built-in rule templates.
//!
//! A template is a ready-made rule body. Instantiating one yields a new
//! draft [`Rule`] the user can adjust before activating it.

use serde::Serialize;

use crate::error::{AdPilotError, ValidationError};
use crate::metric::{MetricField, Window};
use crate::rule::{
    ActionConfig, AlertChannel, Condition, ConditionExpression, ConditionGroup, Operator, Rule,
    RuleAction, RuleStatus, Schedule, ScheduleFrequency, TriggerType, TrustGateConfig,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub trigger: TriggerType,
    pub schedule: Option<Schedule>,
    pub expression: ConditionExpression,
    pub actions: Vec<RuleAction>,
    pub trust_gate: TrustGateConfig,
    pub cooldown_hours: u32,
    pub max_executions_per_day: u32,
}

impl RuleTemplate {
    /// Build a new draft rule from this template.
    ///
    /// # Errors
    ///
    /// Propagates rule validation errors.
    pub fn instantiate(&self) -> Result<Rule, AdPilotError> {
        let mut builder = Rule::builder()
            .name(self.name)
            .description(self.description)
            .status(RuleStatus::Draft)
            .trigger(self.trigger)
            .expression(self.expression.clone())
            .actions(self.actions.clone())
            .trust_gate(self.trust_gate)
            .cooldown_hours(self.cooldown_hours)
            .max_executions_per_day(self.max_executions_per_day);
        if let Some(schedule) = self.schedule {
            builder = builder.schedule(schedule);
        }
        builder.build()
    }
}

fn alert(message: &str, priority: i32) -> RuleAction {
    RuleAction::new(
        ActionConfig::SendAlert {
            channel: AlertChannel::InApp,
            message: message.to_string(),
            recipients: Vec::new(),
        },
        priority,
    )
}

fn single_group(conditions: Vec<Condition>) -> ConditionExpression {
    ConditionExpression::all(vec![ConditionGroup::all(conditions)])
}

/// Every built-in template, in display order.
#[must_use]
pub fn builtin() -> Vec<RuleTemplate> {
    let hourly = Some(Schedule::new(ScheduleFrequency::Hourly));
    let cautious = TrustGateConfig {
        dry_run_first: true,
        ..TrustGateConfig::default()
    };

    vec![
        RuleTemplate {
            key: "pause_low_roas",
            name: "Pause low ROAS campaigns",
            description: "Pause campaigns whose 7-day ROAS drops below 1.5 after meaningful spend.",
            trigger: TriggerType::Schedule,
            schedule: Some(Schedule::new(ScheduleFrequency::Every6Hours)),
            expression: single_group(vec![
                Condition::new(MetricField::Roas, Operator::Lt, 1.5).over(Window::days(7)),
                Condition::new(MetricField::Spend, Operator::Gt, 100.0).over(Window::days(7)),
            ]),
            actions: vec![
                RuleAction::new(ActionConfig::PauseCampaign, 1),
                alert("Campaign paused for low ROAS", 2),
            ],
            trust_gate: cautious,
            cooldown_hours: 24,
            max_executions_per_day: 1,
        },
        RuleTemplate {
            key: "scale_winners",
            name: "Scale winning campaigns",
            description: "Raise budget by 20% on campaigns with ROAS above 4 and steady conversions.",
            trigger: TriggerType::Schedule,
            schedule: Some(Schedule::new(ScheduleFrequency::Daily)),
            expression: single_group(vec![
                Condition::new(MetricField::Roas, Operator::Gt, 4.0).over(Window::days(7)),
                Condition::new(MetricField::Conversions, Operator::Gte, 10.0)
                    .over(Window::days(7)),
            ]),
            actions: vec![
                RuleAction::new(
                    ActionConfig::IncreaseBudget {
                        percent: 20.0,
                        max_budget: Some(1000.0),
                    },
                    1,
                ),
                RuleAction::new(
                    ActionConfig::AddLabel {
                        label: "scaled".to_string(),
                    },
                    2,
                ),
            ],
            trust_gate: cautious,
            cooldown_hours: 72,
            max_executions_per_day: 1,
        },
        RuleTemplate {
            key: "cpa_guardrail",
            name: "CPA guardrail",
            description: "Lower bids when cost per acquisition exceeds the target.",
            trigger: TriggerType::MetricThreshold,
            schedule: None,
            expression: ConditionExpression::any(vec![
                ConditionGroup::all(vec![Condition::new(MetricField::Cpa, Operator::Gt, 50.0)]),
                ConditionGroup::all(vec![
                    Condition::new(MetricField::Cpa, Operator::ChangeGt, 15.0)
                        .over(Window::days(7)),
                ]),
            ]),
            actions: vec![RuleAction::new(
                ActionConfig::DecreaseBid {
                    percent: 10.0,
                    min_bid: Some(0.5),
                },
                1,
            )],
            trust_gate: TrustGateConfig::default(),
            cooldown_hours: 12,
            max_executions_per_day: 2,
        },
        RuleTemplate {
            key: "spend_spike_alert",
            name: "Spend spike alert",
            description: "Alert when spend rises by more than 200 over the previous day.",
            trigger: TriggerType::Schedule,
            schedule: hourly,
            expression: single_group(vec![
                Condition::new(MetricField::Spend, Operator::ChangeGt, 200.0)
                    .over(Window::hours(24)),
            ]),
            actions: vec![alert("Spend spiked over the last 24 hours", 1)],
            trust_gate: TrustGateConfig::default(),
            cooldown_hours: 6,
            max_executions_per_day: 4,
        },
        RuleTemplate {
            key: "low_ctr_alert",
            name: "Low CTR alert",
            description: "Alert when click-through rate falls below 0.5% with enough impressions.",
            trigger: TriggerType::Schedule,
            schedule: hourly,
            expression: single_group(vec![
                Condition::new(MetricField::Ctr, Operator::Lt, 0.5).over(Window::hours(24)),
                Condition::new(MetricField::Impressions, Operator::Gt, 1000.0)
                    .over(Window::hours(24)),
            ]),
            actions: vec![alert("Click-through rate is below 0.5%", 1)],
            trust_gate: TrustGateConfig::default(),
            cooldown_hours: 24,
            max_executions_per_day: 1,
        },
    ]
}

/// Look up a built-in template by key.
///
/// # Errors
///
/// Returns [`ValidationError::UnknownTemplate`].
pub fn find(key: &str) -> Result<RuleTemplate, ValidationError> {
    builtin()
        .into_iter()
        .find(|t| t.key == key)
        .ok_or_else(|| ValidationError::UnknownTemplate(key.to_string()))
}
