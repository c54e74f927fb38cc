//! Rule actions — the closed catalog of corrective changes a rule can apply.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier of an action from the closed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    IncreaseBudget,
    DecreaseBudget,
    SetBudget,
    IncreaseBid,
    DecreaseBid,
    SetBid,
    PauseCampaign,
    EnableCampaign,
    AddLabel,
    SendAlert,
}

/// Static description of an action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub action_type: ActionType,
    pub label: &'static str,
    /// Configuration keys the payload must carry.
    pub required_config: &'static [&'static str],
    /// Whether the action changes campaign state on the platform.
    pub mutating: bool,
}

impl ActionType {
    pub const ALL: [Self; 10] = [
        Self::IncreaseBudget,
        Self::DecreaseBudget,
        Self::SetBudget,
        Self::IncreaseBid,
        Self::DecreaseBid,
        Self::SetBid,
        Self::PauseCampaign,
        Self::EnableCampaign,
        Self::AddLabel,
        Self::SendAlert,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncreaseBudget => "increase_budget",
            Self::DecreaseBudget => "decrease_budget",
            Self::SetBudget => "set_budget",
            Self::IncreaseBid => "increase_bid",
            Self::DecreaseBid => "decrease_bid",
            Self::SetBid => "set_bid",
            Self::PauseCampaign => "pause_campaign",
            Self::EnableCampaign => "enable_campaign",
            Self::AddLabel => "add_label",
            Self::SendAlert => "send_alert",
        }
    }

    #[must_use]
    pub fn descriptor(self) -> ActionDescriptor {
        let (label, required_config, mutating): (_, &'static [&'static str], _) = match self {
            Self::IncreaseBudget => ("Increase budget", &["percent"], true),
            Self::DecreaseBudget => ("Decrease budget", &["percent"], true),
            Self::SetBudget => ("Set budget", &["amount"], true),
            Self::IncreaseBid => ("Increase bid", &["percent"], true),
            Self::DecreaseBid => ("Decrease bid", &["percent"], true),
            Self::SetBid => ("Set bid", &["amount"], true),
            Self::PauseCampaign => ("Pause campaign", &[], true),
            Self::EnableCampaign => ("Enable campaign", &[], true),
            Self::AddLabel => ("Add label", &["label"], true),
            Self::SendAlert => ("Send alert", &["channel", "message"], false),
        };
        ActionDescriptor {
            action_type: self,
            label,
            required_config,
            mutating,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an alert is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertChannel {
    #[default]
    InApp,
    Email,
    Slack,
}

/// Typed configuration payload, one variant per [`ActionType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    IncreaseBudget {
        percent: f64,
        /// Daily budget ceiling the increase may not exceed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_budget: Option<f64>,
    },
    DecreaseBudget {
        percent: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_budget: Option<f64>,
    },
    SetBudget {
        amount: f64,
    },
    IncreaseBid {
        percent: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_bid: Option<f64>,
    },
    DecreaseBid {
        percent: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_bid: Option<f64>,
    },
    SetBid {
        amount: f64,
    },
    PauseCampaign,
    EnableCampaign,
    AddLabel {
        label: String,
    },
    SendAlert {
        #[serde(default)]
        channel: AlertChannel,
        message: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        recipients: Vec<String>,
    },
}

impl ActionConfig {
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::IncreaseBudget { .. } => ActionType::IncreaseBudget,
            Self::DecreaseBudget { .. } => ActionType::DecreaseBudget,
            Self::SetBudget { .. } => ActionType::SetBudget,
            Self::IncreaseBid { .. } => ActionType::IncreaseBid,
            Self::DecreaseBid { .. } => ActionType::DecreaseBid,
            Self::SetBid { .. } => ActionType::SetBid,
            Self::PauseCampaign => ActionType::PauseCampaign,
            Self::EnableCampaign => ActionType::EnableCampaign,
            Self::AddLabel { .. } => ActionType::AddLabel,
            Self::SendAlert { .. } => ActionType::SendAlert,
        }
    }

    /// Check the payload against its action type.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidActionConfig`] naming the problem.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let action = self.action_type();
        let invalid = |reason| ValidationError::InvalidActionConfig { action, reason };

        match self {
            Self::IncreaseBudget {
                percent,
                max_budget: bound,
            }
            | Self::IncreaseBid {
                percent,
                max_bid: bound,
            } => {
                check_percent(*percent, 1000.0).map_err(invalid)?;
                check_optional_amount(*bound).map_err(invalid)?;
            }
            Self::DecreaseBudget {
                percent,
                min_budget: bound,
            }
            | Self::DecreaseBid {
                percent,
                min_bid: bound,
            } => {
                check_percent(*percent, 100.0).map_err(invalid)?;
                check_optional_amount(*bound).map_err(invalid)?;
            }
            Self::SetBudget { amount } | Self::SetBid { amount } => {
                check_amount(*amount).map_err(invalid)?;
            }
            Self::AddLabel { label } => {
                if label.trim().is_empty() {
                    return Err(invalid("label must not be empty"));
                }
            }
            Self::SendAlert { message, .. } => {
                if message.trim().is_empty() {
                    return Err(invalid("message must not be empty"));
                }
            }
            Self::PauseCampaign | Self::EnableCampaign => {}
        }
        Ok(())
    }
}

fn check_percent(percent: f64, max: f64) -> Result<(), &'static str> {
    if percent.is_finite() && percent > 0.0 && percent <= max {
        Ok(())
    } else if max < 1000.0 {
        Err("percent must be greater than 0 and at most 100")
    } else {
        Err("percent must be greater than 0 and at most 1000")
    }
}

fn check_amount(amount: f64) -> Result<(), &'static str> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err("amount must be a positive number")
    }
}

fn check_optional_amount(amount: Option<f64>) -> Result<(), &'static str> {
    amount.map_or(Ok(()), check_amount)
}

/// An action attached to a rule, applied in ascending `priority` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(flatten)]
    pub config: ActionConfig,
    #[serde(default)]
    pub priority: i32,
}

impl RuleAction {
    #[must_use]
    pub fn new(config: ActionConfig, priority: i32) -> Self {
        Self { config, priority }
    }

    #[must_use]
    pub fn action_type(&self) -> ActionType {
        self.config.action_type()
    }
}

/// Actions in execution order: ascending priority, ties keep declaration order.
#[must_use]
pub fn execution_order(actions: &[RuleAction]) -> Vec<&RuleAction> {
    let mut ordered: Vec<&RuleAction> = actions.iter().collect();
    // `sort_by_key` is stable.
    ordered.sort_by_key(|a| a.priority);
    ordered
}
