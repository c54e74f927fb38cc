//! Rule runner — driving port through which schedulers, HTTP handlers and
//! event listeners ask for one rule evaluation.

use std::future::Future;

use serde::Serialize;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution::RuleExecution;
use adpilot_domain::id::RuleId;
use adpilot_domain::rule::{RuleStatus, TriggerSource};

/// What a single evaluation led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Conditions did not hold. Nothing is recorded.
    NotTriggered,
    /// The rule is not active and was not evaluated.
    Inactive { status: RuleStatus },
    /// An execution was recorded (skipped, pending approval or completed).
    Recorded { execution: RuleExecution },
}

impl RunOutcome {
    #[must_use]
    pub fn execution(&self) -> Option<&RuleExecution> {
        match self {
            Self::Recorded { execution } => Some(execution),
            Self::NotTriggered | Self::Inactive { .. } => None,
        }
    }
}

pub trait RuleRunner {
    /// Evaluate `rule_id` once, end-to-end.
    fn run(
        &self,
        rule_id: RuleId,
        source: TriggerSource,
    ) -> impl Future<Output = Result<RunOutcome, AdPilotError>> + Send;
}

impl<T: RuleRunner + Send + Sync> RuleRunner for std::sync::Arc<T> {
    fn run(
        &self,
        rule_id: RuleId,
        source: TriggerSource,
    ) -> impl Future<Output = Result<RunOutcome, AdPilotError>> + Send {
        (**self).run(rule_id, source)
    }
}
