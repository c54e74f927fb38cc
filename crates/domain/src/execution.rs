//! Rule executions — immutable records of evaluation-and-action attempts.
//!
//! An [`ExecutionAttempt`] is opened once a rule's conditions hold and is
//! finalized exactly once into a [`RuleExecution`], which is then appended
//! to history and never mutated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{CampaignId, ExecutionId, RuleId};
use crate::rule::{ActionType, TriggerSource};
use crate::time::Timestamp;

/// Overall outcome of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Every action succeeded.
    Success,
    /// At least one action failed.
    Failed,
    /// Rejected by the gate or the governor; no action was attempted.
    Skipped,
    /// Actions queued for manual approval.
    PendingApproval,
}

impl ExecutionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::PendingApproval => "pending_approval",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "pending_approval" => Ok(Self::PendingApproval),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// Why an execution was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Cooldown,
    DailyCap,
    Concurrent,
    TrustHold,
    TrustBlock,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cooldown => "cooldown",
            Self::DailyCap => "daily_cap",
            Self::Concurrent => "concurrent",
            Self::TrustHold => "trust_hold",
            Self::TrustBlock => "trust_block",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkipReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cooldown" => Ok(Self::Cooldown),
            "daily_cap" => Ok(Self::DailyCap),
            "concurrent" => Ok(Self::Concurrent),
            "trust_hold" => Ok(Self::TrustHold),
            "trust_block" => Ok(Self::TrustBlock),
            other => Err(format!("unknown skip reason: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Success,
    Failed,
}

/// Outcome of one action call against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_type: ActionType,
    /// `None` when the backend resolved the rule's scope itself.
    pub campaign_id: Option<CampaignId>,
    pub status: ActionStatus,
    pub detail: String,
}

impl ActionResult {
    #[must_use]
    pub fn success(
        action_type: ActionType,
        campaign_id: Option<CampaignId>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            campaign_id,
            status: ActionStatus::Success,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn failed(
        action_type: ActionType,
        campaign_id: Option<CampaignId>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            campaign_id,
            status: ActionStatus::Failed,
            detail: detail.into(),
        }
    }
}

/// One immutable record of a single evaluation-and-action attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleExecution {
    pub id: ExecutionId,
    pub rule_id: RuleId,
    pub trigger_source: TriggerSource,
    pub triggered_at: Timestamp,
    pub completed_at: Timestamp,
    pub status: ExecutionStatus,
    pub skip_reason: Option<SkipReason>,
    pub actions_executed: Vec<ActionResult>,
    pub dry_run: bool,
    /// Score the trust gate saw, when it was consulted.
    pub signal_health: Option<f64>,
}

impl RuleExecution {
    /// Check that `skip_reason` is present exactly when skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnexpectedSkipReason`] on mismatch.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.status, self.skip_reason) {
            (ExecutionStatus::Skipped, Some(_)) => Ok(()),
            (ExecutionStatus::Skipped, None) | (_, Some(_)) => {
                Err(ValidationError::UnexpectedSkipReason(self.status))
            }
            (_, None) => Ok(()),
        }
    }

    /// Whether the execution counts toward the daily cap and cooldown.
    /// Skipped attempts and simulations change nothing on the platform.
    #[must_use]
    pub fn counts_toward_cap(&self) -> bool {
        self.status != ExecutionStatus::Skipped && !self.dry_run
    }
}

/// An execution in progress. Consumed by exactly one finalizer.
#[derive(Debug, Clone)]
pub struct ExecutionAttempt {
    pub id: ExecutionId,
    pub rule_id: RuleId,
    pub trigger_source: TriggerSource,
    pub triggered_at: Timestamp,
    signal_health: Option<f64>,
}

impl ExecutionAttempt {
    #[must_use]
    pub fn start(rule_id: RuleId, trigger_source: TriggerSource, triggered_at: Timestamp) -> Self {
        Self {
            id: ExecutionId::new(),
            rule_id,
            trigger_source,
            triggered_at,
            signal_health: None,
        }
    }

    /// Remember the score the trust gate saw.
    pub fn observe_signal_health(&mut self, score: f64) {
        self.signal_health = Some(score);
    }

    #[must_use]
    pub fn skipped(self, reason: SkipReason, completed_at: Timestamp) -> RuleExecution {
        self.finish(
            ExecutionStatus::Skipped,
            Some(reason),
            Vec::new(),
            false,
            completed_at,
        )
    }

    #[must_use]
    pub fn pending_approval(self, completed_at: Timestamp) -> RuleExecution {
        self.finish(
            ExecutionStatus::PendingApproval,
            None,
            Vec::new(),
            false,
            completed_at,
        )
    }

    /// Finalize after the action batch ran: `success` only if every action
    /// succeeded, `failed` otherwise.
    #[must_use]
    pub fn completed(
        self,
        results: Vec<ActionResult>,
        dry_run: bool,
        completed_at: Timestamp,
    ) -> RuleExecution {
        let status = if results.iter().all(|r| r.status == ActionStatus::Success) {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        self.finish(status, None, results, dry_run, completed_at)
    }

    fn finish(
        self,
        status: ExecutionStatus,
        skip_reason: Option<SkipReason>,
        actions_executed: Vec<ActionResult>,
        dry_run: bool,
        completed_at: Timestamp,
    ) -> RuleExecution {
        RuleExecution {
            id: self.id,
            rule_id: self.rule_id,
            trigger_source: self.trigger_source,
            triggered_at: self.triggered_at,
            completed_at,
            status,
            skip_reason,
            actions_executed,
            dry_run,
            signal_health: self.signal_health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    fn attempt() -> ExecutionAttempt {
        ExecutionAttempt::start(RuleId::new(), TriggerSource::Manual, now())
    }

    #[test]
    fn should_fail_when_any_action_failed() {
        let results = vec![
            ActionResult::failed(ActionType::PauseCampaign, None, "rejected"),
            ActionResult::success(ActionType::SendAlert, None, "sent"),
        ];
        let execution = attempt().completed(results, false, now());
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.actions_executed.len(), 2);
        assert!(execution.validate().is_ok());
    }

    #[test]
    fn should_succeed_when_every_action_succeeded() {
        let results = vec![ActionResult::success(ActionType::SendAlert, None, "sent")];
        let execution = attempt().completed(results, false, now());
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert!(execution.counts_toward_cap());
    }

    #[test]
    fn should_not_count_dry_run_toward_cap() {
        let results = vec![ActionResult::success(ActionType::PauseCampaign, None, "would pause")];
        let execution = attempt().completed(results, true, now());
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert!(execution.dry_run);
        assert!(!execution.counts_toward_cap());
    }

    #[test]
    fn should_carry_reason_and_signal_health_when_skipped() {
        let mut attempt = attempt();
        attempt.observe_signal_health(55.0);
        let execution = attempt.skipped(SkipReason::TrustHold, now());
        assert_eq!(execution.status, ExecutionStatus::Skipped);
        assert_eq!(execution.skip_reason, Some(SkipReason::TrustHold));
        assert_eq!(execution.signal_health, Some(55.0));
        assert!(!execution.counts_toward_cap());
        assert!(execution.validate().is_ok());
    }

    #[test]
    fn should_count_pending_approval_toward_cap() {
        let execution = attempt().pending_approval(now());
        assert_eq!(execution.status, ExecutionStatus::PendingApproval);
        assert!(execution.counts_toward_cap());
        assert!(execution.actions_executed.is_empty());
    }

    #[test]
    fn should_reject_skip_reason_on_non_skipped_record() {
        let mut execution = attempt().pending_approval(now());
        execution.skip_reason = Some(SkipReason::Cooldown);
        assert_eq!(
            execution.validate(),
            Err(ValidationError::UnexpectedSkipReason(
                ExecutionStatus::PendingApproval
            ))
        );
    }

    #[test]
    fn should_parse_status_and_reason_from_display() {
        for status in [
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Skipped,
            ExecutionStatus::PendingApproval,
        ] {
            assert_eq!(status.to_string().parse::<ExecutionStatus>(), Ok(status));
        }
        for reason in [
            SkipReason::Cooldown,
            SkipReason::DailyCap,
            SkipReason::Concurrent,
            SkipReason::TrustHold,
            SkipReason::TrustBlock,
        ] {
            assert_eq!(reason.to_string().parse::<SkipReason>(), Ok(reason));
        }
    }
}
