//! Action executor — applies a rule's actions against the action backend.
//!
//! Actions run in ascending priority order, one call per target campaign.
//! Policy is continue-on-error: each call's outcome is recorded on its own
//! and a failure never prevents later calls. Every call is bounded by a
//! timeout and is never retried, since platform mutations are not idempotent.
//! The execution id travels with every call as the idempotency key.

use std::time::Duration;

use adpilot_domain::error::ActionError;
use adpilot_domain::execution::ActionResult;
use adpilot_domain::id::{CampaignId, ExecutionId};
use adpilot_domain::rule::Rule;

use crate::ports::{ActionBackend, ActionMode, ActionRequest};

pub struct ActionExecutor<B> {
    backend: B,
    timeout: Duration,
}

impl<B: ActionBackend> ActionExecutor<B> {
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Apply every action of `rule` and return one result per call, in the
    /// order the calls were made.
    #[tracing::instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub async fn execute(
        &self,
        execution_id: ExecutionId,
        rule: &Rule,
        mode: ActionMode,
    ) -> Vec<ActionResult> {
        let targets: Vec<Option<CampaignId>> = if rule.targeting.campaign_ids.is_empty() {
            vec![None]
        } else {
            rule.targeting.campaign_ids.iter().cloned().map(Some).collect()
        };

        let mut results = Vec::new();
        for action in rule.ordered_actions() {
            let action_type = action.action_type();
            for campaign in &targets {
                let request = ActionRequest {
                    execution_id,
                    config: action.config.clone(),
                    campaign: campaign.clone(),
                    scope: rule.targeting.clone(),
                    mode,
                };
                let result = match tokio::time::timeout(self.timeout, self.backend.apply(&request))
                    .await
                {
                    Ok(Ok(outcome)) => {
                        tracing::debug!(%action_type, detail = %outcome.detail, "action applied");
                        ActionResult::success(action_type, campaign.clone(), outcome.detail)
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(%action_type, error = %err, "action failed");
                        ActionResult::failed(action_type, campaign.clone(), err.to_string())
                    }
                    Err(_) => {
                        let err = ActionError::Timeout {
                            seconds: self.timeout.as_secs(),
                        };
                        tracing::warn!(%action_type, error = %err, "action timed out");
                        ActionResult::failed(action_type, campaign.clone(), err.to_string())
                    }
                };
                results.push(result);
            }
        }
        results
    }
}
