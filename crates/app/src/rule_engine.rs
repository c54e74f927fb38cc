//! Rule engine — one end-to-end evaluation of one rule.
//!
//! Flow: governor slot → load rule → metric snapshot → condition
//! evaluation → trust gate → cooldown / daily cap → approval queue or
//! action batch (live or simulated) → history append → counter update.
//!
//! Everything from slot acquisition to the counter update is one unit of
//! work: a second evaluation of the same rule arriving meanwhile is recorded
//! as skipped with reason `concurrent`. Different rules run fully
//! concurrently. Persistence errors abort the attempt and release the slot;
//! the next trigger evaluates again. History is appended before the rule
//! counters move, and cooldown is measured from both, so an attempt whose
//! counter update failed still cools the rule down.

use std::future::Future;
use std::time::Duration;

use adpilot_domain::error::{AdPilotError, NotFoundError, ValidationError};
use adpilot_domain::event::{Event, EventType};
use adpilot_domain::execution::{ExecutionAttempt, RuleExecution, SkipReason};
use adpilot_domain::id::RuleId;
use adpilot_domain::rule::{Rule, TriggerSource, TrustDecision, TrustSettings, classify};
use adpilot_domain::time::now;

use crate::executor::ActionExecutor;
use crate::governor::ExecutionGovernor;
use crate::ports::{
    ActionBackend, ActionMode, EventPublisher, ExecutionStore, MetricSource, RuleRepository,
    RuleRunner, RunOutcome, SignalHealthSource,
};

/// Base delay between two attempts of an idempotent read.
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Engine-wide settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineSettings {
    /// Account-level trust thresholds.
    pub trust: TrustSettings,
    /// Extra attempts for metric and signal health reads.
    pub read_retries: u32,
}

pub struct RuleEngine<R, S, M, H, B, P> {
    rules: R,
    executions: S,
    metrics: M,
    health: H,
    executor: ActionExecutor<B>,
    publisher: P,
    governor: ExecutionGovernor,
    settings: EngineSettings,
}

impl<R, S, M, H, B, P> RuleEngine<R, S, M, H, B, P>
where
    R: RuleRepository,
    S: ExecutionStore,
    M: MetricSource,
    H: SignalHealthSource,
    B: ActionBackend,
    P: EventPublisher + Sync,
{
    pub fn new(
        rules: R,
        executions: S,
        metrics: M,
        health: H,
        executor: ActionExecutor<B>,
        publisher: P,
        settings: EngineSettings,
    ) -> Self {
        Self {
            rules,
            executions,
            metrics,
            health,
            executor,
            publisher,
            governor: ExecutionGovernor::new(),
            settings,
        }
    }

    /// Evaluate a rule once.
    ///
    /// # Errors
    ///
    /// - [`AdPilotError::NotFound`] when the rule does not exist
    /// - [`ValidationError::RuleNotActive`] for a manual trigger of a
    ///   non-active rule (other sources get [`RunOutcome::Inactive`])
    /// - [`AdPilotError::Upstream`] when reads still fail after retries
    /// - [`AdPilotError::Storage`] when history or counters cannot be written
    #[tracing::instrument(skip(self))]
    pub async fn run(
        &self,
        rule_id: RuleId,
        source: TriggerSource,
    ) -> Result<RunOutcome, AdPilotError> {
        let rule = self.load(rule_id).await?;
        if !rule.is_active() {
            if source == TriggerSource::Manual {
                return Err(ValidationError::RuleNotActive {
                    status: rule.status,
                }
                .into());
            }
            return Ok(RunOutcome::Inactive {
                status: rule.status,
            });
        }

        let attempt = ExecutionAttempt::start(rule_id, source, now());
        let Some(_slot) = self.governor.try_acquire(rule_id) else {
            tracing::info!("execution already in flight");
            return self.record_skip(attempt, SkipReason::Concurrent).await;
        };

        // Reload under the slot: counters may have moved since the first read.
        let rule = self.load(rule_id).await?;
        if !rule.is_active() {
            return Ok(RunOutcome::Inactive {
                status: rule.status,
            });
        }
        self.run_admitted(&rule, attempt).await
    }

    async fn load(&self, rule_id: RuleId) -> Result<Rule, AdPilotError> {
        self.rules.get_by_id(rule_id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Rule",
                id: rule_id.to_string(),
            }
            .into()
        })
    }

    async fn run_admitted(
        &self,
        rule: &Rule,
        mut attempt: ExecutionAttempt,
    ) -> Result<RunOutcome, AdPilotError> {
        let query = rule.metric_query();
        let snapshot = self
            .with_retries("metric snapshot", || self.metrics.snapshot(&query))
            .await?;
        if !rule.expression.evaluate(&snapshot) {
            tracing::debug!("conditions not met");
            return Ok(RunOutcome::NotTriggered);
        }

        if rule.trust_gate.enabled {
            let score = self
                .with_retries("signal health", || self.health.score(&rule.targeting))
                .await?;
            attempt.observe_signal_health(score);
            match classify(score, &rule.trust_gate, &self.settings.trust) {
                TrustDecision::Pass => {}
                TrustDecision::Hold => {
                    tracing::warn!(score, "signal health degraded, holding rule");
                    self.publish(
                        EventType::TrustGateHold,
                        rule.id,
                        serde_json::json!({
                            "rule_name": rule.name,
                            "signal_health": score,
                            "min_signal_health": rule.trust_gate.min_signal_health,
                            "degraded_threshold": self.settings.trust.degraded_threshold(),
                        }),
                    )
                    .await;
                    return self.record_skip(attempt, SkipReason::TrustHold).await;
                }
                TrustDecision::Block => {
                    tracing::warn!(
                        score,
                        "signal health below degraded threshold, blocking rule"
                    );
                    return self.record_skip(attempt, SkipReason::TrustBlock).await;
                }
            }
        }

        let checked_at = now();
        let recent = self
            .executions
            .count_since(rule.id, Rule::daily_cap_window_start(checked_at))
            .await?;
        let recorded_run = self.executions.last_counted_at(rule.id).await?;
        if let Err(reason) = rule.check_limits(recorded_run, recent, checked_at) {
            tracing::info!(%reason, "rate limited");
            return self.record_skip(attempt, reason).await;
        }

        if rule.trust_gate.require_approval {
            let execution = self
                .executions
                .append(attempt.pending_approval(now()))
                .await?;
            self.rules.record_run(rule.id, execution.completed_at).await?;
            tracing::info!(execution_id = %execution.id, "actions queued for approval");
            self.publish(
                EventType::ApprovalRequested,
                rule.id,
                serde_json::json!({
                    "execution_id": execution.id,
                    "rule_name": rule.name,
                    "actions": rule.ordered_actions(),
                }),
            )
            .await;
            return Ok(self.recorded(execution).await);
        }

        let dry_run =
            rule.trust_gate.dry_run_first && !self.executions.has_success(rule.id).await?;
        let mode = if dry_run {
            ActionMode::Simulate
        } else {
            ActionMode::Live
        };
        tracing::info!(execution_id = %attempt.id, dry_run, "executing actions");
        let results = self.executor.execute(attempt.id, rule, mode).await;
        let execution = self
            .executions
            .append(attempt.completed(results, dry_run, now()))
            .await?;
        if !dry_run {
            self.rules.record_run(rule.id, execution.completed_at).await?;
        }
        tracing::info!(
            execution_id = %execution.id,
            status = %execution.status,
            "execution recorded"
        );
        Ok(self.recorded(execution).await)
    }

    async fn record_skip(
        &self,
        attempt: ExecutionAttempt,
        reason: SkipReason,
    ) -> Result<RunOutcome, AdPilotError> {
        let execution = self.executions.append(attempt.skipped(reason, now())).await?;
        Ok(self.recorded(execution).await)
    }

    async fn recorded(&self, execution: RuleExecution) -> RunOutcome {
        self.publish(
            EventType::ExecutionRecorded,
            execution.rule_id,
            serde_json::json!({
                "execution_id": execution.id,
                "status": execution.status,
                "skip_reason": execution.skip_reason,
                "dry_run": execution.dry_run,
                "trigger_source": execution.trigger_source,
            }),
        )
        .await;
        RunOutcome::Recorded { execution }
    }

    async fn publish(&self, event_type: EventType, rule_id: RuleId, data: serde_json::Value) {
        self.publisher
            .notify(Event::new(event_type, Some(rule_id), data))
            .await;
    }

    /// Run an idempotent read, retrying up to `read_retries` extra times.
    async fn with_retries<T, F, Fut>(&self, what: &'static str, mut read: F) -> Result<T, AdPilotError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdPilotError>>,
    {
        let mut retries = 0;
        loop {
            match read().await {
                Ok(value) => return Ok(value),
                Err(err) if retries < self.settings.read_retries => {
                    retries += 1;
                    tracing::warn!(what, retries, error = %err, "read failed, retrying");
                    tokio::time::sleep(READ_RETRY_BACKOFF * retries).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R, S, M, H, B, P> RuleRunner for RuleEngine<R, S, M, H, B, P>
where
    R: RuleRepository + Send + Sync,
    S: ExecutionStore + Send + Sync,
    M: MetricSource + Send + Sync,
    H: SignalHealthSource + Send + Sync,
    B: ActionBackend + Send + Sync,
    P: EventPublisher + Send + Sync,
{
    fn run(
        &self,
        rule_id: RuleId,
        source: TriggerSource,
    ) -> impl Future<Output = Result<RunOutcome, AdPilotError>> + Send {
        RuleEngine::run(self, rule_id, source)
    }
}
