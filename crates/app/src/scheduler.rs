//! Rule scheduler — the poll loop that fires schedule and metric-threshold rules.
//!
//! Each tick lists active rules, selects the due ones and evaluates them
//! concurrently, one task per rule. Single-flight per rule is enforced by the
//! engine, not here, so a slow evaluation overlapping the next tick is
//! recorded as a `concurrent` skip.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::id::RuleId;
use adpilot_domain::time::{Timestamp, now};

use crate::ports::{RuleRepository, RuleRunner, RunOutcome};

pub struct RuleScheduler<R, X> {
    rules: R,
    runner: Arc<X>,
    last_evaluated: Mutex<HashMap<RuleId, Timestamp>>,
}

impl<R, X> RuleScheduler<R, X>
where
    R: RuleRepository,
    X: RuleRunner + Send + Sync + 'static,
{
    pub fn new(rules: R, runner: Arc<X>) -> Self {
        Self {
            rules,
            runner,
            last_evaluated: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate every due rule once and wait for all of them.
    ///
    /// Returns how many rules were dispatched. Per-rule failures are logged
    /// and do not fail the tick.
    ///
    /// # Errors
    ///
    /// Returns a storage error when active rules cannot be listed.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<usize, AdPilotError> {
        let at = now();
        let active = self.rules.get_active().await?;

        let due: Vec<_> = {
            let mut last = self
                .last_evaluated
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            last.retain(|id, _| active.iter().any(|r| r.id == *id));
            active
                .iter()
                .filter_map(|rule| {
                    let source = rule.due(last.get(&rule.id).copied(), at)?;
                    last.insert(rule.id, at);
                    Some((rule.id, source))
                })
                .collect()
        };

        let mut tasks = JoinSet::new();
        for (rule_id, source) in &due {
            let runner = Arc::clone(&self.runner);
            let (rule_id, source) = (*rule_id, *source);
            tasks.spawn(async move { (rule_id, runner.run(rule_id, source).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((rule_id, Ok(outcome))) => log_outcome(rule_id, &outcome),
                Ok((rule_id, Err(err))) => {
                    tracing::warn!(%rule_id, error = %err, "rule evaluation failed");
                }
                Err(err) => tracing::warn!(error = %err, "rule evaluation task panicked"),
            }
        }
        Ok(due.len())
    }

    /// Tick every `period` until `shutdown` resolves.
    pub async fn run_until(&self, period: Duration, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        tracing::info!(period_secs = period.as_secs(), "rule scheduler started");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    if let Err(err) = self.tick().await {
                        tracing::warn!(error = %err, "scheduler tick failed, retrying next interval");
                    }
                }
            }
        }
        tracing::info!("rule scheduler stopped");
    }
}

fn log_outcome(rule_id: RuleId, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Recorded { execution } => tracing::info!(
            %rule_id,
            status = %execution.status,
            "scheduled evaluation recorded"
        ),
        RunOutcome::NotTriggered | RunOutcome::Inactive { .. } => {
            tracing::debug!(%rule_id, "scheduled evaluation did not fire");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryRuleRepo;
    use adpilot_domain::rule::{
        ActionConfig, Rule, RuleAction, RuleStatus, Schedule, ScheduleFrequency, TriggerSource,
        TriggerType,
    };

    #[derive(Default)]
    struct RecordingRunner {
        runs: Mutex<Vec<(RuleId, TriggerSource)>>,
    }

    impl RecordingRunner {
        fn runs(&self) -> Vec<(RuleId, TriggerSource)> {
            self.runs.lock().unwrap().clone()
        }
    }

    impl RuleRunner for RecordingRunner {
        fn run(
            &self,
            rule_id: RuleId,
            source: TriggerSource,
        ) -> impl Future<Output = Result<RunOutcome, AdPilotError>> + Send {
            self.runs.lock().unwrap().push((rule_id, source));
            async { Ok(RunOutcome::NotTriggered) }
        }
    }

    fn rule(trigger: TriggerType, status: RuleStatus) -> Rule {
        let mut builder = Rule::builder()
            .name(format!("{trigger:?} rule"))
            .status(status)
            .trigger(trigger)
            .action(RuleAction::new(ActionConfig::PauseCampaign, 0));
        if trigger == TriggerType::Schedule {
            builder = builder.schedule(Schedule::new(ScheduleFrequency::Hourly));
        }
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn should_dispatch_only_due_rules_when_ticking() {
        let scheduled = rule(TriggerType::Schedule, RuleStatus::Active);
        let threshold = rule(TriggerType::MetricThreshold, RuleStatus::Active);
        let manual = rule(TriggerType::Manual, RuleStatus::Active);
        let paused = rule(TriggerType::MetricThreshold, RuleStatus::Paused);
        let repo = InMemoryRuleRepo::with(vec![
            scheduled.clone(),
            threshold.clone(),
            manual,
            paused,
        ]);
        let runner = Arc::new(RecordingRunner::default());
        let scheduler = RuleScheduler::new(repo, Arc::clone(&runner));

        let dispatched = scheduler.tick().await.unwrap();

        assert_eq!(dispatched, 2);
        let mut runs = runner.runs();
        runs.sort_by_key(|(_, source)| source.as_str());
        assert_eq!(
            runs,
            vec![
                (threshold.id, TriggerSource::Metric),
                (scheduled.id, TriggerSource::Schedule),
            ]
        );
    }

    #[tokio::test]
    async fn should_not_refire_schedule_rule_within_interval() {
        let scheduled = rule(TriggerType::Schedule, RuleStatus::Active);
        let threshold = rule(TriggerType::MetricThreshold, RuleStatus::Active);
        let repo = InMemoryRuleRepo::with(vec![scheduled.clone(), threshold.clone()]);
        let runner = Arc::new(RecordingRunner::default());
        let scheduler = RuleScheduler::new(repo, Arc::clone(&runner));

        scheduler.tick().await.unwrap();
        let second = scheduler.tick().await.unwrap();

        assert_eq!(second, 1);
        let schedule_runs = runner
            .runs()
            .iter()
            .filter(|(id, _)| *id == scheduled.id)
            .count();
        assert_eq!(schedule_runs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_when_shutdown_resolves() {
        let threshold = rule(TriggerType::MetricThreshold, RuleStatus::Active);
        let repo = InMemoryRuleRepo::with(vec![threshold]);
        let runner = Arc::new(RecordingRunner::default());
        let scheduler = RuleScheduler::new(repo, Arc::clone(&runner));

        scheduler
            .run_until(
                Duration::from_secs(60),
                tokio::time::sleep(Duration::from_secs(150)),
            )
            .await;

        // Ticks at 0s, 60s and 120s.
        assert_eq!(runner.runs().len(), 3);
    }
}
