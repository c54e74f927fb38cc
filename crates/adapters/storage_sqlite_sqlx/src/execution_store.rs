//! `SQLite` implementation of [`ExecutionStore`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use adpilot_app::ports::{ExecutionStore, Page, PageRequest};
use adpilot_domain::error::AdPilotError;
use adpilot_domain::execution::{ExecutionStatus, RuleExecution, SkipReason};
use adpilot_domain::id::{ExecutionId, RuleId};
use adpilot_domain::time::Timestamp;

use crate::codec::{RowExt, decode_ts, encode_ts, to_json};
use crate::error::StorageError;

struct Wrapper(RuleExecution);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let rule_id: uuid::Uuid = row.try_get("rule_id")?;
        let skip_reason: Option<String> = row.try_get("skip_reason")?;
        let skip_reason = skip_reason
            .map(|raw| {
                raw.parse()
                    .map_err(|err: String| sqlx::Error::Decode(Box::new(StorageError::Corrupt(err))))
            })
            .transpose()?;

        Ok(Self(RuleExecution {
            id: ExecutionId::from_uuid(id),
            rule_id: RuleId::from_uuid(rule_id),
            trigger_source: row.parsed("trigger_source")?,
            triggered_at: row.ts("triggered_at")?,
            completed_at: row.ts("completed_at")?,
            status: row.parsed("status")?,
            skip_reason,
            actions_executed: row.json("actions_executed")?,
            dry_run: row.try_get("dry_run")?,
            signal_health: row.try_get("signal_health")?,
        }))
    }
}

fn to_i64(value: u64) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::Corrupt(format!("{value} does not fit a column")))
}

fn to_u64(value: i64) -> Result<u64, StorageError> {
    u64::try_from(value).map_err(|_| StorageError::Corrupt(format!("negative count {value}")))
}

/// `SQLite`-backed execution history. Rows are only ever inserted.
#[derive(Clone)]
pub struct SqliteExecutionStore {
    pool: SqlitePool,
}

impl SqliteExecutionStore {
    /// Create a new store backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ExecutionStore for SqliteExecutionStore {
    async fn append(&self, execution: RuleExecution) -> Result<RuleExecution, AdPilotError> {
        execution.validate()?;
        let actions = to_json(&execution.actions_executed)?;

        sqlx::query(
            "INSERT INTO rule_executions (id, rule_id, trigger_source, triggered_at, completed_at, status, skip_reason, actions_executed, dry_run, signal_health) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(execution.id.as_uuid())
        .bind(execution.rule_id.as_uuid())
        .bind(execution.trigger_source.as_str())
        .bind(encode_ts(execution.triggered_at))
        .bind(encode_ts(execution.completed_at))
        .bind(execution.status.as_str())
        .bind(execution.skip_reason.map(SkipReason::as_str))
        .bind(&actions)
        .bind(execution.dry_run)
        .bind(execution.signal_health)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(execution)
    }

    async fn list_by_rule(
        &self,
        rule_id: RuleId,
        page: PageRequest,
    ) -> Result<Page<RuleExecution>, AdPilotError> {
        let rows: Vec<Wrapper> = sqlx::query_as(
            "SELECT * FROM rule_executions WHERE rule_id = ? ORDER BY triggered_at DESC, id LIMIT ? OFFSET ?",
        )
        .bind(rule_id.as_uuid())
        .bind(i64::from(page.per_page))
        .bind(to_i64(page.offset())?)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rule_executions WHERE rule_id = ?")
            .bind(rule_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Page {
            items: rows.into_iter().map(|w| w.0).collect(),
            page: page.page.max(1),
            per_page: page.per_page,
            total: to_u64(total)?,
        })
    }

    async fn count_since(&self, rule_id: RuleId, since: Timestamp) -> Result<u64, AdPilotError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rule_executions WHERE rule_id = ? AND status != ? AND dry_run = 0 AND triggered_at >= ?",
        )
        .bind(rule_id.as_uuid())
        .bind(ExecutionStatus::Skipped.as_str())
        .bind(encode_ts(since))
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(to_u64(count)?)
    }

    async fn last_counted_at(&self, rule_id: RuleId) -> Result<Option<Timestamp>, AdPilotError> {
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT MAX(completed_at) FROM rule_executions WHERE rule_id = ? AND status != ? AND dry_run = 0",
        )
        .bind(rule_id.as_uuid())
        .bind(ExecutionStatus::Skipped.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(raw.as_deref().map(decode_ts).transpose()?)
    }

    async fn has_success(&self, rule_id: RuleId) -> Result<bool, AdPilotError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM rule_executions WHERE rule_id = ? AND status = ?)",
        )
        .bind(rule_id.as_uuid())
        .bind(ExecutionStatus::Success.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use crate::rule_repo::SqliteRuleRepository;
    use adpilot_app::ports::RuleRepository;
    use adpilot_domain::execution::{ActionResult, ExecutionAttempt};
    use adpilot_domain::rule::{ActionConfig, ActionType, Rule, RuleAction, TriggerSource};
    use adpilot_domain::time::now;

    async fn setup() -> (SqliteExecutionStore, RuleId) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let rule = Rule::builder()
            .name("History rule")
            .action(RuleAction::new(ActionConfig::PauseCampaign, 0))
            .build()
            .unwrap();
        SqliteRuleRepository::new(db.pool().clone())
            .create(rule.clone())
            .await
            .unwrap();
        (SqliteExecutionStore::new(db.pool().clone()), rule.id)
    }

    fn completed(rule_id: RuleId, at: Timestamp, dry_run: bool, ok: bool) -> RuleExecution {
        let result = if ok {
            ActionResult::success(ActionType::PauseCampaign, Some("c-1".into()), "paused")
        } else {
            ActionResult::failed(ActionType::PauseCampaign, Some("c-1".into()), "rejected")
        };
        ExecutionAttempt::start(rule_id, TriggerSource::Schedule, at).completed(
            vec![result],
            dry_run,
            at,
        )
    }

    fn skipped(rule_id: RuleId, at: Timestamp) -> RuleExecution {
        let mut attempt = ExecutionAttempt::start(rule_id, TriggerSource::Metric, at);
        attempt.observe_signal_health(55.5);
        attempt.skipped(SkipReason::TrustHold, at)
    }

    #[tokio::test]
    async fn should_append_and_list_execution() {
        let (store, rule_id) = setup().await;
        let execution = skipped(rule_id, now());

        store.append(execution.clone()).await.unwrap();
        let page = store
            .list_by_rule(rule_id, PageRequest::default())
            .await
            .unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items, vec![execution]);
    }

    #[tokio::test]
    async fn should_list_newest_first_with_pagination() {
        let (store, rule_id) = setup().await;
        let base = now();
        for minutes in 0..5 {
            store
                .append(completed(
                    rule_id,
                    base - chrono::Duration::minutes(minutes),
                    false,
                    true,
                ))
                .await
                .unwrap();
        }

        let first = store
            .list_by_rule(rule_id, PageRequest::new(1, 2).unwrap())
            .await
            .unwrap();
        let last = store
            .list_by_rule(rule_id, PageRequest::new(3, 2).unwrap())
            .await
            .unwrap();

        assert_eq!(first.total, 5);
        assert_eq!(first.items[0].triggered_at, base);
        assert!(first.items[0].triggered_at > first.items[1].triggered_at);
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].triggered_at, base - chrono::Duration::minutes(4));
    }

    #[tokio::test]
    async fn should_count_only_live_non_skipped_executions_in_window() {
        let (store, rule_id) = setup().await;
        let at = now();
        store.append(completed(rule_id, at, false, true)).await.unwrap();
        store.append(completed(rule_id, at, false, false)).await.unwrap();
        store.append(completed(rule_id, at, true, true)).await.unwrap();
        store.append(skipped(rule_id, at)).await.unwrap();
        store
            .append(completed(rule_id, at - chrono::Duration::hours(30), false, true))
            .await
            .unwrap();

        let count = store
            .count_since(rule_id, at - chrono::Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn should_return_latest_live_completion_when_asked_for_last_counted_run() {
        let (store, rule_id) = setup().await;
        let at = now();
        assert_eq!(store.last_counted_at(rule_id).await.unwrap(), None);

        store
            .append(completed(rule_id, at - chrono::Duration::hours(5), false, false))
            .await
            .unwrap();
        store
            .append(completed(rule_id, at - chrono::Duration::hours(2), false, true))
            .await
            .unwrap();
        store.append(completed(rule_id, at, true, true)).await.unwrap();
        store.append(skipped(rule_id, at)).await.unwrap();

        let last = store.last_counted_at(rule_id).await.unwrap().unwrap();
        assert_eq!(
            last.timestamp_millis(),
            (at - chrono::Duration::hours(2)).timestamp_millis()
        );
    }

    #[tokio::test]
    async fn should_report_success_only_after_successful_execution() {
        let (store, rule_id) = setup().await;
        store.append(completed(rule_id, now(), false, false)).await.unwrap();
        assert!(!store.has_success(rule_id).await.unwrap());

        store.append(completed(rule_id, now(), true, true)).await.unwrap();
        assert!(store.has_success(rule_id).await.unwrap());
    }

    #[tokio::test]
    async fn should_reject_execution_when_skip_reason_inconsistent() {
        let (store, rule_id) = setup().await;
        let mut execution = completed(rule_id, now(), false, true);
        execution.skip_reason = Some(SkipReason::Cooldown);

        assert!(matches!(
            store.append(execution).await,
            Err(AdPilotError::Validation(_))
        ));
    }
}
