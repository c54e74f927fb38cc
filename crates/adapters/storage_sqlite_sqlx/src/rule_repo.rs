//! `SQLite` implementation of [`RuleRepository`].

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use adpilot_app::ports::RuleRepository;
use adpilot_domain::error::{AdPilotError, NotFoundError};
use adpilot_domain::id::RuleId;
use adpilot_domain::rule::Rule;
use adpilot_domain::time::Timestamp;

use crate::codec::{RowExt, encode_ts, to_json, to_variant};
use crate::error::StorageError;

struct Wrapper(Rule);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Rule> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        Ok(Self(Rule {
            id: RuleId::from_uuid(id),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: row.parsed("status")?,
            trigger: row.variant("trigger_type")?,
            expression: row.json("expression")?,
            actions: row.json("actions")?,
            targeting: row.json("targeting")?,
            schedule: row.opt_json("schedule")?,
            trust_gate: row.json("trust_gate")?,
            cooldown_hours: row.count("cooldown_hours")?,
            max_executions_per_day: row.count("max_executions_per_day")?,
            last_run_at: row.opt_ts("last_run_at")?,
            run_count: row.count("run_count")?,
            created_at: row.ts("created_at")?,
            updated_at: row.ts("updated_at")?,
        }))
    }
}

/// Editable columns of a rule, encoded for binding.
struct Encoded {
    trigger_type: String,
    expression: String,
    actions: String,
    targeting: String,
    schedule: Option<String>,
    trust_gate: String,
}

impl Encoded {
    fn new(rule: &Rule) -> Result<Self, StorageError> {
        Ok(Self {
            trigger_type: to_variant(&rule.trigger)?,
            expression: to_json(&rule.expression)?,
            actions: to_json(&rule.actions)?,
            targeting: to_json(&rule.targeting)?,
            schedule: rule.schedule.as_ref().map(to_json).transpose()?,
            trust_gate: to_json(&rule.trust_gate)?,
        })
    }
}

fn to_i64(value: u64) -> Result<i64, StorageError> {
    i64::try_from(value).map_err(|_| StorageError::Corrupt(format!("{value} does not fit a column")))
}

fn not_found(id: RuleId) -> AdPilotError {
    NotFoundError {
        entity: "Rule",
        id: id.to_string(),
    }
    .into()
}

/// `SQLite`-backed rule repository.
///
/// `update` never touches `last_run_at` / `run_count`; those only move
/// through [`RuleRepository::record_run`], a single atomic statement.
#[derive(Clone)]
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RuleRepository for SqliteRuleRepository {
    async fn create(&self, rule: Rule) -> Result<Rule, AdPilotError> {
        let encoded = Encoded::new(&rule)?;

        sqlx::query(
            "INSERT INTO rules (id, name, description, status, trigger_type, expression, actions, targeting, schedule, trust_gate, cooldown_hours, max_executions_per_day, last_run_at, run_count, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(rule.id.as_uuid())
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.status.as_str())
        .bind(&encoded.trigger_type)
        .bind(&encoded.expression)
        .bind(&encoded.actions)
        .bind(&encoded.targeting)
        .bind(&encoded.schedule)
        .bind(&encoded.trust_gate)
        .bind(i64::from(rule.cooldown_hours))
        .bind(i64::from(rule.max_executions_per_day))
        .bind(rule.last_run_at.map(encode_ts))
        .bind(to_i64(rule.run_count)?)
        .bind(encode_ts(rule.created_at))
        .bind(encode_ts(rule.updated_at))
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(rule)
    }

    async fn get_by_id(&self, id: RuleId) -> Result<Option<Rule>, AdPilotError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM rules WHERE id = ?")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Rule>, AdPilotError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM rules ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn get_active(&self) -> Result<Vec<Rule>, AdPilotError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM rules WHERE status = 'active' ORDER BY created_at")
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, rule: Rule) -> Result<Rule, AdPilotError> {
        let encoded = Encoded::new(&rule)?;

        let result = sqlx::query(
            "UPDATE rules SET name = ?, description = ?, status = ?, trigger_type = ?, expression = ?, actions = ?, targeting = ?, schedule = ?, trust_gate = ?, cooldown_hours = ?, max_executions_per_day = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.status.as_str())
        .bind(&encoded.trigger_type)
        .bind(&encoded.expression)
        .bind(&encoded.actions)
        .bind(&encoded.targeting)
        .bind(&encoded.schedule)
        .bind(&encoded.trust_gate)
        .bind(i64::from(rule.cooldown_hours))
        .bind(i64::from(rule.max_executions_per_day))
        .bind(encode_ts(rule.updated_at))
        .bind(rule.id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(not_found(rule.id));
        }
        self.get_by_id(rule.id)
            .await?
            .ok_or_else(|| not_found(rule.id))
    }

    async fn record_run(&self, id: RuleId, at: Timestamp) -> Result<(), AdPilotError> {
        let result = sqlx::query(
            "UPDATE rules SET last_run_at = ?, run_count = run_count + 1 WHERE id = ?",
        )
        .bind(encode_ts(at))
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}
