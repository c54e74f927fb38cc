//! Opening the `SQLite` database and bringing its schema up to date.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::error::StorageError;

const MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Storage adapter settings.
pub struct Config {
    /// `sqlite:adpilot.db?mode=rwc`, `sqlite::memory:`, ...
    pub database_url: String,
}

impl Config {
    /// Open the pool and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the URL is invalid, the file cannot be
    /// opened, or a migration fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        let options = connect_options(&self.database_url)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(url = %self.database_url, "database migrated");
        Ok(Database { pool })
    }
}

/// Scheduler ticks run rules concurrently, so writers wait on the lock
/// instead of failing with `SQLITE_BUSY`. In-memory databases keep the
/// default journal.
fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);
    if is_memory(database_url) {
        return Ok(options);
    }
    Ok(options
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal))
}

fn is_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
