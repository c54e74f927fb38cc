//! Storage-specific error type wrapping sqlx errors.

use adpilot_domain::error::AdPilotError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON value.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value cannot be mapped back to the domain.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<StorageError> for AdPilotError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
