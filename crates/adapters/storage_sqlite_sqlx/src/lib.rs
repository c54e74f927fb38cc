//! # adpilot-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `RuleRepository` and `ExecutionStore` ports defined in `adpilot-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Structured rule parts (expression, actions, targeting, trust gate) are
//! stored as JSON text. Timestamps are RFC 3339 UTC with a fixed nanosecond
//! precision, so they order correctly as strings.
//!
//! ## Dependency rule
//! Depends on `adpilot-app` (for port traits) and `adpilot-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;
mod error;
mod execution_store;
mod pool;
mod rule_repo;

pub use error::StorageError;
pub use execution_store::SqliteExecutionStore;
pub use pool::{Config, Database};
pub use rule_repo::SqliteRuleRepository;
