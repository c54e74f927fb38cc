//! # adpilot-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **driven ports** that adapters implement:
//!   - `RuleRepository` — rules and their governor counters
//!   - `ExecutionStore` — append-only execution history
//!   - `MetricSource` / `SignalHealthSource` — read-only platform data
//!   - `ActionBackend` — applies or simulates actions
//!   - `EventPublisher` — domain event fan-out
//! - Define the **driving port** `RuleRunner` and implement it with the
//!   `RuleEngine` (evaluation → trust gate → governor → executor → history)
//! - Provide the `RuleService` (CRUD use-cases) and the `RuleScheduler` poll loop
//! - Provide **in-process infrastructure** (event bus, execution governor)
//!
//! ## Dependency rule
//! Depends on `adpilot-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod executor;
pub mod governor;
pub mod ports;
pub mod rule_engine;
pub mod scheduler;
pub mod services;

#[cfg(test)]
mod test_support;
