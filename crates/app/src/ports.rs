//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! Driven ports: [`RuleRepository`], [`ExecutionStore`], [`MetricSource`],
//! [`SignalHealthSource`], [`ActionBackend`], [`EventPublisher`].
//! Driving port: [`RuleRunner`].

pub mod action_backend;
pub mod event_publisher;
pub mod execution_store;
pub mod metric_source;
pub mod rule_repo;
pub mod rule_runner;

pub use action_backend::{ActionBackend, ActionMode, ActionOutcome, ActionRequest};
pub use event_publisher::EventPublisher;
pub use execution_store::{ExecutionStore, Page, PageRequest};
pub use metric_source::{MetricSource, SignalHealthSource};
pub use rule_repo::RuleRepository;
pub use rule_runner::{RuleRunner, RunOutcome};
