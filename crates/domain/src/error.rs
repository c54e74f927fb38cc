//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`AdPilotError`] via `#[from]` (no `String`-only variants at the top level).

use crate::execution::ExecutionStatus;
use crate::metric::MetricField;
use crate::rule::{ActionType, Operator, RuleStatus};

/// Top-level error for every fallible domain and application operation.
#[derive(Debug, thiserror::Error)]
pub enum AdPilotError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A metric or signal health read failed.
    #[error("upstream source error")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated. Raised at save time, never during evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("a rule needs at least one action")]
    NoActions,

    #[error("operator {operator} expects {expected}")]
    OperandMismatch {
        operator: Operator,
        expected: &'static str,
    },

    #[error("operator {operator} requires a comparison window")]
    MissingWindow { operator: Operator },

    #[error("range lower bound {low} is greater than upper bound {high}")]
    InvertedRange { low: f64, high: f64 },

    #[error("condition on {field} has a non-finite operand")]
    NonFiniteValue { field: MetricField },

    #[error("condition on {field} is out of range: {reason}")]
    ValueOutOfRange {
        field: MetricField,
        reason: &'static str,
    },

    #[error("invalid window {0:?}, expected e.g. \"30m\", \"24h\", \"7d\"")]
    InvalidWindow(String),

    #[error("invalid {action} configuration: {reason}")]
    InvalidActionConfig {
        action: ActionType,
        reason: &'static str,
    },

    #[error("signal health threshold {0} must be between 0 and 100")]
    InvalidSignalHealth(f64),

    #[error("degraded threshold {degraded} must not exceed healthy threshold {healthy}")]
    InvalidTrustThresholds { degraded: f64, healthy: f64 },

    #[error("max executions per day must be at least 1")]
    ZeroDailyCap,

    #[error("schedule-triggered rules need a schedule")]
    MissingSchedule,

    #[error("cannot move a rule from {from} to {to}")]
    InvalidStatusTransition { from: RuleStatus, to: RuleStatus },

    #[error("a new rule cannot start archived")]
    CreatedArchived,

    #[error("rule is {status}, only active rules can be executed")]
    RuleNotActive { status: RuleStatus },

    #[error("execution with status {0} cannot carry a skip reason")]
    UnexpectedSkipReason(ExecutionStatus),

    #[error("invalid identifier {0:?}")]
    InvalidId(String),

    #[error("page size must be between 1 and {max}")]
    InvalidPageSize { max: u32 },

    #[error("unknown template {0:?}")]
    UnknownTemplate(String),
}

/// A requested resource does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Failure reported by an action backend for a single action call.
///
/// Recorded into the per-action result; never aborts sibling actions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The platform refused the change (policy, invalid state, quota, …).
    #[error("rejected by platform: {0}")]
    Rejected(String),

    /// The platform could not be reached or answered with a server error.
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// No answer within the configured bound. The call is not retried.
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
}
