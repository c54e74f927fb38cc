//! Action backend port — applies (or simulates) actions on a platform.

use std::future::Future;

use serde::Serialize;

use adpilot_domain::error::ActionError;
use adpilot_domain::id::{CampaignId, ExecutionId};
use adpilot_domain::rule::{ActionConfig, Targeting};

/// Whether the backend may mutate campaign state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    Live,
    /// Report the intended effect without mutating anything.
    Simulate,
}

/// One action call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRequest {
    /// Idempotency key shared by every call of one execution.
    pub execution_id: ExecutionId,
    pub config: ActionConfig,
    /// Explicit target, or `None` to act on every campaign in `scope`.
    pub campaign: Option<CampaignId>,
    pub scope: Targeting,
    pub mode: ActionMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Backend-provided description of what was (or would be) done.
    pub detail: String,
}

/// An advertising platform API, treated as an opaque, possibly failing,
/// non-idempotent remote operation.
pub trait ActionBackend {
    fn apply(
        &self,
        request: &ActionRequest,
    ) -> impl Future<Output = Result<ActionOutcome, ActionError>> + Send;
}

impl<T: ActionBackend + Send + Sync> ActionBackend for std::sync::Arc<T> {
    fn apply(
        &self,
        request: &ActionRequest,
    ) -> impl Future<Output = Result<ActionOutcome, ActionError>> + Send {
        (**self).apply(request)
    }
}
