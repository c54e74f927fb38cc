//! Execution store port — append-only execution history.

use std::future::Future;

use serde::{Deserialize, Serialize};

use adpilot_domain::error::{AdPilotError, ValidationError};
use adpilot_domain::execution::RuleExecution;
use adpilot_domain::id::RuleId;
use adpilot_domain::time::Timestamp;

/// One page of history, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const MAX_PER_PAGE: u32 = 100;
    pub const DEFAULT_PER_PAGE: u32 = 20;

    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPageSize`] when `per_page` is zero or
    /// above [`Self::MAX_PER_PAGE`].
    pub fn new(page: u32, per_page: u32) -> Result<Self, ValidationError> {
        let request = Self { page, per_page };
        request.validate()?;
        Ok(request)
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPageSize`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.per_page == 0 || self.per_page > Self::MAX_PER_PAGE {
            return Err(ValidationError::InvalidPageSize {
                max: Self::MAX_PER_PAGE,
            });
        }
        Ok(())
    }

    /// Rows to skip. Page 0 is treated as page 1.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: Self::DEFAULT_PER_PAGE,
        }
    }
}

/// A page of results plus the total item count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

/// Durable, append-only history of [`RuleExecution`]s.
pub trait ExecutionStore {
    /// Append a finalized execution. Records are never updated.
    fn append(
        &self,
        execution: RuleExecution,
    ) -> impl Future<Output = Result<RuleExecution, AdPilotError>> + Send;

    /// A rule's history, newest trigger first.
    fn list_by_rule(
        &self,
        rule_id: RuleId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<RuleExecution>, AdPilotError>> + Send;

    /// Number of executions of `rule_id` triggered at or after `since` that
    /// count toward the daily cap (neither skipped nor dry-run).
    fn count_since(
        &self,
        rule_id: RuleId,
        since: Timestamp,
    ) -> impl Future<Output = Result<u64, AdPilotError>> + Send;

    /// Completion time of the latest execution of `rule_id` that counts
    /// toward the daily cap.
    fn last_counted_at(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Option<Timestamp>, AdPilotError>> + Send;

    /// Whether `rule_id` has ever had a successful execution, dry-run included.
    fn has_success(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<bool, AdPilotError>> + Send;
}

impl<T: ExecutionStore + Send + Sync> ExecutionStore for std::sync::Arc<T> {
    fn append(
        &self,
        execution: RuleExecution,
    ) -> impl Future<Output = Result<RuleExecution, AdPilotError>> + Send {
        (**self).append(execution)
    }

    fn list_by_rule(
        &self,
        rule_id: RuleId,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<RuleExecution>, AdPilotError>> + Send {
        (**self).list_by_rule(rule_id, page)
    }

    fn count_since(
        &self,
        rule_id: RuleId,
        since: Timestamp,
    ) -> impl Future<Output = Result<u64, AdPilotError>> + Send {
        (**self).count_since(rule_id, since)
    }

    fn last_counted_at(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Option<Timestamp>, AdPilotError>> + Send {
        (**self).last_counted_at(rule_id)
    }

    fn has_success(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<bool, AdPilotError>> + Send {
        (**self).has_success(rule_id)
    }
}
