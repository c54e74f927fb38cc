//! Execution governor — per-rule single-flight admission.
//!
//! At most one evaluation-and-action unit per rule may be in progress.
//! Admission is a non-blocking try: a second caller for the same rule is
//! turned away (and recorded as skipped with reason `concurrent`) rather
//! than queued. Cooldown and daily-cap limits are checked by the engine
//! under the slot, see [`Rule::check_limits`](adpilot_domain::rule::Rule::check_limits).

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use adpilot_domain::id::RuleId;

/// Tracks which rules currently have an execution in flight.
#[derive(Debug, Default)]
pub struct ExecutionGovernor {
    in_flight: Mutex<HashSet<RuleId>>,
}

impl ExecutionGovernor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the slot for `rule_id`.
    ///
    /// Returns `None` when another execution of the same rule holds it.
    /// The slot is released when the guard drops, including on error paths.
    #[must_use]
    pub fn try_acquire(&self, rule_id: RuleId) -> Option<InFlightGuard<'_>> {
        let claimed = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(rule_id);
        claimed.then(|| InFlightGuard {
            governor: self,
            rule_id,
        })
    }
}

/// Holds a rule's in-flight slot.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    governor: &'a ExecutionGovernor,
    rule_id: RuleId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.governor
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.rule_id);
    }
}
