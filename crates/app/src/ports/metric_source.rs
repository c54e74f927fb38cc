//! Metric and signal health ports — the analytics pipeline as seen by the engine.
//!
//! Both are idempotent reads; the engine may retry them.

use std::future::Future;

use adpilot_domain::error::AdPilotError;
use adpilot_domain::metric::{MetricQuery, MetricSnapshot};
use adpilot_domain::rule::Targeting;

/// Source of current metric values and delta baselines.
pub trait MetricSource {
    /// Return every reading and baseline `query` asks for that is available.
    /// Missing values are simply absent from the snapshot.
    fn snapshot(
        &self,
        query: &MetricQuery,
    ) -> impl Future<Output = Result<MetricSnapshot, AdPilotError>> + Send;
}

/// Source of the 0–100 data-quality score used by the trust gate.
pub trait SignalHealthSource {
    fn score(&self, scope: &Targeting)
    -> impl Future<Output = Result<f64, AdPilotError>> + Send;
}

impl<T: MetricSource + Send + Sync> MetricSource for std::sync::Arc<T> {
    fn snapshot(
        &self,
        query: &MetricQuery,
    ) -> impl Future<Output = Result<MetricSnapshot, AdPilotError>> + Send {
        (**self).snapshot(query)
    }
}

impl<T: SignalHealthSource + Send + Sync> SignalHealthSource for std::sync::Arc<T> {
    fn score(
        &self,
        scope: &Targeting,
    ) -> impl Future<Output = Result<f64, AdPilotError>> + Send {
        (**self).score(scope)
    }
}
