//! # adpilot-adapter-virtual
//!
//! Virtual advertising platform that serves simulated campaigns for
//! demonstration and testing.
//!
//! ## Provided ports
//!
//! | Port | Behaviour |
//! |------|-----------|
//! | `MetricSource` | Aggregates the counters of every campaign in scope; baselines come from the previous period |
//! | `SignalHealthSource` | Weakest signal health among campaigns in scope |
//! | `ActionBackend` | Mutates budgets, bids, status and labels; records alerts; simulate mode only describes |
//!
//! The simulator keeps a single current and previous period per campaign, so
//! every window resolves to the same counters.
//!
//! ## Dependency rule
//!
//! Depends on `adpilot-app` (port traits) and `adpilot-domain` only.

mod campaign;
mod stats;

pub use campaign::{CampaignStatus, VirtualCampaign};
pub use stats::CampaignStats;

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use adpilot_app::ports::{
    ActionBackend, ActionMode, ActionOutcome, ActionRequest, MetricSource, SignalHealthSource,
};
use adpilot_domain::error::{ActionError, AdPilotError};
use adpilot_domain::id::{CampaignId, ExecutionId};
use adpilot_domain::metric::{MetricQuery, MetricSnapshot};
use adpilot_domain::rule::{ActionConfig, ActionType, AlertChannel, CampaignType, Platform, Targeting};

/// An alert delivered by a `send_alert` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentAlert {
    pub execution_id: ExecutionId,
    pub channel: AlertChannel,
    pub message: String,
    pub recipients: Vec<String>,
}

type CallKey = (ExecutionId, Option<CampaignId>, ActionType);

/// Most recent live calls, remembered so a repeated call with the same
/// execution id is not applied twice. Oldest keys are forgotten first.
struct AppliedCalls {
    keys: HashSet<CallKey>,
    order: VecDeque<CallKey>,
    capacity: usize,
}

impl AppliedCalls {
    const DEFAULT_CAPACITY: usize = 4096;

    fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn contains(&self, key: &CallKey) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: CallKey) {
        if !self.keys.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
    }
}

impl Default for AppliedCalls {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

#[derive(Default)]
struct State {
    campaigns: BTreeMap<CampaignId, VirtualCampaign>,
    alerts: Vec<SentAlert>,
    applied: AppliedCalls,
}

/// Simulated advertising platform.
#[derive(Default)]
pub struct VirtualPlatform {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl VirtualPlatform {
    #[must_use]
    pub fn new(campaigns: impl IntoIterator<Item = VirtualCampaign>) -> Self {
        Self {
            state: Mutex::new(State {
                campaigns: campaigns.into_iter().map(|c| (c.id.clone(), c)).collect(),
                ..State::default()
            }),
            latency: None,
        }
    }

    /// A handful of campaigns across platforms with varied performance.
    #[must_use]
    pub fn demo() -> Self {
        Self::new([
            VirtualCampaign::new("gads-search-brand", Platform::GoogleAds, CampaignType::Search)
                .with_budget(150.0, 1.2)
                .with_stats(
                    CampaignStats::new(140.0, 910.0, 12_000.0, 600.0, 30.0),
                    CampaignStats::new(120.0, 700.0, 11_000.0, 520.0, 25.0),
                ),
            VirtualCampaign::new("gads-pmax-catalog", Platform::GoogleAds, CampaignType::PerformanceMax)
                .with_budget(300.0, 0.8)
                .with_stats(
                    CampaignStats::new(290.0, 350.0, 60_000.0, 900.0, 9.0),
                    CampaignStats::new(180.0, 420.0, 45_000.0, 800.0, 11.0),
                ),
            VirtualCampaign::new("meta-social-retarget", Platform::Meta, CampaignType::Social)
                .with_budget(80.0, 0.6)
                .with_stats(
                    CampaignStats::new(75.0, 95.0, 40_000.0, 160.0, 2.0),
                    CampaignStats::new(70.0, 160.0, 38_000.0, 300.0, 5.0),
                )
                .with_signal_health(62.0),
            VirtualCampaign::new("tiktok-video-launch", Platform::Tiktok, CampaignType::Video)
                .with_budget(50.0, 0.4)
                .with_stats(
                    CampaignStats::new(20.0, 0.0, 25_000.0, 90.0, 0.0),
                    CampaignStats::new(10.0, 0.0, 12_000.0, 40.0, 0.0),
                )
                .with_signal_health(35.0),
        ])
    }

    /// Delay every action call, to exercise executor timeouts.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn campaign(&self, id: &CampaignId) -> Option<VirtualCampaign> {
        self.lock().campaigns.get(id).cloned()
    }

    /// Every alert sent so far, oldest first.
    #[must_use]
    pub fn alerts(&self) -> Vec<SentAlert> {
        self.lock().alerts.clone()
    }

    pub fn set_stats(&self, id: &CampaignId, current: CampaignStats) {
        if let Some(campaign) = self.lock().campaigns.get_mut(id) {
            campaign.current = current;
        }
    }

    pub fn set_signal_health(&self, id: &CampaignId, score: f64) {
        if let Some(campaign) = self.lock().campaigns.get_mut(id) {
            campaign.signal_health = score;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, query: &MetricQuery) -> MetricSnapshot {
        let (budget, current, previous) = {
            let state = self.lock();
            let in_scope: Vec<_> = state
                .campaigns
                .values()
                .filter(|c| c.matches(&query.scope))
                .collect();
            (
                in_scope.iter().map(|c| c.daily_budget).sum::<f64>(),
                CampaignStats::total(in_scope.iter().map(|c| &c.current)),
                CampaignStats::total(in_scope.iter().map(|c| &c.previous)),
            )
        };

        let mut snapshot = MetricSnapshot::new();
        if budget <= 0.0 && current == CampaignStats::default() {
            return snapshot;
        }
        for key in &query.readings {
            if let Some(value) = current.value(key.field, budget) {
                snapshot = snapshot.with_reading(*key, value);
            }
        }
        for key in &query.baselines {
            if let Some(value) = previous.value(key.field, budget) {
                snapshot = snapshot.with_baseline(key.field, key.window, value);
            }
        }
        snapshot
    }

    fn apply_now(&self, request: &ActionRequest) -> Result<ActionOutcome, ActionError> {
        let mut state = self.lock();
        let action_type = request.config.action_type();
        let key = (request.execution_id, request.campaign.clone(), action_type);
        if request.mode == ActionMode::Live && state.applied.contains(&key) {
            return Ok(ActionOutcome {
                detail: format!("{action_type} already applied for this execution"),
            });
        }

        let targets: Vec<CampaignId> = match &request.campaign {
            Some(id) if state.campaigns.contains_key(id) => vec![id.clone()],
            Some(id) => return Err(ActionError::Rejected(format!("unknown campaign {id}"))),
            None => state
                .campaigns
                .values()
                .filter(|c| c.matches(&request.scope))
                .map(|c| c.id.clone())
                .collect(),
        };

        let detail = if let ActionConfig::SendAlert {
            channel,
            message,
            recipients,
        } = &request.config
        {
            match request.mode {
                ActionMode::Simulate => format!("would send {channel:?} alert: {message}"),
                ActionMode::Live => {
                    state.alerts.push(SentAlert {
                        execution_id: request.execution_id,
                        channel: *channel,
                        message: message.clone(),
                        recipients: recipients.clone(),
                    });
                    format!("{channel:?} alert sent")
                }
            }
        } else {
            if targets.is_empty() {
                return Err(ActionError::Rejected(
                    "no campaign matches the rule's targeting".to_string(),
                ));
            }
            let mut changes = Vec::with_capacity(targets.len());
            for id in &targets {
                let Some(campaign) = state.campaigns.get_mut(id) else {
                    continue;
                };
                let change = match request.mode {
                    ActionMode::Live => campaign.apply(&request.config),
                    ActionMode::Simulate => {
                        format!("would apply: {}", campaign.clone().apply(&request.config))
                    }
                };
                changes.push(format!("{id}: {change}"));
            }
            changes.join("; ")
        };

        if request.mode == ActionMode::Live {
            state.applied.insert(key);
            tracing::info!(%action_type, %detail, "virtual action applied");
        }
        Ok(ActionOutcome { detail })
    }
}

impl MetricSource for VirtualPlatform {
    async fn snapshot(&self, query: &MetricQuery) -> Result<MetricSnapshot, AdPilotError> {
        Ok(self.snapshot_of(query))
    }
}

impl SignalHealthSource for VirtualPlatform {
    async fn score(&self, scope: &Targeting) -> Result<f64, AdPilotError> {
        let state = self.lock();
        let weakest = state
            .campaigns
            .values()
            .filter(|c| c.matches(scope))
            .map(|c| c.signal_health)
            .reduce(f64::min);
        Ok(weakest.unwrap_or(100.0))
    }
}

impl ActionBackend for VirtualPlatform {
    async fn apply(&self, request: &ActionRequest) -> Result<ActionOutcome, ActionError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.apply_now(request)
    }
}
