//! Virtual campaign — the mutable state actions operate on.

use std::collections::BTreeSet;

use adpilot_domain::id::CampaignId;
use adpilot_domain::rule::{ActionConfig, CampaignType, Platform, Targeting};

use crate::stats::CampaignStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    Enabled,
    Paused,
}

/// A simulated campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualCampaign {
    pub id: CampaignId,
    pub platform: Platform,
    pub campaign_type: CampaignType,
    pub status: CampaignStatus,
    pub daily_budget: f64,
    pub bid: f64,
    pub labels: BTreeSet<String>,
    /// Counters of the current period.
    pub current: CampaignStats,
    /// Counters of the previous period, served as baselines.
    pub previous: CampaignStats,
    /// Data-quality score in 0–100.
    pub signal_health: f64,
}

impl VirtualCampaign {
    #[must_use]
    pub fn new(id: impl Into<CampaignId>, platform: Platform, campaign_type: CampaignType) -> Self {
        Self {
            id: id.into(),
            platform,
            campaign_type,
            status: CampaignStatus::Enabled,
            daily_budget: 100.0,
            bid: 1.0,
            labels: BTreeSet::new(),
            current: CampaignStats::default(),
            previous: CampaignStats::default(),
            signal_health: 100.0,
        }
    }

    #[must_use]
    pub fn with_budget(mut self, daily_budget: f64, bid: f64) -> Self {
        self.daily_budget = daily_budget;
        self.bid = bid;
        self
    }

    #[must_use]
    pub fn with_stats(mut self, current: CampaignStats, previous: CampaignStats) -> Self {
        self.current = current;
        self.previous = previous;
        self
    }

    #[must_use]
    pub fn with_signal_health(mut self, score: f64) -> Self {
        self.signal_health = score;
        self
    }

    #[must_use]
    pub fn matches(&self, scope: &Targeting) -> bool {
        scope.matches(self.platform, self.campaign_type, &self.id)
    }

    /// Apply a mutating action and describe the change.
    ///
    /// `SendAlert` is not a campaign change and is handled by the platform.
    pub fn apply(&mut self, config: &ActionConfig) -> String {
        match config {
            ActionConfig::IncreaseBudget {
                percent,
                max_budget,
            } => {
                let target = cap(self.daily_budget * (1.0 + percent / 100.0), *max_budget);
                change("budget", &mut self.daily_budget, target)
            }
            ActionConfig::DecreaseBudget {
                percent,
                min_budget,
            } => {
                let target = floor(self.daily_budget * (1.0 - percent / 100.0), *min_budget);
                change("budget", &mut self.daily_budget, target)
            }
            ActionConfig::SetBudget { amount } => change("budget", &mut self.daily_budget, *amount),
            ActionConfig::IncreaseBid { percent, max_bid } => {
                let target = cap(self.bid * (1.0 + percent / 100.0), *max_bid);
                change("bid", &mut self.bid, target)
            }
            ActionConfig::DecreaseBid { percent, min_bid } => {
                let target = floor(self.bid * (1.0 - percent / 100.0), *min_bid);
                change("bid", &mut self.bid, target)
            }
            ActionConfig::SetBid { amount } => change("bid", &mut self.bid, *amount),
            ActionConfig::PauseCampaign => self.set_status(CampaignStatus::Paused),
            ActionConfig::EnableCampaign => self.set_status(CampaignStatus::Enabled),
            ActionConfig::AddLabel { label } => {
                if self.labels.insert(label.clone()) {
                    format!("label {label:?} added")
                } else {
                    format!("label {label:?} already present")
                }
            }
            ActionConfig::SendAlert { .. } => String::from("no campaign change"),
        }
    }

    fn set_status(&mut self, status: CampaignStatus) -> String {
        let verb = match status {
            CampaignStatus::Enabled => "enabled",
            CampaignStatus::Paused => "paused",
        };
        if self.status == status {
            format!("already {verb}")
        } else {
            self.status = status;
            verb.to_string()
        }
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn cap(value: f64, max: Option<f64>) -> f64 {
    max.map_or(value, |max| value.min(max))
}

fn floor(value: f64, min: Option<f64>) -> f64 {
    min.map_or(value, |min| value.max(min))
}

fn change(what: &str, slot: &mut f64, target: f64) -> String {
    let from = *slot;
    *slot = round_cents(target);
    format!("{what} {from:.2} -> {:.2}", *slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign() -> VirtualCampaign {
        VirtualCampaign::new("c-1", Platform::GoogleAds, CampaignType::Search).with_budget(100.0, 2.0)
    }

    #[test]
    fn should_cap_budget_increase_at_max_budget() {
        let mut c = campaign();
        let detail = c.apply(&ActionConfig::IncreaseBudget {
            percent: 50.0,
            max_budget: Some(120.0),
        });
        assert_eq!(c.daily_budget, 120.0);
        assert_eq!(detail, "budget 100.00 -> 120.00");
    }

    #[test]
    fn should_floor_bid_decrease_at_min_bid() {
        let mut c = campaign();
        c.apply(&ActionConfig::DecreaseBid {
            percent: 90.0,
            min_bid: Some(0.5),
        });
        assert_eq!(c.bid, 0.5);
    }

    #[test]
    fn should_report_no_change_when_already_paused() {
        let mut c = campaign();
        assert_eq!(c.apply(&ActionConfig::PauseCampaign), "paused");
        assert_eq!(c.apply(&ActionConfig::PauseCampaign), "already paused");
        assert_eq!(c.status, CampaignStatus::Paused);
    }

    #[test]
    fn should_add_label_once() {
        let mut c = campaign();
        let label = ActionConfig::AddLabel {
            label: "scaled".into(),
        };
        c.apply(&label);
        c.apply(&label);
        assert_eq!(c.labels.len(), 1);
    }
}
