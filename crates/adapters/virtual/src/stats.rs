//! Raw campaign counters and the metrics derived from them.

use adpilot_domain::metric::MetricField;

/// Additive counters of one campaign over one period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CampaignStats {
    pub spend: f64,
    pub revenue: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    /// Unique users reached; drives `frequency`.
    pub reach: f64,
}

impl CampaignStats {
    #[must_use]
    pub fn new(spend: f64, revenue: f64, impressions: f64, clicks: f64, conversions: f64) -> Self {
        Self {
            spend,
            revenue,
            impressions,
            clicks,
            conversions,
            reach: impressions / 2.0,
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.spend += other.spend;
        self.revenue += other.revenue;
        self.impressions += other.impressions;
        self.clicks += other.clicks;
        self.conversions += other.conversions;
        self.reach += other.reach;
    }

    /// Sum counters across campaigns.
    pub fn total<'a>(stats: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut total = Self::default();
        for s in stats {
            total.accumulate(s);
        }
        total
    }

    /// Value of `field`, or `None` when a ratio has a zero denominator.
    ///
    /// `budget` is the summed daily budget of the campaigns, used for
    /// `budget_utilization`.
    #[must_use]
    pub fn value(&self, field: MetricField, budget: f64) -> Option<f64> {
        match field {
            MetricField::Spend => Some(self.spend),
            MetricField::Revenue => Some(self.revenue),
            MetricField::Impressions => Some(self.impressions),
            MetricField::Clicks => Some(self.clicks),
            MetricField::Conversions => Some(self.conversions),
            MetricField::Ctr => ratio(self.clicks, self.impressions).map(|r| r * 100.0),
            MetricField::Cpc => ratio(self.spend, self.clicks),
            MetricField::Cpm => ratio(self.spend, self.impressions).map(|r| r * 1000.0),
            MetricField::Cpa => ratio(self.spend, self.conversions),
            MetricField::Roas => ratio(self.revenue, self.spend),
            MetricField::ConversionRate => ratio(self.conversions, self.clicks).map(|r| r * 100.0),
            MetricField::Frequency => ratio(self.impressions, self.reach),
            MetricField::BudgetUtilization => ratio(self.spend, budget).map(|r| r * 100.0),
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator > 0.0).then(|| numerator / denominator)
}
