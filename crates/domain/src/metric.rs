//! Metric catalog — the closed set of campaign metrics a condition may read,
//! comparison windows, and the snapshot values the evaluator consumes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::rule::Targeting;

/// Declared type of a metric's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Plain count or ratio (impressions, ROAS, frequency…).
    Number,
    /// Percentage expressed on a 0–100 scale.
    Percentage,
    /// Monetary amount in the account currency.
    Currency,
}

impl ValueType {
    /// Check an absolute comparison threshold against this value type.
    ///
    /// # Errors
    ///
    /// Returns a short reason when the threshold cannot be a value of this type.
    pub fn check_absolute(self, value: f64) -> Result<(), &'static str> {
        match self {
            Self::Percentage if !(0.0..=100.0).contains(&value) => {
                Err("percentages must be between 0 and 100")
            }
            Self::Currency if value < 0.0 => Err("currency amounts cannot be negative"),
            Self::Number if value < 0.0 => Err("metric values cannot be negative"),
            _ => Ok(()),
        }
    }

    /// Check a delta threshold (`change_gt` / `change_lt`) against this value type.
    ///
    /// # Errors
    ///
    /// Returns a short reason when the delta can never be reached.
    pub fn check_delta(self, delta: f64) -> Result<(), &'static str> {
        match self {
            Self::Percentage if !(-100.0..=100.0).contains(&delta) => {
                Err("percentage changes must be between -100 and 100")
            }
            _ => Ok(()),
        }
    }
}

/// A metric identifier from the closed catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    Spend,
    Revenue,
    Impressions,
    Clicks,
    Conversions,
    Ctr,
    Cpc,
    Cpm,
    Cpa,
    Roas,
    ConversionRate,
    Frequency,
    BudgetUtilization,
}

impl MetricField {
    /// Every field in catalog order.
    pub const ALL: [Self; 13] = [
        Self::Spend,
        Self::Revenue,
        Self::Impressions,
        Self::Clicks,
        Self::Conversions,
        Self::Ctr,
        Self::Cpc,
        Self::Cpm,
        Self::Cpa,
        Self::Roas,
        Self::ConversionRate,
        Self::Frequency,
        Self::BudgetUtilization,
    ];

    #[must_use]
    pub fn value_type(self) -> ValueType {
        match self {
            Self::Spend | Self::Revenue | Self::Cpc | Self::Cpm | Self::Cpa => ValueType::Currency,
            Self::Ctr | Self::ConversionRate | Self::BudgetUtilization => ValueType::Percentage,
            Self::Impressions | Self::Clicks | Self::Conversions | Self::Roas | Self::Frequency => {
                ValueType::Number
            }
        }
    }

    /// Wire name, identical to the serde representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spend => "spend",
            Self::Revenue => "revenue",
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::Conversions => "conversions",
            Self::Ctr => "ctr",
            Self::Cpc => "cpc",
            Self::Cpm => "cpm",
            Self::Cpa => "cpa",
            Self::Roas => "roas",
            Self::ConversionRate => "conversion_rate",
            Self::Frequency => "frequency",
            Self::BudgetUtilization => "budget_utilization",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Spend => "Spend",
            Self::Revenue => "Revenue",
            Self::Impressions => "Impressions",
            Self::Clicks => "Clicks",
            Self::Conversions => "Conversions",
            Self::Ctr => "CTR",
            Self::Cpc => "CPC",
            Self::Cpm => "CPM",
            Self::Cpa => "CPA",
            Self::Roas => "ROAS",
            Self::ConversionRate => "Conversion rate",
            Self::Frequency => "Frequency",
            Self::BudgetUtilization => "Budget utilization",
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of a [`Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl WindowUnit {
    fn suffix(self) -> char {
        match self {
            Self::Minutes => 'm',
            Self::Hours => 'h',
            Self::Days => 'd',
            Self::Weeks => 'w',
        }
    }
}

/// Aggregation or comparison window such as `"24h"` or `"7d"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Window {
    amount: u32,
    unit: WindowUnit,
}

impl Window {
    /// Build a window; returns `None` when `amount` is zero.
    #[must_use]
    pub fn new(amount: u32, unit: WindowUnit) -> Option<Self> {
        (amount > 0).then_some(Self { amount, unit })
    }

    #[must_use]
    pub fn hours(amount: u32) -> Self {
        Self {
            amount: amount.max(1),
            unit: WindowUnit::Hours,
        }
    }

    #[must_use]
    pub fn days(amount: u32) -> Self {
        Self {
            amount: amount.max(1),
            unit: WindowUnit::Days,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

impl FromStr for Window {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidWindow(s.to_string());
        let trimmed = s.trim();
        let split = trimmed.len().checked_sub(1).ok_or_else(invalid)?;
        if !trimmed.is_char_boundary(split) {
            return Err(invalid());
        }
        let (digits, suffix) = trimmed.split_at(split);
        let unit = match suffix {
            "m" => WindowUnit::Minutes,
            "h" => WindowUnit::Hours,
            "d" => WindowUnit::Days,
            "w" => WindowUnit::Weeks,
            _ => return Err(invalid()),
        };
        let amount: u32 = digits.parse().map_err(|_| invalid())?;
        Self::new(amount, unit).ok_or_else(invalid)
    }
}

impl TryFrom<String> for Window {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Window> for String {
    fn from(value: Window) -> Self {
        value.to_string()
    }
}

/// Identifies one value a condition needs: a field, optionally aggregated
/// over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricKey {
    pub field: MetricField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
}

/// Identifies a baseline: the value of `field` as it was `window` ago.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaselineKey {
    pub field: MetricField,
    pub window: Window,
}

/// A current metric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    #[serde(flatten)]
    pub key: MetricKey,
    pub value: f64,
}

/// A historical metric value used by delta operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineReading {
    #[serde(flatten)]
    pub key: BaselineKey,
    pub value: f64,
}

/// Metric values for one scope, as returned by the metric source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(default)]
    pub readings: Vec<MetricReading>,
    #[serde(default)]
    pub baselines: Vec<BaselineReading>,
}

impl MetricSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the un-windowed current value of `field`.
    #[must_use]
    pub fn with_value(self, field: MetricField, value: f64) -> Self {
        self.with_reading(MetricKey { field, window: None }, value)
    }

    /// Set the current value of `field` aggregated over `window`.
    #[must_use]
    pub fn with_windowed_value(self, field: MetricField, window: Window, value: f64) -> Self {
        self.with_reading(
            MetricKey {
                field,
                window: Some(window),
            },
            value,
        )
    }

    /// Set the value of `field` as it was `window` ago.
    #[must_use]
    pub fn with_baseline(mut self, field: MetricField, window: Window, value: f64) -> Self {
        let key = BaselineKey { field, window };
        self.baselines.retain(|b| b.key != key);
        self.baselines.push(BaselineReading { key, value });
        self
    }

    #[must_use]
    pub fn with_reading(mut self, key: MetricKey, value: f64) -> Self {
        self.readings.retain(|r| r.key != key);
        self.readings.push(MetricReading { key, value });
        self
    }

    /// Look up a current value.
    #[must_use]
    pub fn current(&self, key: MetricKey) -> Option<f64> {
        self.readings
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.value)
    }

    /// Look up a baseline value.
    #[must_use]
    pub fn baseline(&self, key: BaselineKey) -> Option<f64> {
        self.baselines
            .iter()
            .find(|b| b.key == key)
            .map(|b| b.value)
    }
}

/// What the engine asks a metric source for: a scope and the exact set of
/// readings and baselines a rule's expression needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub scope: Targeting,
    pub readings: Vec<MetricKey>,
    pub baselines: Vec<BaselineKey>,
}
