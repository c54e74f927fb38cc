//! Trigger — when a rule gets evaluated.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a rule is scheduled for evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Evaluated on the cadence of the rule's [`Schedule`].
    Schedule,
    /// Evaluated on every scheduler tick.
    MetricThreshold,
    /// Evaluated when an external caller reports an event.
    Event,
    /// Evaluated only on explicit request.
    #[default]
    Manual,
}

/// Evaluation cadence of a schedule-triggered rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    #[serde(rename = "every_15_minutes")]
    Every15Minutes,
    #[default]
    Hourly,
    #[serde(rename = "every_6_hours")]
    Every6Hours,
    Daily,
}

impl ScheduleFrequency {
    #[must_use]
    pub fn interval(self) -> chrono::Duration {
        match self {
            Self::Every15Minutes => chrono::Duration::minutes(15),
            Self::Hourly => chrono::Duration::hours(1),
            Self::Every6Hours => chrono::Duration::hours(6),
            Self::Daily => chrono::Duration::days(1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub frequency: ScheduleFrequency,
}

impl Schedule {
    #[must_use]
    pub fn new(frequency: ScheduleFrequency) -> Self {
        Self { frequency }
    }
}

/// What caused a particular evaluation. Recorded on every execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Schedule,
    Metric,
    Event,
    Manual,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Metric => "metric",
            Self::Event => "event",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "schedule" => Ok(Self::Schedule),
            "metric" => Ok(Self::Metric),
            "event" => Ok(Self::Event),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown trigger source: {other}")),
        }
    }
}
