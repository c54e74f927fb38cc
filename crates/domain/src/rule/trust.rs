//! Trust gate — holds or blocks automation when signal quality is too low.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Per-rule trust gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustGateConfig {
    pub enabled: bool,
    /// Healthy threshold on the 0–100 signal health scale.
    pub min_signal_health: f64,
    /// Queue actions for manual approval instead of applying them.
    pub require_approval: bool,
    /// Simulate action batches until the rule has a successful execution.
    pub dry_run_first: bool,
}

impl Default for TrustGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_signal_health: TrustSettings::DEFAULT_MIN_SIGNAL_HEALTH,
            require_approval: false,
            dry_run_first: false,
        }
    }
}

impl TrustGateConfig {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidSignalHealth`] when the threshold is
    /// outside 0–100.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_score(self.min_signal_health)
    }
}

/// Account-level trust configuration, read but never mutated by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustSettings {
    min_signal_health: f64,
    degraded_threshold: f64,
}

impl TrustSettings {
    pub const DEFAULT_MIN_SIGNAL_HEALTH: f64 = 70.0;
    pub const DEFAULT_DEGRADED_THRESHOLD: f64 = 40.0;

    /// # Errors
    ///
    /// Fails when either bound is outside 0–100 or `degraded > healthy`.
    pub fn new(min_signal_health: f64, degraded_threshold: f64) -> Result<Self, ValidationError> {
        check_score(min_signal_health)?;
        check_score(degraded_threshold)?;
        if degraded_threshold > min_signal_health {
            return Err(ValidationError::InvalidTrustThresholds {
                degraded: degraded_threshold,
                healthy: min_signal_health,
            });
        }
        Ok(Self {
            min_signal_health,
            degraded_threshold,
        })
    }

    /// Healthy threshold given to new rules.
    #[must_use]
    pub fn min_signal_health(&self) -> f64 {
        self.min_signal_health
    }

    /// Below this score the gate blocks instead of holding.
    #[must_use]
    pub fn degraded_threshold(&self) -> f64 {
        self.degraded_threshold
    }
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            min_signal_health: Self::DEFAULT_MIN_SIGNAL_HEALTH,
            degraded_threshold: Self::DEFAULT_DEGRADED_THRESHOLD,
        }
    }
}

fn check_score(score: f64) -> Result<(), ValidationError> {
    if score.is_finite() && (0.0..=100.0).contains(&score) {
        Ok(())
    } else {
        Err(ValidationError::InvalidSignalHealth(score))
    }
}

/// Outcome of the trust gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustDecision {
    Pass,
    /// Signal degraded: alert, do not execute.
    Hold,
    /// Signal unusable: do not execute, manual intervention required.
    Block,
}

impl fmt::Display for TrustDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "pass",
            Self::Hold => "hold",
            Self::Block => "block",
        })
    }
}

/// Classify a signal health score.
///
/// The rule's `min_signal_health` is the healthy bound; the account's
/// degraded threshold is the lower bound, capped at the healthy bound so
/// a strict rule never widens the block band. A non-finite score blocks.
#[must_use]
pub fn classify(score: f64, config: &TrustGateConfig, settings: &TrustSettings) -> TrustDecision {
    if !config.enabled {
        return TrustDecision::Pass;
    }
    if score.is_nan() {
        return TrustDecision::Block;
    }
    let healthy = config.min_signal_health;
    let degraded = settings.degraded_threshold.min(healthy);
    if score >= healthy {
        TrustDecision::Pass
    } else if score >= degraded {
        TrustDecision::Hold
    } else {
        TrustDecision::Block
    }
}
