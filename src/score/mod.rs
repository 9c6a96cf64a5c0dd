//! # Score Engine
//! Component sub-scores and the fixed-weight composite shared by the three
//! scoring strategies:
//!
//! - [`legacy`]: display score computed straight from a raw merged map.
//! - [`confirmed`]: the "true" score over confirmed OCR fields.
//! - [`verified`]: the strict variant that marks every default it had to use.
//!
//! All functions here are pure. Every sub-score and composite is in `[0, 100]`.

pub mod confirmed;
pub mod curves;
pub mod legacy;
pub mod verified;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use self::curves::clamp_score;

pub use confirmed::{compute_true_score, compute_true_score_with, TrueScoreBreakdown};
pub use legacy::{compute_performance_score, LegacyScoreBreakdown};
pub use verified::{compute_verified_score, compute_verified_score_with, VerifiedScoreBreakdown};

/// Score used for any component whose input is unknown.
pub const DEFAULT_COMPONENT_SCORE: f64 = 50.0;

/// One sub-score with the inputs it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub score: f64,
    pub explanation: String,
    #[serde(default)]
    pub raw: Value,
    /// A heuristic or reduced-confidence input was used.
    #[serde(default)]
    pub uses_fallback: bool,
    /// No usable input at all; `score` is [`DEFAULT_COMPONENT_SCORE`].
    #[serde(default)]
    pub defaulted: bool,
}

impl ScoreComponent {
    pub fn measured(score: f64, explanation: impl Into<String>, raw: Value) -> Self {
        Self {
            score: clamp_score(score),
            explanation: explanation.into(),
            raw,
            uses_fallback: false,
            defaulted: false,
        }
    }

    /// The neutral default for an unknown input.
    pub fn unknown(explanation: impl Into<String>) -> Self {
        Self {
            score: DEFAULT_COMPONENT_SCORE,
            explanation: explanation.into(),
            raw: Value::Null,
            uses_fallback: true,
            defaulted: true,
        }
    }

    pub fn with_fallback(mut self) -> Self {
        self.uses_fallback = true;
        self
    }
}

/// Tunables the canonical-record strategies read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSettings {
    /// Battery capacity at which the capacity curve stops penalising.
    pub battery_reference_mah: u32,
    /// Devices with at most this much total storage get the low-capacity penalty.
    pub low_capacity_storage_gb: f64,
}

impl Default for ScoreSettings {
    fn default() -> Self {
        Self {
            battery_reference_mah: 4000,
            low_capacity_storage_gb: 32.0,
        }
    }
}

/// Composite weights, in battery/storage/responsiveness/os order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub battery: f64,
    pub storage: f64,
    pub responsiveness: f64,
    pub os: f64,
}

/// The fixed health-score weighting contract.
pub const COMPOSITE_WEIGHTS: Weights = Weights {
    battery: 0.30,
    storage: 0.30,
    responsiveness: 0.20,
    os: 0.20,
};

/// Weighted sum of four sub-scores, rounded and clamped to `[0, 100]`.
pub fn composite(weights: &Weights, battery: f64, storage: f64, responsiveness: f64, os: f64) -> f64 {
    let sum = weights.battery * clamp_score(battery)
        + weights.storage * clamp_score(storage)
        + weights.responsiveness * clamp_score(responsiveness)
        + weights.os * clamp_score(os);
    clamp_score(sum.round())
}

/// The four components every strategy produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Components {
    pub battery: ScoreComponent,
    pub storage: ScoreComponent,
    pub responsiveness: ScoreComponent,
    pub os: ScoreComponent,
}

impl Components {
    pub fn composite(&self) -> f64 {
        composite(
            &COMPOSITE_WEIGHTS,
            self.battery.score,
            self.storage.score,
            self.responsiveness.score,
            self.os.score,
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreComponent> {
        [&self.battery, &self.storage, &self.responsiveness, &self.os].into_iter()
    }

    pub fn any_defaulted(&self) -> bool {
        self.iter().any(|c| c.defaulted)
    }

    pub fn fallback_count(&self) -> usize {
        self.iter().filter(|c| c.uses_fallback).count()
    }

    /// Composite plus the usual bookkeeping (metrics, debug log).
    pub(crate) fn finish(&self, variant: &'static str) -> f64 {
        let score = self.composite();
        let fallbacks = self.fallback_count();
        crate::metrics::record_score(variant, fallbacks);
        debug!(
            target: "score",
            variant,
            score,
            battery = self.battery.score,
            storage = self.storage.score,
            responsiveness = self.responsiveness.score,
            os = self.os.score,
            fallbacks,
            "score computed"
        );
        score
    }
}

/// Qualitative health band for a 0–100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLabel {
    Good,
    Fair,
    Poor,
}

impl HealthLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            HealthLabel::Good
        } else if score >= 50.0 {
            HealthLabel::Fair
        } else {
            HealthLabel::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthLabel::Good => "Good",
            HealthLabel::Fair => "Fair",
            HealthLabel::Poor => "Poor",
        }
    }
}
