//! # Assessment Engine
//! End-to-end, side-effect-free pipeline:
//! raw maps -> normalize -> merge -> {legacy, true, verified} scores -> label
//! -> classifier diagnosis, plus the battery forecast over the supplied samples.
//!
//! Never fails for data-quality reasons; an unavailable classifier becomes an
//! `Unavailable` diagnosis.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

use crate::classify::{outcome_or_unavailable, DiagnosisOutcome, IssueClassifier};
use crate::config::EngineConfig;
use crate::device::{CanonicalDeviceInfo, RawFieldMap, SessionSnapshot};
use crate::forecast::{BatteryForecaster, ForecastResult};
use crate::merge::{merge, MergedDeviceInfo, Tagged};
use crate::normalize::FieldNormalizer;
use crate::rolling::BatterySample;
use crate::score::{
    compute_performance_score, compute_true_score_with, compute_verified_score_with, HealthLabel,
    LegacyScoreBreakdown, ScoreSettings, TrueScoreBreakdown, VerifiedScoreBreakdown,
};

/// Everything one assessment needs, in the shape clients post it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentInput {
    /// OCR fields from the screenshot flow.
    #[serde(default)]
    pub screenshot: RawFieldMap,
    /// Browser-reported fields.
    #[serde(default)]
    pub web: RawFieldMap,
    /// Live snapshot keys (`responsiveness`, `live`, network info).
    #[serde(default)]
    pub snapshot: RawFieldMap,
    #[serde(default)]
    pub battery_samples: Vec<BatterySample>,
}

impl AssessmentInput {
    /// Snapshot from the web map, overlaid by the explicit snapshot map.
    pub fn session_snapshot(&self) -> SessionSnapshot {
        let mut snap = SessionSnapshot::from_raw(&self.web);
        snap.absorb(SessionSnapshot::from_raw(&self.snapshot));
        snap
    }

    /// Raw merged map for the legacy score: web keys shadow screenshot keys.
    pub fn merged_raw(&self) -> RawFieldMap {
        let mut out = self.screenshot.clone();
        for (k, v) in &self.web {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

/// Collaborators and tunables for [`assess`].
#[derive(Debug, Clone, Default)]
pub struct EngineContext {
    pub normalizer: FieldNormalizer,
    pub score: ScoreSettings,
    pub forecaster: BatteryForecaster,
    pub classifier: IssueClassifier,
}

impl EngineContext {
    pub fn from_config(cfg: &EngineConfig, classifier: IssueClassifier) -> Self {
        Self {
            normalizer: FieldNormalizer::default(),
            score: cfg.score_settings(),
            forecaster: BatteryForecaster::new(cfg.forecast_settings()),
            classifier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAssessment {
    pub device: CanonicalDeviceInfo,
    pub merged: MergedDeviceInfo,
    /// Flat `field -> {value, source}` view of `merged`.
    pub provenance: BTreeMap<&'static str, Tagged<Value>>,
    pub legacy: LegacyScoreBreakdown,
    #[serde(rename = "true")]
    pub true_score: TrueScoreBreakdown,
    pub verified: VerifiedScoreBreakdown,
    /// Headline score (the verified composite).
    pub health_score: f64,
    pub health_label: HealthLabel,
    pub diagnosis: DiagnosisOutcome,
    pub forecast: ForecastResult,
}

pub fn assess(input: &AssessmentInput, ctx: &EngineContext) -> DeviceAssessment {
    let screenshot = ctx.normalizer.normalize(&input.screenshot);
    let web = ctx.normalizer.normalize(&input.web);
    let merged = merge(&screenshot, &web);
    let device = merged.values();
    let snapshot = input.session_snapshot();

    let legacy = compute_performance_score(&input.merged_raw());
    let true_score = compute_true_score_with(&device, &ctx.score);
    let verified = compute_verified_score_with(&device, Some(&snapshot), &ctx.score);
    let health_score = verified.verified_score;
    let health_label = HealthLabel::from_score(health_score);

    let diagnosis = outcome_or_unavailable(ctx.classifier.diagnose(&device, &snapshot));
    let forecast = ctx
        .forecaster
        .compute_prediction(&input.battery_samples, &snapshot);

    info!(
        target: "score",
        health_score,
        label = health_label.as_str(),
        missing = verified.has_missing_fields,
        forecast = forecast.status.as_str(),
        "assessment complete"
    );

    DeviceAssessment {
        provenance: merged.to_map(),
        device,
        merged,
        legacy,
        true_score,
        verified,
        health_score,
        health_label,
        diagnosis,
        forecast,
    }
}
