//! # Battery Forecaster
//! Short-term battery projection from a session's sample window.
//!
//! States:
//! - `charging_paused`: latest reading says the device is charging; the series
//!   is held flat at the current level.
//! - `insufficient_data`: no current level is known at all; empty series.
//! - `success`: a drain rate was fitted from the samples, or chosen from the
//!   responsiveness heuristic when the samples could not yield one.
//!
//! Every computed drain is clamped before extrapolation. Nothing here fails on
//! bad data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::device::SessionSnapshot;
use crate::rolling::BatterySample;

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Success,
    ChargingPaused,
    InsufficientData,
}

impl ForecastStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastStatus::Success => "success",
            ForecastStatus::ChargingPaused => "charging_paused",
            ForecastStatus::InsufficientData => "insufficient_data",
        }
    }
}

/// Forecast knobs. Defaults are the production values.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    /// Battery levels (percent) to report time-to for.
    pub thresholds: Vec<u32>,
    pub min_drain_per_min: f64,
    pub max_drain_per_min: f64,
    /// Fallback drain for responsiveness above 80.
    pub fallback_drain_fast: f64,
    /// Fallback drain for responsiveness 40–80, and when it is unknown.
    pub fallback_drain_mid: f64,
    /// Fallback drain for responsiveness below 40.
    pub fallback_drain_slow: f64,
    pub horizon_minutes: u32,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            thresholds: vec![20, 10, 5],
            min_drain_per_min: 0.05,
            max_drain_per_min: 5.0,
            fallback_drain_fast: 0.4,
            fallback_drain_mid: 0.6,
            fallback_drain_slow: 1.0,
            horizon_minutes: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub status: ForecastStatus,
    /// Clamped drain in %/min that the series was built from.
    pub drain_per_min: Option<f64>,
    pub used_fallback: bool,
    pub charging_paused: bool,
    pub current_battery: Option<f64>,
    /// One entry per minute from now to the horizon inclusive (181 by
    /// default). Empty when no current level is known: always for
    /// `insufficient_data`, and for `charging_paused` without a level.
    pub battery_prediction: Vec<f64>,
    /// Threshold percent -> minutes until reached, `None` if already below
    /// it or beyond the horizon.
    pub predicted_time_to: BTreeMap<u32, Option<f64>>,
    pub minutes_per_percent: Option<f64>,
    pub samples_count: usize,
    pub valid_sample_count: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatteryForecaster {
    settings: ForecastSettings,
}

impl BatteryForecaster {
    pub fn new(settings: ForecastSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Forecast from `samples` (any order) and the session's live snapshot.
    pub fn compute_prediction(
        &self,
        samples: &[BatterySample],
        snapshot: &SessionSnapshot,
    ) -> ForecastResult {
        let result = self.forecast(samples, snapshot);
        crate::metrics::record_forecast(result.status.as_str(), result.used_fallback);
        debug!(
            target: "forecast",
            status = result.status.as_str(),
            drain = ?result.drain_per_min,
            used_fallback = result.used_fallback,
            samples = result.samples_count,
            valid = result.valid_sample_count,
            "forecast computed"
        );
        result
    }

    fn forecast(&self, samples: &[BatterySample], snapshot: &SessionSnapshot) -> ForecastResult {
        let latest = samples.iter().max_by_key(|s| s.ts);
        let valid = valid_samples(samples);

        let charging = match snapshot.live {
            Some(live) => live.charging,
            None => latest.is_some_and(|s| s.charging),
        };
        let current = snapshot
            .live
            .map(|l| l.level)
            .or_else(|| latest.filter(|s| s.is_valid_level()).map(|s| s.pct))
            .or_else(|| valid.last().map(|s| s.pct));

        let mut result = ForecastResult {
            status: ForecastStatus::Success,
            drain_per_min: None,
            used_fallback: false,
            charging_paused: false,
            current_battery: current,
            battery_prediction: Vec::new(),
            predicted_time_to: self.settings.thresholds.iter().map(|t| (*t, None)).collect(),
            minutes_per_percent: None,
            samples_count: samples.len(),
            valid_sample_count: valid.len(),
            message: String::new(),
        };

        if charging {
            result.status = ForecastStatus::ChargingPaused;
            result.charging_paused = true;
            if let Some(level) = current {
                result.battery_prediction = vec![round2(level); self.points()];
            }
            result.message = "Device is charging; drain forecast is paused.".to_string();
            return result;
        }

        let Some(current) = current else {
            result.status = ForecastStatus::InsufficientData;
            result.message = "No battery level known yet.".to_string();
            return result;
        };

        let (drain, used_fallback) = match fitted_drain(&valid) {
            Some(d) => (d, false),
            None => (self.fallback_drain(snapshot.responsiveness_index), true),
        };
        let drain = drain.clamp(self.settings.min_drain_per_min, self.settings.max_drain_per_min);

        result.drain_per_min = Some(drain);
        result.used_fallback = used_fallback;
        result.minutes_per_percent = Some(1.0 / drain);
        result.battery_prediction = (0..self.points())
            .map(|t| round2((current - drain * t as f64).clamp(0.0, 100.0)))
            .collect();

        let horizon = f64::from(self.settings.horizon_minutes);
        for (threshold, slot) in result.predicted_time_to.iter_mut() {
            let th = f64::from(*threshold);
            if current > th {
                let minutes = (current - th) / drain;
                *slot = (minutes <= horizon).then(|| round2(minutes));
            }
        }

        result.message = if used_fallback {
            format!("Estimated {drain:.2}%/min from device responsiveness; not enough drain history yet.")
        } else {
            format!("Measured {drain:.2}%/min over {} samples.", valid.len())
        };
        result
    }

    /// Heuristic drain by responsiveness index.
    pub fn fallback_drain(&self, responsiveness: Option<f64>) -> f64 {
        match responsiveness {
            Some(idx) if idx > 80.0 => self.settings.fallback_drain_fast,
            Some(idx) if idx < 40.0 => self.settings.fallback_drain_slow,
            _ => self.settings.fallback_drain_mid,
        }
    }

    fn points(&self) -> usize {
        self.settings.horizon_minutes as usize + 1
    }
}

/// Forecast with the default settings.
pub fn compute_prediction(samples: &[BatterySample], snapshot: &SessionSnapshot) -> ForecastResult {
    BatteryForecaster::default().compute_prediction(samples, snapshot)
}

/// Discharging samples with a sane level, time-ordered, one per timestamp
/// (the later arrival wins).
fn valid_samples(samples: &[BatterySample]) -> Vec<BatterySample> {
    let mut out: Vec<BatterySample> = samples
        .iter()
        .filter(|s| !s.charging && s.is_valid_level())
        .copied()
        .collect();
    out.sort_by_key(|s| s.ts);
    let mut dedup: Vec<BatterySample> = Vec::with_capacity(out.len());
    for s in out {
        match dedup.last_mut() {
            Some(prev) if prev.ts == s.ts => *prev = s,
            _ => dedup.push(s),
        }
    }
    dedup
}

/// Least-squares drain in %/min; `None` unless the fit says the battery is
/// actually going down.
fn fitted_drain(valid: &[BatterySample]) -> Option<f64> {
    let (first, last) = (valid.first()?, valid.last()?);
    if valid.len() < 2 || last.ts <= first.ts {
        return None;
    }
    let n = valid.len() as f64;
    let xs: Vec<f64> = valid
        .iter()
        .map(|s| (s.ts - first.ts) as f64 / MS_PER_MINUTE)
        .collect();
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = valid.iter().map(|s| s.pct).sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, s) in xs.iter().zip(valid) {
        sxy += (x - mean_x) * (s.pct - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx <= 0.0 {
        return None;
    }
    let drain = -sxy / sxx;
    (drain.is_finite() && drain > 0.0).then_some(drain)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
