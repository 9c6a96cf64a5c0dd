//! # Metrics
//! Counter names, one-time descriptions and the Prometheus recorder bootstrap.
//!
//! The library only emits through the `metrics` facade; without an installed
//! recorder every call is a no-op.

use anyhow::Context;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const SCORES_COMPUTED: &str = "scores_computed_total";
pub const SCORE_FALLBACK_COMPONENTS: &str = "score_fallback_components_total";
pub const FORECASTS: &str = "forecasts_total";
pub const FORECAST_FALLBACK: &str = "forecast_fallback_total";
pub const BATTERY_SAMPLES: &str = "battery_samples_total";
pub const SESSIONS_EXPIRED: &str = "sessions_expired_total";
pub const CLASSIFIER_OVERRIDES: &str = "classifier_overrides_total";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder process-wide and describe all series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// One-time metrics registration (so series carry help text).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(SCORES_COMPUTED, "Health scores computed, by variant.");
        describe_counter!(
            SCORE_FALLBACK_COMPONENTS,
            "Score components that used a fallback or default input, by variant."
        );
        describe_counter!(FORECASTS, "Battery forecasts produced, by status.");
        describe_counter!(
            FORECAST_FALLBACK,
            "Forecasts that used a responsiveness-based fallback drain rate."
        );
        describe_counter!(BATTERY_SAMPLES, "Battery samples accepted into session windows.");
        describe_counter!(SESSIONS_EXPIRED, "Sessions removed by the expiry sweep.");
        describe_counter!(
            CLASSIFIER_OVERRIDES,
            "Post-hoc classifier label adjustments, by rule."
        );
    });
}

pub(crate) fn record_score(variant: &'static str, fallback_components: usize) {
    ensure_described();
    counter!(SCORES_COMPUTED, "variant" => variant).increment(1);
    if fallback_components > 0 {
        counter!(SCORE_FALLBACK_COMPONENTS, "variant" => variant)
            .increment(fallback_components as u64);
    }
}

pub(crate) fn record_forecast(status: &'static str, used_fallback: bool) {
    ensure_described();
    counter!(FORECASTS, "status" => status).increment(1);
    if used_fallback {
        counter!(FORECAST_FALLBACK).increment(1);
    }
}

pub(crate) fn record_battery_sample() {
    ensure_described();
    counter!(BATTERY_SAMPLES).increment(1);
}

pub(crate) fn record_sessions_expired(n: usize) {
    ensure_described();
    if n > 0 {
        counter!(SESSIONS_EXPIRED).increment(n as u64);
    }
}

pub(crate) fn record_override(rule: &'static str) {
    ensure_described();
    counter!(CLASSIFIER_OVERRIDES, "rule" => rule).increment(1);
}
