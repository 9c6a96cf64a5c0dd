// src/config/mod.rs
//! Engine configuration.
//!
//! Lookup order: `$DEVICE_HEALTH_CONFIG_PATH` (must exist when set), then
//! `config/device_health.toml`, then built-in defaults. Every key is optional
//! and out-of-range values fall back to their defaults after load. The
//! composite score weights are a fixed contract and are not configurable.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{info, warn};

use crate::forecast::ForecastSettings;
use crate::score::ScoreSettings;
use crate::session::SessionSettings;

pub const DEFAULT_CONFIG_PATH: &str = "config/device_health.toml";
pub const ENV_CONFIG_PATH: &str = "DEVICE_HEALTH_CONFIG_PATH";

fn default_low_capacity_storage_gb() -> f64 {
    32.0
}
fn default_battery_reference_mah() -> u32 {
    4000
}
fn default_thresholds() -> Vec<u32> {
    vec![20, 10, 5]
}
fn default_min_drain() -> f64 {
    0.05
}
fn default_max_drain() -> f64 {
    5.0
}
fn default_fallback_fast() -> f64 {
    0.4
}
fn default_fallback_mid() -> f64 {
    0.6
}
fn default_fallback_slow() -> f64 {
    1.0
}
fn default_ttl_minutes() -> u64 {
    120
}
fn default_sample_window_minutes() -> u64 {
    30
}
fn default_sample_capacity() -> usize {
    360
}
fn default_sweep_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Total storage (GB) at or below which the "true" score applies its penalty.
    #[serde(default = "default_low_capacity_storage_gb")]
    pub low_capacity_storage_gb: f64,
    #[serde(default = "default_battery_reference_mah")]
    pub battery_reference_mah: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            low_capacity_storage_gb: default_low_capacity_storage_gb(),
            battery_reference_mah: default_battery_reference_mah(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u32>,
    #[serde(default = "default_min_drain")]
    pub min_drain_per_min: f64,
    #[serde(default = "default_max_drain")]
    pub max_drain_per_min: f64,
    #[serde(default = "default_fallback_fast")]
    pub fallback_drain_fast: f64,
    #[serde(default = "default_fallback_mid")]
    pub fallback_drain_mid: f64,
    #[serde(default = "default_fallback_slow")]
    pub fallback_drain_slow: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
            min_drain_per_min: default_min_drain(),
            max_drain_per_min: default_max_drain(),
            fallback_drain_fast: default_fallback_fast(),
            fallback_drain_mid: default_fallback_mid(),
            fallback_drain_slow: default_fallback_slow(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
    #[serde(default = "default_sample_window_minutes")]
    pub sample_window_minutes: u64,
    #[serde(default = "default_sample_capacity")]
    pub sample_capacity: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            sample_window_minutes: default_sample_window_minutes(),
            sample_capacity: default_sample_capacity(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn positive_or(v: f64, default: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        default
    }
}

impl EngineConfig {
    /// Resolve and load the configuration (see module docs for the order).
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let path = PathBuf::from(p);
            return Self::load_from_file(&path)
                .with_context(|| format!("{ENV_CONFIG_PATH} points to {}", path.display()));
        }
        let default = Path::new(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from_file(default);
        }
        info!("no config file found, using built-in defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let cfg = Self::from_toml_str(&data)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        info!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: EngineConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Replace unusable values with defaults and repair swapped bounds.
    pub fn sanitize(&mut self) {
        let s = &mut self.scoring;
        s.low_capacity_storage_gb =
            positive_or(s.low_capacity_storage_gb, default_low_capacity_storage_gb());
        if s.battery_reference_mah == 0 {
            s.battery_reference_mah = default_battery_reference_mah();
        }

        let f = &mut self.forecast;
        f.thresholds.retain(|t| (1..100).contains(t));
        f.thresholds.sort_unstable_by(|a, b| b.cmp(a));
        f.thresholds.dedup();
        if f.thresholds.is_empty() {
            warn!("forecast.thresholds empty after sanitising, using defaults");
            f.thresholds = default_thresholds();
        }
        f.min_drain_per_min = positive_or(f.min_drain_per_min, default_min_drain());
        f.max_drain_per_min = positive_or(f.max_drain_per_min, default_max_drain());
        if f.min_drain_per_min > f.max_drain_per_min {
            std::mem::swap(&mut f.min_drain_per_min, &mut f.max_drain_per_min);
        }
        f.fallback_drain_fast = positive_or(f.fallback_drain_fast, default_fallback_fast());
        f.fallback_drain_mid = positive_or(f.fallback_drain_mid, default_fallback_mid());
        f.fallback_drain_slow = positive_or(f.fallback_drain_slow, default_fallback_slow());

        let ss = &mut self.session;
        if ss.ttl_minutes == 0 {
            ss.ttl_minutes = default_ttl_minutes();
        }
        if ss.sample_window_minutes == 0 {
            ss.sample_window_minutes = default_sample_window_minutes();
        }
        if ss.sample_capacity == 0 {
            ss.sample_capacity = default_sample_capacity();
        }
        if ss.sweep_interval_secs == 0 {
            ss.sweep_interval_secs = default_sweep_interval_secs();
        }
    }

    pub fn score_settings(&self) -> ScoreSettings {
        ScoreSettings {
            battery_reference_mah: self.scoring.battery_reference_mah,
            low_capacity_storage_gb: self.scoring.low_capacity_storage_gb,
        }
    }

    pub fn forecast_settings(&self) -> ForecastSettings {
        let f = &self.forecast;
        ForecastSettings {
            thresholds: f.thresholds.clone(),
            min_drain_per_min: f.min_drain_per_min,
            max_drain_per_min: f.max_drain_per_min,
            fallback_drain_fast: f.fallback_drain_fast,
            fallback_drain_mid: f.fallback_drain_mid,
            fallback_drain_slow: f.fallback_drain_slow,
            ..ForecastSettings::default()
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        let s = &self.session;
        SessionSettings {
            ttl: Duration::from_secs(s.ttl_minutes.saturating_mul(60)),
            sample_window: Duration::from_secs(s.sample_window_minutes.saturating_mul(60)),
            sample_capacity: s.sample_capacity,
            sweep_interval: Duration::from_secs(s.sweep_interval_secs),
        }
    }
}
