//! Legacy display score.
//!
//! Reads a raw merged map directly (no canonicalisation) so older clients that
//! post browser-shaped payloads keep getting the same number.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::curves::{free_storage_tier_score, os_recency_score, parse_os_version, ram_tier_score};
use super::{Components, ScoreComponent};
use crate::device::RawFieldMap;
use crate::normalize::{flag_from_value, number_from_value, storage_pair_mb};

const RAM_KEYS: &[&str] = &["ram_gb", "ramSizeGB", "deviceMemory"];
const STORAGE_GB_KEYS: &[&str] = &["storage_gb", "storage_total_gb", "storageSizeGB", "storage"];
const BATTERY_KEYS: &[&str] = &["battery_percent", "batteryLevel", "battery"];
const CHARGING_KEYS: &[&str] = &["battery_charging", "charging"];
const OS_KEYS: &[&str] = &["os_version", "osVersion", "androidVersion", "platformVersion"];

const ANDROID_RELEASE_KEY: &str = "androidVersion";

const CHARGING_BONUS: f64 = 5.0;
/// Plain storage capacity that maps to a full score.
const FULL_SCORE_STORAGE_GB: f64 = 128.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyScoreBreakdown {
    pub battery: ScoreComponent,
    pub storage: ScoreComponent,
    pub ram: ScoreComponent,
    pub os: ScoreComponent,
    pub final_score: f64,
}

/// Legacy display score over a raw merged map.
pub fn compute_performance_score(raw: &RawFieldMap) -> LegacyScoreBreakdown {
    let components = Components {
        battery: battery_component(raw),
        storage: storage_component(raw),
        responsiveness: ram_component(raw),
        os: os_component(raw),
    };
    let final_score = components.finish("legacy");
    let Components {
        battery,
        storage,
        responsiveness,
        os,
    } = components;
    LegacyScoreBreakdown {
        battery,
        storage,
        ram: responsiveness,
        os,
        final_score,
    }
}

fn first_number(raw: &RawFieldMap, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find_map(number_from_value)
}

fn ram_component(raw: &RawFieldMap) -> ScoreComponent {
    match first_number(raw, RAM_KEYS).filter(|v| *v > 0.0) {
        Some(ram) => ScoreComponent::measured(
            ram_tier_score(ram),
            format!("{ram} GB RAM"),
            json!({ "ram_gb": ram }),
        ),
        None => ScoreComponent::unknown("RAM unknown"),
    }
}

fn storage_component(raw: &RawFieldMap) -> ScoreComponent {
    if let Some((used, total)) = raw.get("storage").and_then(storage_pair_mb) {
        let free = (total - used) / total * 100.0;
        return ScoreComponent::measured(
            free_storage_tier_score(free),
            format!("{free:.0}% storage free"),
            json!({ "used_mb": used, "total_mb": total, "free_percent": free }),
        );
    }
    match first_number(raw, STORAGE_GB_KEYS).filter(|v| *v > 0.0) {
        Some(gb) => ScoreComponent::measured(
            gb / FULL_SCORE_STORAGE_GB * 100.0,
            format!("{gb} GB storage"),
            json!({ "storage_gb": gb }),
        )
        .with_fallback(),
        None => ScoreComponent::unknown("storage unknown"),
    }
}

fn battery_component(raw: &RawFieldMap) -> ScoreComponent {
    let level = BATTERY_KEYS
        .iter()
        .filter_map(|k| raw.get(*k))
        .find_map(|v| match v {
            Value::Object(o) => o.get("level").and_then(number_from_value),
            other => number_from_value(other),
        })
        .filter(|v| (0.0..=100.0).contains(v));
    let Some(level) = level else {
        return ScoreComponent::unknown("battery level unknown");
    };

    let charging = raw
        .get("battery")
        .and_then(|b| b.get("charging"))
        .or_else(|| CHARGING_KEYS.iter().find_map(|k| raw.get(*k)))
        .and_then(flag_from_value)
        .unwrap_or(false);
    let score = if charging {
        (level + CHARGING_BONUS).min(100.0)
    } else {
        level
    };
    let explanation = if charging {
        format!("{level}% and charging")
    } else {
        format!("{level}%")
    };
    ScoreComponent::measured(score, explanation, json!({ "level": level, "charging": charging }))
}

fn os_component(raw: &RawFieldMap) -> ScoreComponent {
    let parsed = OS_KEYS
        .iter()
        .filter_map(|k| raw.get(*k).map(|v| (*k, v)))
        .find_map(|(key, v)| match v {
            // Browser collectors send the bare release ("13") under this key.
            Value::String(s) if key == ANDROID_RELEASE_KEY && is_bare_release(s) => {
                parse_os_version(&format!("Android {}", s.trim())).map(|p| (s.trim().to_string(), p))
            }
            Value::String(s) => parse_os_version(s).map(|p| (s.clone(), p)),
            Value::Number(n) => n
                .as_f64()
                .and_then(|f| parse_os_version(&format!("Android {f}")))
                .map(|p| (n.to_string(), p)),
            _ => None,
        });
    match parsed {
        Some((text, (family, version))) => ScoreComponent::measured(
            os_recency_score(family, version),
            format!("{text} ({family:?} scale)"),
            json!({ "os_version": text, "version": version }),
        ),
        None => ScoreComponent::unknown("OS version unknown"),
    }
}

fn is_bare_release(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}
