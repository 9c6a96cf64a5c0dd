//! # Device records
//! Raw producer maps, the canonical device record and the live session snapshot.
//!
//! Every numeric field is optional: unknown means `None`, never zero. A value
//! that is present has already passed its physical range check in
//! [`crate::normalize`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Producer-defined key/value map (OCR output or browser telemetry).
pub type RawFieldMap = serde_json::Map<String, Value>;

/// Normalized, unit-consistent device attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_gb: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_total_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_used_gb: Option<f64>,
    /// Share of storage in use, 0–100. Always "used", whatever the source: the
    /// browser storage object's free share lands in `storage_free_percent`,
    /// and this field holds its complement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_used_percent: Option<f64>,
    /// Share of storage free, 0–100. This is what the storage sub-scores consume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_free_percent: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_capacity_mah: Option<u32>,
    /// `None` when the producer said nothing about charging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_charging: Option<bool>,

    /// Free text, e.g. "Android 13".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_api_level: Option<u32>,

    /// 0–100, higher is snappier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsiveness_index: Option<f64>,

    /// Per-field OCR confidence as reported by the extractor.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ocr_confidence: BTreeMap<String, f64>,
}

impl CanonicalDeviceInfo {
    pub fn is_charging(&self) -> bool {
        self.battery_charging.unwrap_or(false)
    }

    /// Free storage percentage, derived from whichever storage fields are known.
    pub fn free_storage_percent(&self) -> Option<f64> {
        if let Some(free) = self.storage_free_percent {
            return Some(free);
        }
        if let Some(used) = self.storage_used_percent {
            return Some(100.0 - used);
        }
        match (self.storage_used_gb, self.storage_total_gb) {
            (Some(used), Some(total)) if total > 0.0 => {
                Some(((total - used) / total * 100.0).clamp(0.0, 100.0))
            }
            _ => None,
        }
    }

    /// True when none of the scored fields is known.
    pub fn is_empty(&self) -> bool {
        self.ram_gb.is_none()
            && self.storage_total_gb.is_none()
            && self.storage_used_gb.is_none()
            && self.storage_used_percent.is_none()
            && self.storage_free_percent.is_none()
            && self.battery_percent.is_none()
            && self.battery_capacity_mah.is_none()
            && self.os_version.is_none()
            && self.android_api_level.is_none()
            && self.responsiveness_index.is_none()
    }
}

/// Most recent live battery reading pushed by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveBattery {
    pub level: f64,
    #[serde(default)]
    pub charging: bool,
}

/// Per-session live telemetry that is not part of the device record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsiveness_index: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<LiveBattery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_speed_mbps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
}

impl SessionSnapshot {
    /// Read the snapshot from a browser payload.
    ///
    /// Accepts `responsiveness: {index}`, `live: {level, charging}` and the
    /// network keys `onLine|online`, `networkSpeed|speed`, `networkType|type`.
    /// Unreadable values are dropped.
    pub fn from_raw(raw: &RawFieldMap) -> Self {
        let responsiveness_index = raw
            .get("responsiveness")
            .and_then(|r| r.get("index"))
            .and_then(crate::normalize::number_from_value)
            .filter(|v| (0.0..=100.0).contains(v));

        let live = raw.get("live").and_then(|l| {
            let level = l
                .get("level")
                .and_then(crate::normalize::number_from_value)
                .filter(|v| (0.0..=100.0).contains(v))?;
            let charging = l
                .get("charging")
                .and_then(crate::normalize::flag_from_value)
                .unwrap_or(false);
            Some(LiveBattery { level, charging })
        });

        let online = raw
            .get("onLine")
            .or_else(|| raw.get("online"))
            .and_then(crate::normalize::flag_from_value);

        let network_speed_mbps = raw
            .get("networkSpeed")
            .or_else(|| raw.get("speed"))
            .and_then(crate::normalize::number_from_value)
            .filter(|v| *v >= 0.0);

        let network_type = raw
            .get("networkType")
            .or_else(|| raw.get("type"))
            .and_then(Value::as_str)
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty());

        Self {
            responsiveness_index,
            live,
            online,
            network_speed_mbps,
            network_type,
        }
    }

    /// Overlay the fields present in `other`, keeping ours where it is silent.
    pub fn absorb(&mut self, other: SessionSnapshot) {
        if other.responsiveness_index.is_some() {
            self.responsiveness_index = other.responsiveness_index;
        }
        if other.live.is_some() {
            self.live = other.live;
        }
        if other.online.is_some() {
            self.online = other.online;
        }
        if other.network_speed_mbps.is_some() {
            self.network_speed_mbps = other.network_speed_mbps;
        }
        if other.network_type.is_some() {
            self.network_type = other.network_type;
        }
    }
}
