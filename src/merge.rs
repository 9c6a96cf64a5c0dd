//! # Source Merger
//! Combines the screenshot-derived and web-derived device records.
//!
//! Policy: per field, a value known to the web source overrides the screenshot
//! one outright; otherwise the screenshot value falls through. No numeric
//! blending. Every merged value carries the tag of the source that supplied it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::device::CanonicalDeviceInfo;

/// Where a merged value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Screenshot,
    Web,
}

/// A value plus its provenance tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagged<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Tagged<T> {
    pub fn new(value: T, source: Source) -> Self {
        Self { value, source }
    }

    fn map<U>(&self, f: impl FnOnce(&T) -> U) -> Tagged<U> {
        Tagged {
            value: f(&self.value),
            source: self.source,
        }
    }
}

/// Merged record: each known field has exactly one source tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedDeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<Tagged<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Tagged<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<Tagged<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<Tagged<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_gb: Option<Tagged<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_total_gb: Option<Tagged<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_used_gb: Option<Tagged<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_used_percent: Option<Tagged<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_free_percent: Option<Tagged<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<Tagged<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_capacity_mah: Option<Tagged<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_charging: Option<Tagged<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<Tagged<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android_api_level: Option<Tagged<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsiveness_index: Option<Tagged<f64>>,
}

/// Web wins over screenshot, field by field.
pub fn merge(screenshot: &CanonicalDeviceInfo, web: &CanonicalDeviceInfo) -> MergedDeviceInfo {
    MergedDeviceInfo {
        device_name: pick(&screenshot.device_name, &web.device_name),
        model: pick(&screenshot.model, &web.model),
        manufacturer: pick(&screenshot.manufacturer, &web.manufacturer),
        cpu_model: pick(&screenshot.cpu_model, &web.cpu_model),
        ram_gb: pick(&screenshot.ram_gb, &web.ram_gb),
        storage_total_gb: pick(&screenshot.storage_total_gb, &web.storage_total_gb),
        storage_used_gb: pick(&screenshot.storage_used_gb, &web.storage_used_gb),
        storage_used_percent: pick(&screenshot.storage_used_percent, &web.storage_used_percent),
        storage_free_percent: pick(&screenshot.storage_free_percent, &web.storage_free_percent),
        battery_percent: pick(&screenshot.battery_percent, &web.battery_percent),
        battery_capacity_mah: pick(&screenshot.battery_capacity_mah, &web.battery_capacity_mah),
        battery_charging: pick(&screenshot.battery_charging, &web.battery_charging),
        os_version: pick(&screenshot.os_version, &web.os_version),
        android_api_level: pick(&screenshot.android_api_level, &web.android_api_level),
        responsiveness_index: pick(&screenshot.responsiveness_index, &web.responsiveness_index),
    }
}

fn pick<T: Clone>(screenshot: &Option<T>, web: &Option<T>) -> Option<Tagged<T>> {
    match (web, screenshot) {
        (Some(w), _) => Some(Tagged::new(w.clone(), Source::Web)),
        (None, Some(s)) => Some(Tagged::new(s.clone(), Source::Screenshot)),
        (None, None) => None,
    }
}

fn value_of<T: Clone>(t: &Option<Tagged<T>>) -> Option<T> {
    t.as_ref().map(|t| t.value.clone())
}

impl MergedDeviceInfo {
    /// Drop the provenance tags.
    ///
    /// OCR confidence is not carried through the merge; it only describes the
    /// screenshot record.
    pub fn values(&self) -> CanonicalDeviceInfo {
        CanonicalDeviceInfo {
            device_name: value_of(&self.device_name),
            model: value_of(&self.model),
            manufacturer: value_of(&self.manufacturer),
            cpu_model: value_of(&self.cpu_model),
            ram_gb: value_of(&self.ram_gb),
            storage_total_gb: value_of(&self.storage_total_gb),
            storage_used_gb: value_of(&self.storage_used_gb),
            storage_used_percent: value_of(&self.storage_used_percent),
            storage_free_percent: value_of(&self.storage_free_percent),
            battery_percent: value_of(&self.battery_percent),
            battery_capacity_mah: value_of(&self.battery_capacity_mah),
            battery_charging: value_of(&self.battery_charging),
            os_version: value_of(&self.os_version),
            android_api_level: value_of(&self.android_api_level),
            responsiveness_index: value_of(&self.responsiveness_index),
            ocr_confidence: BTreeMap::new(),
        }
    }

    /// Flat `field -> {value, source}` view for display.
    pub fn to_map(&self) -> BTreeMap<&'static str, Tagged<Value>> {
        let mut out = BTreeMap::new();
        let mut put = |k: &'static str, v: Option<Tagged<Value>>| {
            if let Some(v) = v {
                out.insert(k, v);
            }
        };
        put("device_name", self.device_name.as_ref().map(|t| t.map(|v| Value::from(v.clone()))));
        put("model", self.model.as_ref().map(|t| t.map(|v| Value::from(v.clone()))));
        put("manufacturer", self.manufacturer.as_ref().map(|t| t.map(|v| Value::from(v.clone()))));
        put("cpu_model", self.cpu_model.as_ref().map(|t| t.map(|v| Value::from(v.clone()))));
        put("ram_gb", self.ram_gb.as_ref().map(|t| t.map(|v| Value::from(*v))));
        put("storage_total_gb", self.storage_total_gb.as_ref().map(|t| t.map(|v| Value::from(*v))));
        put("storage_used_gb", self.storage_used_gb.as_ref().map(|t| t.map(|v| Value::from(*v))));
        put(
            "storage_used_percent",
            self.storage_used_percent.as_ref().map(|t| t.map(|v| Value::from(*v))),
        );
        put(
            "storage_free_percent",
            self.storage_free_percent.as_ref().map(|t| t.map(|v| Value::from(*v))),
        );
        put("battery_percent", self.battery_percent.as_ref().map(|t| t.map(|v| Value::from(*v))));
        put(
            "battery_capacity_mah",
            self.battery_capacity_mah.as_ref().map(|t| t.map(|v| Value::from(*v))),
        );
        put("battery_charging", self.battery_charging.as_ref().map(|t| t.map(|v| Value::from(*v))));
        put("os_version", self.os_version.as_ref().map(|t| t.map(|v| Value::from(v.clone()))));
        put(
            "android_api_level",
            self.android_api_level.as_ref().map(|t| t.map(|v| Value::from(*v))),
        );
        put(
            "responsiveness_index",
            self.responsiveness_index.as_ref().map(|t| t.map(|v| Value::from(*v))),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_shadows_screenshot_per_field() {
        let shot = CanonicalDeviceInfo {
            battery_percent: Some(70.0),
            storage_total_gb: Some(128.0),
            ..Default::default()
        };
        let web = CanonicalDeviceInfo {
            battery_percent: Some(85.0),
            ram_gb: Some(8.0),
            ..Default::default()
        };
        let m = merge(&shot, &web);
        assert_eq!(m.battery_percent, Some(Tagged::new(85.0, Source::Web)));
        assert_eq!(m.ram_gb, Some(Tagged::new(8.0, Source::Web)));
        assert_eq!(m.storage_total_gb, Some(Tagged::new(128.0, Source::Screenshot)));
        assert_eq!(m.os_version, None);
    }

    #[test]
    fn explicit_not_charging_from_web_still_overrides() {
        let shot = CanonicalDeviceInfo {
            battery_charging: Some(true),
            ..Default::default()
        };
        let web = CanonicalDeviceInfo {
            battery_charging: Some(false),
            ..Default::default()
        };
        let m = merge(&shot, &web);
        assert_eq!(m.battery_charging, Some(Tagged::new(false, Source::Web)));
        assert!(!m.values().is_charging());
    }

    #[test]
    fn flat_map_has_one_tag_per_key() {
        let shot = CanonicalDeviceInfo {
            os_version: Some("Android 12".into()),
            ..Default::default()
        };
        let web = CanonicalDeviceInfo {
            ram_gb: Some(6.0),
            ..Default::default()
        };
        let map = merge(&shot, &web).to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["os_version"].source, Source::Screenshot);
        assert_eq!(map["ram_gb"].source, Source::Web);
    }
}
