//! # Field Normalizer
//!
//! Maps heterogeneous producer keys (OCR `snake_case`, browser `camelCase`,
//! nested objects) onto [`CanonicalDeviceInfo`].
//!
//! - Driven by an ordered rule table of `(field, raw key, transform)` rows.
//! - For each field the first alias that is present and non-empty decides;
//!   aliases are never merged.
//! - `"Unknown"`, `""` and `null` count as absent.
//! - A value that fails to parse or falls outside its physical range is
//!   dropped. Nothing here returns an error.
//!
//! Supporting a new producer schema means adding rows to the table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::device::{CanonicalDeviceInfo, RawFieldMap};

const MB_PER_GB: f64 = 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(\.\d+)?").expect("numeric token regex"));

/// Canonical attributes a rule can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CanonicalField {
    DeviceName,
    Model,
    Manufacturer,
    CpuModel,
    RamGb,
    StorageTotalGb,
    StorageUsedGb,
    StorageUsedPercent,
    StorageFreePercent,
    BatteryPercent,
    BatteryCapacityMah,
    BatteryCharging,
    OsVersion,
    AndroidApiLevel,
    ResponsivenessIndex,
}

impl CanonicalField {
    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::DeviceName => "device_name",
            CanonicalField::Model => "model",
            CanonicalField::Manufacturer => "manufacturer",
            CanonicalField::CpuModel => "cpu_model",
            CanonicalField::RamGb => "ram_gb",
            CanonicalField::StorageTotalGb => "storage_total_gb",
            CanonicalField::StorageUsedGb => "storage_used_gb",
            CanonicalField::StorageUsedPercent => "storage_used_percent",
            CanonicalField::StorageFreePercent => "storage_free_percent",
            CanonicalField::BatteryPercent => "battery_percent",
            CanonicalField::BatteryCapacityMah => "battery_capacity_mah",
            CanonicalField::BatteryCharging => "battery_charging",
            CanonicalField::OsVersion => "os_version",
            CanonicalField::AndroidApiLevel => "android_api_level",
            CanonicalField::ResponsivenessIndex => "responsiveness_index",
        }
    }

    /// Store `value` if it has the right shape and range. Returns false when dropped.
    fn assign(self, info: &mut CanonicalDeviceInfo, value: FieldValue) -> bool {
        use CanonicalField::*;
        match (self, value) {
            (DeviceName, FieldValue::Text(s)) => info.device_name = Some(s),
            (Model, FieldValue::Text(s)) => info.model = Some(s),
            (Manufacturer, FieldValue::Text(s)) => info.manufacturer = Some(s),
            (CpuModel, FieldValue::Text(s)) => info.cpu_model = Some(s),
            (OsVersion, FieldValue::Text(s)) => info.os_version = Some(s),
            (BatteryCharging, FieldValue::Flag(b)) => info.battery_charging = Some(b),

            (RamGb, FieldValue::Number(v)) if v > 0.0 && v <= 128.0 => info.ram_gb = Some(v),
            (StorageTotalGb, FieldValue::Number(v)) if v > 0.0 && v <= 8192.0 => {
                info.storage_total_gb = Some(v)
            }
            (StorageUsedGb, FieldValue::Number(v)) if (0.0..=8192.0).contains(&v) => {
                info.storage_used_gb = Some(v)
            }
            (StorageUsedPercent, FieldValue::Number(v)) if is_percent(v) => {
                info.storage_used_percent = Some(v)
            }
            (StorageFreePercent, FieldValue::Number(v)) if is_percent(v) => {
                info.storage_free_percent = Some(v)
            }
            (BatteryPercent, FieldValue::Number(v)) if is_percent(v) => {
                info.battery_percent = Some(v)
            }
            (ResponsivenessIndex, FieldValue::Number(v)) if is_percent(v) => {
                info.responsiveness_index = Some(v)
            }
            (BatteryCapacityMah, FieldValue::Number(v)) if (500.0..=20_000.0).contains(&v) => {
                info.battery_capacity_mah = Some(v.round() as u32)
            }
            (AndroidApiLevel, FieldValue::Number(v)) if (16.0..=40.0).contains(&v) => {
                info.android_api_level = Some(v.round() as u32)
            }
            _ => return false,
        }
        true
    }
}

/// How a raw value is turned into a canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Number, or first numeric token of a string ("128GB" → 128).
    Number,
    /// Whole number (rounded), same parsing as `Number`.
    Integer,
    /// Megabytes → gigabytes.
    MegabytesToGigabytes,
    /// Memory text: gigabytes unless the text says MB ("4096 MB" → 4).
    MemoryText,
    /// Number, or text with a `%` sign.
    PercentText,
    /// `{level}` object, `"NN%"` text or a bare number.
    BatteryLevel,
    /// `{charging}` object.
    BatteryChargingFlag,
    /// Number, or text that carries an `mAh` unit.
    CapacityText,
    /// Boolean-ish value ("Yes", "true", 1 …).
    Flag,
    /// Trimmed free text.
    Text,
    /// Bare release number becomes "Android N"; other text kept.
    AndroidRelease,
    /// Nested storage object → share in use.
    StorageObjectUsedPercent,
    /// Nested storage object → share free.
    StorageObjectFreePercent,
    /// `{index}` object or bare number.
    ResponsivenessIndex,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl Transform {
    fn apply(self, v: &Value) -> Option<FieldValue> {
        match self {
            Transform::Number => number_from_value(v).map(FieldValue::Number),
            Transform::Integer => number_from_value(v).map(|n| FieldValue::Number(n.round())),
            Transform::MegabytesToGigabytes => {
                number_from_value(v).map(|mb| FieldValue::Number(mb / MB_PER_GB))
            }
            Transform::MemoryText => {
                let n = number_from_value(v)?;
                let is_mb = v
                    .as_str()
                    .map(|s| s.to_ascii_lowercase().contains("mb"))
                    .unwrap_or(false);
                Some(FieldValue::Number(if is_mb { n / MB_PER_GB } else { n }))
            }
            Transform::PercentText => match v {
                Value::String(s) if !s.contains('%') => None,
                other => number_from_value(other).map(FieldValue::Number),
            },
            Transform::BatteryLevel => match v {
                Value::Object(o) => o
                    .get("level")
                    .and_then(number_from_value)
                    .map(FieldValue::Number),
                other => Transform::PercentText.apply(other),
            },
            Transform::BatteryChargingFlag => v
                .get("charging")
                .and_then(flag_from_value)
                .map(FieldValue::Flag),
            Transform::CapacityText => match v {
                Value::String(s) if !s.to_ascii_lowercase().contains("mah") => None,
                other => number_from_value(other).map(|n| FieldValue::Number(n.round())),
            },
            Transform::Flag => flag_from_value(v).map(FieldValue::Flag),
            Transform::Text => text_from_value(v).map(FieldValue::Text),
            Transform::AndroidRelease => {
                let s = text_from_value(v)?;
                if s.chars().all(|c| c.is_ascii_digit() || c == '.') {
                    Some(FieldValue::Text(format!("Android {s}")))
                } else {
                    Some(FieldValue::Text(s))
                }
            }
            Transform::StorageObjectUsedPercent => {
                let (used, total) = storage_pair_mb(v)?;
                Some(FieldValue::Number(used / total * 100.0))
            }
            Transform::StorageObjectFreePercent => {
                let (used, total) = storage_pair_mb(v)?;
                Some(FieldValue::Number((total - used) / total * 100.0))
            }
            Transform::ResponsivenessIndex => match v {
                Value::Object(o) => o
                    .get("index")
                    .and_then(number_from_value)
                    .map(FieldValue::Number),
                other => number_from_value(other).map(FieldValue::Number),
            },
        }
    }
}

/// One row of the alias table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: CanonicalField,
    pub key: &'static str,
    pub transform: Transform,
}

impl FieldRule {
    pub const fn new(field: CanonicalField, key: &'static str, transform: Transform) -> Self {
        Self {
            field,
            key,
            transform,
        }
    }
}

/// Table-driven normalizer. Rules for the same field are tried in table order.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    rules: Vec<FieldRule>,
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl FieldNormalizer {
    pub fn with_rules(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// Append a rule; it is tried after the existing aliases of its field.
    pub fn push_rule(&mut self, rule: FieldRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn normalize(&self, raw: &RawFieldMap) -> CanonicalDeviceInfo {
        let mut info = CanonicalDeviceInfo::default();
        let mut decided: Vec<CanonicalField> = Vec::new();
        let mut dropped: Vec<&'static str> = Vec::new();

        for rule in &self.rules {
            if decided.contains(&rule.field) {
                continue;
            }
            let Some(v) = raw.get(rule.key) else {
                continue;
            };
            if is_blank(v) {
                continue;
            }
            // First present alias decides, even when it turns out unusable.
            decided.push(rule.field);
            let stored = rule
                .transform
                .apply(v)
                .map(|fv| rule.field.assign(&mut info, fv))
                .unwrap_or(false);
            if !stored {
                dropped.push(rule.key);
            }
        }

        derive_storage(&mut info);

        if let Some(Value::Object(conf)) = raw.get("ocr_confidence") {
            info.ocr_confidence = conf
                .iter()
                .filter_map(|(k, v)| {
                    number_from_value(v)
                        .filter(|c| (0.0..=1.0).contains(c))
                        .map(|c| (k.clone(), c))
                })
                .collect::<BTreeMap<_, _>>();
        }

        if !dropped.is_empty() {
            debug!(target: "normalize", dropped = ?dropped, "malformed fields dropped");
        }
        info
    }
}

/// Normalize with the built-in table.
pub fn normalize(raw: &RawFieldMap) -> CanonicalDeviceInfo {
    static DEFAULT: Lazy<FieldNormalizer> = Lazy::new(FieldNormalizer::default);
    DEFAULT.normalize(raw)
}

/// Built-in alias table covering the OCR and browser vocabularies.
pub fn default_rules() -> Vec<FieldRule> {
    use CanonicalField as F;
    use Transform as T;

    vec![
        FieldRule::new(F::DeviceName, "device_name", T::Text),
        FieldRule::new(F::DeviceName, "deviceName", T::Text),
        FieldRule::new(F::Model, "model", T::Text),
        FieldRule::new(F::Model, "deviceModel", T::Text),
        FieldRule::new(F::Manufacturer, "manufacturer", T::Text),
        FieldRule::new(F::Manufacturer, "brand", T::Text),
        FieldRule::new(F::CpuModel, "cpu_model", T::Text),
        FieldRule::new(F::CpuModel, "processor", T::Text),
        // memory
        FieldRule::new(F::RamGb, "ram_gb", T::Number),
        FieldRule::new(F::RamGb, "ramSizeGB", T::Number),
        FieldRule::new(F::RamGb, "deviceMemory", T::Number),
        FieldRule::new(F::RamGb, "ram_mb", T::MegabytesToGigabytes),
        FieldRule::new(F::RamGb, "ram", T::MemoryText),
        // storage
        FieldRule::new(F::StorageTotalGb, "storage_total_gb", T::Number),
        FieldRule::new(F::StorageTotalGb, "storageSizeGB", T::Number),
        FieldRule::new(F::StorageTotalGb, "storage", T::Number),
        FieldRule::new(F::StorageUsedGb, "storage_used_gb", T::Number),
        FieldRule::new(F::StorageUsedGb, "storageUsedGB", T::Number),
        FieldRule::new(F::StorageUsedPercent, "storage_used_percent", T::Number),
        FieldRule::new(F::StorageUsedPercent, "storageSandboxUsagePercent", T::Number),
        FieldRule::new(F::StorageUsedPercent, "storage", T::StorageObjectUsedPercent),
        FieldRule::new(F::StorageFreePercent, "storage_free_percent", T::Number),
        FieldRule::new(F::StorageFreePercent, "storage", T::StorageObjectFreePercent),
        // battery
        FieldRule::new(F::BatteryPercent, "battery_percent", T::Number),
        FieldRule::new(F::BatteryPercent, "batteryLevel", T::Number),
        FieldRule::new(F::BatteryPercent, "battery", T::BatteryLevel),
        FieldRule::new(F::BatteryCapacityMah, "battery_capacity_mah", T::Integer),
        FieldRule::new(F::BatteryCapacityMah, "batteryCapacity", T::CapacityText),
        FieldRule::new(F::BatteryCapacityMah, "battery", T::CapacityText),
        FieldRule::new(F::BatteryCharging, "battery_charging", T::Flag),
        FieldRule::new(F::BatteryCharging, "charging", T::Flag),
        FieldRule::new(F::BatteryCharging, "battery", T::BatteryChargingFlag),
        // os
        FieldRule::new(F::OsVersion, "os_version", T::Text),
        FieldRule::new(F::OsVersion, "osVersion", T::Text),
        FieldRule::new(F::OsVersion, "androidVersion", T::AndroidRelease),
        FieldRule::new(F::AndroidApiLevel, "android_api_level", T::Integer),
        FieldRule::new(F::AndroidApiLevel, "android_api_or_release", T::Integer),
        // responsiveness
        FieldRule::new(F::ResponsivenessIndex, "responsiveness_index", T::Number),
        FieldRule::new(F::ResponsivenessIndex, "responsivenessIndex", T::Number),
        FieldRule::new(F::ResponsivenessIndex, "responsiveness", T::ResponsivenessIndex),
    ]
}

fn derive_storage(info: &mut CanonicalDeviceInfo) {
    if info.storage_used_percent.is_none() {
        if let (Some(used), Some(total)) = (info.storage_used_gb, info.storage_total_gb) {
            if used <= total {
                info.storage_used_percent = Some(used / total * 100.0);
            }
        }
    }
    if info.storage_free_percent.is_none() {
        info.storage_free_percent = info.storage_used_percent.map(|u| 100.0 - u);
    }
    if info.storage_used_percent.is_none() {
        info.storage_used_percent = info.storage_free_percent.map(|f| 100.0 - f);
    }
}

/// `(used, total)` in MB from either browser storage schema.
pub(crate) fn storage_pair_mb(v: &Value) -> Option<(f64, f64)> {
    let o = v.as_object()?;
    let (used, total) = if let Some(quota) = o.get("storageSandboxQuotaMB") {
        (
            number_from_value(o.get("storageSandboxUsedMB")?)?,
            number_from_value(quota)?,
        )
    } else {
        (
            number_from_value(o.get("usage")?)? / BYTES_PER_MB,
            number_from_value(o.get("quota")?)? / BYTES_PER_MB,
        )
    };
    (total > 0.0 && used >= 0.0 && used <= total).then_some((used, total))
}

fn is_percent(v: f64) -> bool {
    (0.0..=100.0).contains(&v)
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => {
            let t = s.trim();
            t.is_empty() || t.eq_ignore_ascii_case("unknown")
        }
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Number from a JSON value: numbers as-is, strings by their first numeric
/// token (trailing unit text ignored). `"Unknown"` and `""` yield `None`.
pub fn number_from_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            if is_blank(v) {
                return None;
            }
            leading_number(s)
        }
        _ => None,
    }
}

/// First numeric token of a string, e.g. `"Android 13.1"` -> `13.1`.
pub fn leading_number(s: &str) -> Option<f64> {
    RE_NUMBER
        .find(s)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Boolean from `true`, `"Yes"`, `"1"` and friends.
pub fn flag_from_value(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" | "charging" => Some(true),
            "no" | "false" | "0" | "discharging" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text_from_value(v: &Value) -> Option<String> {
    if is_blank(v) {
        return None;
    }
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
