//! Verified score: the strict variant.
//!
//! Every input it could not read is replaced by exactly 50 and reported through
//! `defaulted`/`has_missing_fields`; reduced-confidence inputs set `uses_fallback`.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::curves::{android_release_for_api, capacity_score, parse_os_version, OsFamily};
use super::{Components, ScoreComponent, ScoreSettings, DEFAULT_COMPONENT_SCORE};
use crate::device::{CanonicalDeviceInfo, SessionSnapshot};

/// Confidence multiplier for a battery level used in place of capacity.
const PERCENT_ONLY_CONFIDENCE: f64 = 0.85;
/// RAM at which the RAM half of the combined score saturates.
const RAM_SATURATION_GB: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedScoreBreakdown {
    pub battery: ScoreComponent,
    pub storage: ScoreComponent,
    pub ram_responsiveness: ScoreComponent,
    pub os: ScoreComponent,
    pub verified_score: f64,
    pub has_missing_fields: bool,
}

/// Verified score; `snapshot` supplies the live responsiveness index when known.
pub fn compute_verified_score(
    info: &CanonicalDeviceInfo,
    snapshot: Option<&SessionSnapshot>,
) -> VerifiedScoreBreakdown {
    compute_verified_score_with(info, snapshot, &ScoreSettings::default())
}

pub fn compute_verified_score_with(
    info: &CanonicalDeviceInfo,
    snapshot: Option<&SessionSnapshot>,
    settings: &ScoreSettings,
) -> VerifiedScoreBreakdown {
    let components = Components {
        battery: battery_component(info, settings),
        storage: storage_component(info),
        responsiveness: ram_responsiveness_component(info, snapshot),
        os: os_component(info),
    };
    let verified_score = components.finish("verified");
    let has_missing_fields = components.any_defaulted();
    let Components {
        battery,
        storage,
        responsiveness,
        os,
    } = components;
    VerifiedScoreBreakdown {
        battery,
        storage,
        ram_responsiveness: responsiveness,
        os,
        verified_score,
        has_missing_fields,
    }
}

fn battery_component(info: &CanonicalDeviceInfo, settings: &ScoreSettings) -> ScoreComponent {
    if let Some(capacity) = info.battery_capacity_mah {
        return ScoreComponent::measured(
            capacity_score(capacity, settings.battery_reference_mah),
            format!("{capacity} mAh rated capacity"),
            json!({ "battery_capacity_mah": capacity }),
        );
    }
    match info.battery_percent {
        Some(pct) => ScoreComponent::measured(
            pct * PERCENT_ONLY_CONFIDENCE,
            format!("capacity unknown; {pct}% level at reduced confidence"),
            json!({ "battery_percent": pct, "confidence": PERCENT_ONLY_CONFIDENCE }),
        )
        .with_fallback(),
        None => ScoreComponent::unknown("no battery data"),
    }
}

fn storage_component(info: &CanonicalDeviceInfo) -> ScoreComponent {
    let total = match info.storage_total_gb {
        Some(t) if t > 0.0 => t,
        _ => return ScoreComponent::unknown("total storage unknown"),
    };
    let free = match info.storage_used_gb {
        Some(used) if used <= total => Some((total - used) / total * 100.0),
        _ => info.free_storage_percent(),
    };
    match free {
        Some(free) => ScoreComponent::measured(
            free,
            format!("{free:.0}% of {total} GB free"),
            json!({
                "storage_total_gb": total,
                "storage_used_gb": info.storage_used_gb,
                "free_percent": free,
            }),
        ),
        None => ScoreComponent::unknown(format!("{total} GB total, usage unknown")),
    }
}

fn ram_responsiveness_component(
    info: &CanonicalDeviceInfo,
    snapshot: Option<&SessionSnapshot>,
) -> ScoreComponent {
    let Some(ram) = info.ram_gb else {
        return ScoreComponent::unknown("RAM unknown");
    };
    let ram_norm = (ram / RAM_SATURATION_GB).min(1.0) * 100.0;
    let measured = snapshot
        .and_then(|s| s.responsiveness_index)
        .or(info.responsiveness_index);
    let responsiveness = measured.unwrap_or(DEFAULT_COMPONENT_SCORE);
    let component = ScoreComponent::measured(
        0.5 * ram_norm + 0.5 * responsiveness,
        match measured {
            Some(idx) => format!("{ram} GB RAM, responsiveness {idx:.0}"),
            None => format!("{ram} GB RAM, responsiveness not measured"),
        },
        json!({
            "ram_gb": ram,
            "ram_norm": ram_norm,
            "responsiveness_index": measured,
        }),
    );
    if measured.is_some() {
        component
    } else {
        component.with_fallback()
    }
}

/// Android release implied by an API level, saturating outside the known table.
fn release_from_api(api: u32) -> f64 {
    match android_release_for_api(api) {
        Some(r) => f64::from(r),
        None if api > 35 => 15.0,
        None => 7.0,
    }
}

/// 50 below the floor, 100 at the ceiling, linear in between.
fn step_score(version: f64, floor: f64, ceiling: f64) -> f64 {
    if version >= ceiling {
        100.0
    } else if version < floor {
        50.0
    } else {
        50.0 + (version - floor) / (ceiling - floor) * 50.0
    }
}

fn os_component(info: &CanonicalDeviceInfo) -> ScoreComponent {
    if let Some((family, version)) = info.os_version.as_deref().and_then(parse_os_version) {
        let score = match family {
            OsFamily::Android => step_score(version, 8.0, 12.0),
            OsFamily::Ios => step_score(version, 12.0, 16.0),
        };
        return ScoreComponent::measured(
            score,
            format!("{family:?} {version}"),
            json!({ "os_version": info.os_version, "version": version }),
        );
    }
    match info.android_api_level {
        Some(api) => {
            let release = release_from_api(api);
            ScoreComponent::measured(
                step_score(release, 8.0, 12.0),
                format!("Android {release} (from API level {api})"),
                json!({ "android_api_level": api, "release": release }),
            )
            .with_fallback()
        }
        None => ScoreComponent::unknown("OS version unknown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn android(v: &str) -> CanonicalDeviceInfo {
        CanonicalDeviceInfo {
            os_version: Some(v.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn os_anchor_points_and_interpolation() {
        assert_eq!(compute_verified_score(&android("Android 13"), None).os.score, 100.0);
        assert_eq!(compute_verified_score(&android("Android 12"), None).os.score, 100.0);
        assert_eq!(compute_verified_score(&android("Android 7"), None).os.score, 50.0);
        assert_eq!(compute_verified_score(&android("Android 10"), None).os.score, 75.0);
    }

    #[test]
    fn os_from_api_level_when_no_version_text() {
        let info = CanonicalDeviceInfo {
            android_api_level: Some(30),
            ..Default::default()
        };
        let s = compute_verified_score(&info, None);
        assert_eq!(s.os.score, 87.5);
        assert!(s.os.uses_fallback && !s.os.defaulted);
    }

    #[test]
    fn ram_and_snapshot_responsiveness_blend() {
        let info = CanonicalDeviceInfo {
            ram_gb: Some(8.0),
            responsiveness_index: Some(10.0),
            ..Default::default()
        };
        let snap = SessionSnapshot {
            responsiveness_index: Some(75.0),
            ..Default::default()
        };
        let s = compute_verified_score(&info, Some(&snap));
        assert_eq!(s.ram_responsiveness.score, 87.5);
    }

    #[test]
    fn percent_only_battery_is_discounted() {
        let info = CanonicalDeviceInfo {
            battery_percent: Some(100.0),
            ..Default::default()
        };
        let s = compute_verified_score(&info, None);
        assert_eq!(s.battery.score, 85.0);
        assert!(s.battery.uses_fallback);
    }

    #[test]
    fn zero_total_storage_is_defaulted() {
        let info = CanonicalDeviceInfo {
            storage_total_gb: Some(0.0),
            storage_used_percent: Some(100.0),
            ..Default::default()
        };
        let s = compute_verified_score(&info, None);
        assert_eq!(s.storage.score, 50.0);
        assert!(s.storage.uses_fallback && s.has_missing_fields);
    }

    #[test]
    fn missing_components_are_exactly_fifty() {
        let info = CanonicalDeviceInfo {
            battery_capacity_mah: Some(5000),
            ..Default::default()
        };
        let s = compute_verified_score(&info, None);
        assert!(s.has_missing_fields);
        assert_eq!(s.storage.score, 50.0);
        assert_eq!(s.ram_responsiveness.score, 50.0);
        assert_eq!(s.os.score, 50.0);
        assert_eq!(s.battery.score, 100.0);
    }
}
