//! "True" score over a canonical record built from user-confirmed OCR fields.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::curves::{
    capacity_score, os_recency_score, parse_os_version, ram_tier_score, OsFamily,
};
use super::{Components, ScoreComponent, ScoreSettings};
use crate::device::CanonicalDeviceInfo;

const LOW_CAPACITY_PENALTY: f64 = 0.8;
const CPU_KNOWN_BONUS: f64 = 5.0;
/// API level that scores zero on the API scale.
const API_FLOOR: f64 = 26.0;
/// API levels from the floor to a full score.
const API_SPAN: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueScoreBreakdown {
    pub battery: ScoreComponent,
    pub storage: ScoreComponent,
    pub responsiveness: ScoreComponent,
    pub os: ScoreComponent,
    pub final_score: f64,
}

pub fn compute_true_score(info: &CanonicalDeviceInfo) -> TrueScoreBreakdown {
    compute_true_score_with(info, &ScoreSettings::default())
}

pub fn compute_true_score_with(
    info: &CanonicalDeviceInfo,
    settings: &ScoreSettings,
) -> TrueScoreBreakdown {
    let components = Components {
        battery: battery_component(info, settings),
        storage: storage_component(info, settings),
        responsiveness: responsiveness_component(info),
        os: os_component(info),
    };
    let final_score = components.finish("true");
    let Components {
        battery,
        storage,
        responsiveness,
        os,
    } = components;
    TrueScoreBreakdown {
        battery,
        storage,
        responsiveness,
        os,
        final_score,
    }
}

fn battery_component(info: &CanonicalDeviceInfo, settings: &ScoreSettings) -> ScoreComponent {
    if let Some(capacity) = info.battery_capacity_mah {
        return ScoreComponent::measured(
            capacity_score(capacity, settings.battery_reference_mah),
            format!(
                "{capacity} mAh against a {} mAh reference",
                settings.battery_reference_mah
            ),
            json!({ "battery_capacity_mah": capacity, "reference_mah": settings.battery_reference_mah }),
        );
    }
    match info.battery_percent {
        Some(pct) => ScoreComponent::measured(
            pct,
            format!("capacity unknown, using current level {pct}%"),
            json!({ "battery_percent": pct }),
        ),
        None => ScoreComponent::unknown("battery capacity and level unknown"),
    }
}

fn storage_component(info: &CanonicalDeviceInfo, settings: &ScoreSettings) -> ScoreComponent {
    let Some(free) = info.free_storage_percent() else {
        return ScoreComponent::unknown("storage usage unknown");
    };
    let low_capacity = info
        .storage_total_gb
        .is_some_and(|t| t <= settings.low_capacity_storage_gb);
    let (score, explanation) = if low_capacity {
        (
            free * LOW_CAPACITY_PENALTY,
            format!(
                "{free:.0}% free on a low-capacity device (<= {} GB)",
                settings.low_capacity_storage_gb
            ),
        )
    } else {
        (free, format!("{free:.0}% free"))
    };
    ScoreComponent::measured(
        score,
        explanation,
        json!({
            "free_percent": free,
            "storage_total_gb": info.storage_total_gb,
            "low_capacity": low_capacity,
        }),
    )
}

fn responsiveness_component(info: &CanonicalDeviceInfo) -> ScoreComponent {
    if let Some(ram) = info.ram_gb {
        let cpu_known = info.cpu_model.is_some();
        let bonus = if cpu_known { CPU_KNOWN_BONUS } else { 0.0 };
        return ScoreComponent::measured(
            (ram_tier_score(ram) + bonus).min(100.0),
            if cpu_known {
                format!("{ram} GB RAM, CPU identified")
            } else {
                format!("{ram} GB RAM")
            },
            json!({ "ram_gb": ram, "cpu_model": info.cpu_model }),
        );
    }
    match info.responsiveness_index {
        Some(index) => ScoreComponent::measured(
            index,
            format!("RAM unknown, measured responsiveness {index:.0}"),
            json!({ "responsiveness_index": index }),
        )
        .with_fallback(),
        None => ScoreComponent::unknown("RAM unknown"),
    }
}

fn os_component(info: &CanonicalDeviceInfo) -> ScoreComponent {
    if let Some(api) = info.android_api_level {
        return ScoreComponent::measured(
            (f64::from(api) - API_FLOOR) / API_SPAN * 100.0,
            format!("Android API level {api}"),
            json!({ "android_api_level": api }),
        );
    }
    let parsed = info
        .os_version
        .as_deref()
        .and_then(|text| parse_os_version(text).map(|p| (text, p)));
    match parsed {
        Some((text, (family, version))) => ScoreComponent::measured(
            os_recency_score(family, version),
            match family {
                OsFamily::Android => format!("{text} on the Android release scale"),
                OsFamily::Ios => format!("{text} on the iOS release scale"),
            },
            json!({ "os_version": text, "version": version }),
        ),
        None => ScoreComponent::unknown("OS version unknown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_curve_beats_percent() {
        let info = CanonicalDeviceInfo {
            battery_capacity_mah: Some(3000),
            battery_percent: Some(10.0),
            ..Default::default()
        };
        let s = compute_true_score(&info);
        assert_eq!(s.battery.score, 75.0);
    }

    #[test]
    fn percent_fallback_has_no_charging_bonus() {
        let info = CanonicalDeviceInfo {
            battery_percent: Some(60.0),
            battery_charging: Some(true),
            ..Default::default()
        };
        assert_eq!(compute_true_score(&info).battery.score, 60.0);
    }

    #[test]
    fn low_capacity_penalty_applies_at_16_not_128() {
        let small = CanonicalDeviceInfo {
            storage_total_gb: Some(16.0),
            storage_used_percent: Some(50.0),
            ..Default::default()
        };
        let large = CanonicalDeviceInfo {
            storage_total_gb: Some(128.0),
            storage_used_percent: Some(50.0),
            ..Default::default()
        };
        assert_eq!(compute_true_score(&small).storage.score, 40.0);
        assert_eq!(compute_true_score(&large).storage.score, 50.0);
    }

    #[test]
    fn api_level_33_scores_above_80() {
        let info = CanonicalDeviceInfo {
            android_api_level: Some(33),
            ..Default::default()
        };
        assert!(compute_true_score(&info).os.score > 80.0);
    }

    #[test]
    fn cpu_model_nudges_responsiveness() {
        let mut info = CanonicalDeviceInfo {
            ram_gb: Some(8.0),
            ..Default::default()
        };
        assert_eq!(compute_true_score(&info).responsiveness.score, 85.0);
        info.cpu_model = Some("Snapdragon 8 Gen 2".into());
        assert_eq!(compute_true_score(&info).responsiveness.score, 90.0);
    }
}
