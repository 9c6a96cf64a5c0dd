// tests/scoring_true.rs
use device_health::score::{compute_true_score, compute_true_score_with, ScoreSettings};
use device_health::CanonicalDeviceInfo;

fn in_range(v: f64) -> bool {
    (0.0..=100.0).contains(&v)
}

#[test]
fn good_device_scores_high() {
    let info = CanonicalDeviceInfo {
        ram_gb: Some(8.0),
        storage_total_gb: Some(128.0),
        storage_used_percent: Some(30.0),
        battery_capacity_mah: Some(4500),
        android_api_level: Some(33),
        ..Default::default()
    };
    let s = compute_true_score(&info);
    assert!(s.responsiveness.score > 70.0, "8GB RAM should score well");
    assert!(s.os.score > 80.0);
    assert_eq!(s.battery.score, 100.0);
    assert_eq!(s.storage.score, 70.0);
    assert!(s.final_score > 80.0 && s.final_score <= 100.0);
}

#[test]
fn near_empty_input_lands_near_the_middle() {
    let info = CanonicalDeviceInfo {
        device_name: Some("Galaxy".into()),
        ..Default::default()
    };
    let s = compute_true_score(&info);
    assert!(s.final_score > 30.0 && s.final_score < 70.0);
    for c in [&s.battery, &s.storage, &s.responsiveness, &s.os] {
        assert_eq!(c.score, 50.0);
        assert!(c.defaulted);
    }
}

#[test]
fn degenerate_inputs() {
    let full = CanonicalDeviceInfo {
        storage_total_gb: Some(128.0),
        storage_used_percent: Some(100.0),
        battery_percent: Some(0.0),
        ..Default::default()
    };
    let s = compute_true_score(&full);
    assert_eq!(s.storage.score, 0.0);
    assert!(s.battery.score < 30.0);

    let empty_disk = CanonicalDeviceInfo {
        storage_total_gb: Some(128.0),
        storage_used_percent: Some(0.0),
        ..Default::default()
    };
    assert_eq!(compute_true_score(&empty_disk).storage.score, 100.0);
}

#[test]
fn low_capacity_cutoff_is_configurable() {
    let info = CanonicalDeviceInfo {
        storage_total_gb: Some(64.0),
        storage_used_percent: Some(0.0),
        ..Default::default()
    };
    assert_eq!(compute_true_score(&info).storage.score, 100.0);
    let strict = ScoreSettings {
        low_capacity_storage_gb: 64.0,
        ..ScoreSettings::default()
    };
    assert_eq!(compute_true_score_with(&info, &strict).storage.score, 80.0);
}

#[test]
fn os_string_when_no_api_level() {
    let info = CanonicalDeviceInfo {
        os_version: Some("Android 12".into()),
        ..Default::default()
    };
    assert!(compute_true_score(&info).os.score > 50.0);
}

#[test]
fn every_score_stays_in_range() {
    for ram in [0.5, 2.0, 3.0, 12.0, 128.0] {
        for used in [0.0, 37.5, 100.0] {
            for cap in [500, 3000, 20_000] {
                let info = CanonicalDeviceInfo {
                    ram_gb: Some(ram),
                    storage_total_gb: Some(16.0),
                    storage_used_percent: Some(used),
                    battery_capacity_mah: Some(cap),
                    android_api_level: Some(40),
                    ..Default::default()
                };
                let s = compute_true_score(&info);
                assert!(in_range(s.final_score));
                assert!(in_range(s.battery.score) && in_range(s.storage.score));
                assert!(in_range(s.responsiveness.score) && in_range(s.os.score));
            }
        }
    }
}
