// tests/scoring_verified.rs
use device_health::score::compute_verified_score;
use device_health::{CanonicalDeviceInfo, SessionSnapshot};

fn snap(index: f64) -> SessionSnapshot {
    SessionSnapshot {
        responsiveness_index: Some(index),
        ..Default::default()
    }
}

#[test]
fn ram_responsiveness_blend_is_exact() {
    let info = CanonicalDeviceInfo {
        ram_gb: Some(8.0),
        ..Default::default()
    };
    let s = compute_verified_score(&info, Some(&snap(75.0)));
    assert_eq!(s.ram_responsiveness.score, 87.5);
    assert!(!s.ram_responsiveness.uses_fallback);
}

#[test]
fn responsiveness_defaults_to_fifty() {
    let info = CanonicalDeviceInfo {
        ram_gb: Some(4.0),
        ..Default::default()
    };
    let s = compute_verified_score(&info, None);
    // 0.5 * 50 + 0.5 * 50
    assert_eq!(s.ram_responsiveness.score, 50.0);
    assert!(s.ram_responsiveness.uses_fallback);
    assert!(!s.ram_responsiveness.defaulted);
}

#[test]
fn os_anchors() {
    let os = |v: &str| {
        let info = CanonicalDeviceInfo {
            os_version: Some(v.to_string()),
            ..Default::default()
        };
        compute_verified_score(&info, None).os.score
    };
    assert_eq!(os("Android 13"), 100.0);
    assert_eq!(os("Android 7"), 50.0);
    assert_eq!(os("Android 8"), 50.0);
    assert_eq!(os("Android 9"), 62.5);
    assert_eq!(os("Android 11"), 87.5);
}

#[test]
fn storage_extremes() {
    let used = |u: f64| {
        let info = CanonicalDeviceInfo {
            storage_total_gb: Some(256.0),
            storage_used_gb: Some(u),
            ..Default::default()
        };
        compute_verified_score(&info, None).storage.score
    };
    assert_eq!(used(256.0), 0.0);
    assert_eq!(used(0.0), 100.0);

    let no_total = CanonicalDeviceInfo {
        storage_used_percent: Some(20.0),
        ..Default::default()
    };
    let s = compute_verified_score(&no_total, None);
    assert_eq!(s.storage.score, 50.0);
    assert!(s.storage.uses_fallback);
}

#[test]
fn missing_fields_flag_and_literal_fifty() {
    let info = CanonicalDeviceInfo {
        ram_gb: Some(8.0),
        storage_total_gb: Some(128.0),
        storage_used_gb: Some(64.0),
        ..Default::default()
    };
    let s = compute_verified_score(&info, Some(&snap(100.0)));
    assert!(s.has_missing_fields);
    assert_eq!(s.battery.score, 50.0);
    assert_eq!(s.os.score, 50.0);
    assert!(s.battery.defaulted && s.os.defaulted);
    assert!(!s.storage.defaulted);
}

#[test]
fn complete_record_has_no_missing_fields() {
    let info = CanonicalDeviceInfo {
        ram_gb: Some(6.0),
        storage_total_gb: Some(128.0),
        storage_used_gb: Some(32.0),
        battery_capacity_mah: Some(5000),
        os_version: Some("Android 14".into()),
        ..Default::default()
    };
    let s = compute_verified_score(&info, Some(&snap(60.0)));
    assert!(!s.has_missing_fields);
    assert!(s.verified_score > 0.0 && s.verified_score <= 100.0);
}

#[test]
fn maximal_inputs_clamp_to_hundred() {
    let info = CanonicalDeviceInfo {
        ram_gb: Some(128.0),
        storage_total_gb: Some(1024.0),
        storage_used_gb: Some(0.0),
        battery_capacity_mah: Some(20_000),
        os_version: Some("Android 15".into()),
        ..Default::default()
    };
    let s = compute_verified_score(&info, Some(&snap(100.0)));
    assert_eq!(s.verified_score, 100.0);
}
