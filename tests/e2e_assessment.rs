// tests/e2e_assessment.rs
// Whole pipeline from a client payload to a serialised assessment.
use device_health::classify::{ClassifierError, IssueModel};
use device_health::config::EngineConfig;
use device_health::{
    assess, AssessmentInput, EngineContext, ForecastStatus, HealthLabel, IssueClassifier,
    IssueLabel, Source,
};
use serde_json::json;
use std::sync::Arc;

fn input(v: serde_json::Value) -> AssessmentInput {
    serde_json::from_value(v).unwrap()
}

#[test]
fn healthy_phone_scores_well() {
    let payload = input(json!({
        "screenshot": {
            "ram_gb": 8,
            "storage_total_gb": 128,
            "storage_used_gb": 0,
            "battery_percent": 100,
            "os_version": "Android 14"
        },
        "snapshot": { "responsiveness": { "index": 100 } }
    }));
    let a = assess(&payload, &EngineContext::default());

    assert!(a.verified.verified_score > 80.0);
    assert!(a.verified.verified_score <= 100.0);
    assert_eq!(a.health_score, a.verified.verified_score);
    assert_eq!(a.health_label, HealthLabel::Good);
    assert!(!a.verified.has_missing_fields);
    // Percent stands in for capacity.
    assert!(a.verified.battery.uses_fallback);
    assert_eq!(a.verified.ram_responsiveness.score, 100.0);
    assert!(a.true_score.final_score > 70.0);
    assert!(a.legacy.final_score > 0.0);
}

#[test]
fn live_samples_drive_the_forecast() {
    let t0 = 1_700_000_000_000_i64;
    let payload = input(json!({
        "web": { "deviceMemory": 4, "battery": { "level": 50, "charging": false } },
        "snapshot": { "responsiveness": { "index": 55 } },
        "battery_samples": [
            { "ts": t0, "pct": 52.0 },
            { "ts": t0 + 120_000, "pct": 51.0 },
            { "ts": t0 + 240_000, "pct": 50.0 }
        ]
    }));
    let a = assess(&payload, &EngineContext::default());
    assert_eq!(a.forecast.status, ForecastStatus::Success);
    assert!(!a.forecast.used_fallback);
    assert_eq!(a.forecast.drain_per_min, Some(0.5));
    assert_eq!(a.forecast.current_battery, Some(50.0));
    assert_eq!(a.device.battery_percent, Some(50.0));
    assert_eq!(a.provenance["ram_gb"].source, Source::Web);
}

struct AlwaysSlow;

impl IssueModel for AlwaysSlow {
    fn predict(&self, _features: &[f64; 4]) -> Result<usize, ClassifierError> {
        Ok(IssueLabel::SlowPerformance.id())
    }
}

#[test]
fn configured_context_with_a_model() {
    let cfg = EngineConfig::from_toml_str("[forecast]\nthresholds = [50]\n").unwrap();
    let ctx = EngineContext::from_config(&cfg, IssueClassifier::new(Arc::new(AlwaysSlow)));
    let payload = input(json!({
        "screenshot": {
            "ram_gb": "3 GB",
            "storage_total_gb": "32 GB",
            "storage_used_gb": "30 GB",
            "battery_capacity_mah": "3000 mAh",
            "os_version": "Android 9"
        }
    }));
    let a = assess(&payload, &ctx);
    let d = a.diagnosis.diagnosis().expect("model is loaded");
    assert_eq!(d.label, IssueLabel::SlowPerformance);
    assert!(d.adjustments.is_empty());
    assert_eq!(a.forecast.status, ForecastStatus::InsufficientData);
    assert_eq!(a.forecast.predicted_time_to.len(), 1);
    assert!(a.health_score < 70.0);
}

#[test]
fn serialised_shape() {
    let a = assess(&AssessmentInput::default(), &EngineContext::default());
    let v = serde_json::to_value(&a).unwrap();
    for key in ["device", "merged", "provenance", "legacy", "true", "verified", "health_score", "diagnosis", "forecast"] {
        assert!(v.get(key).is_some(), "missing {key}");
    }
    assert_eq!(v["diagnosis"]["status"], "unavailable");
    assert_eq!(v["forecast"]["status"], "insufficient_data");
}
