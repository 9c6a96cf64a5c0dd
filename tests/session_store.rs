// tests/session_store.rs
use device_health::config::EngineConfig;
use device_health::forecast::BatteryForecaster;
use device_health::session::{Clock, SessionSettings};
use device_health::{
    BatterySample, CanonicalDeviceInfo, ForecastStatus, LiveBattery, SessionError, SessionEvent,
    SessionSnapshot, SessionStore,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MIN: i64 = 60_000;

/// Clock the test moves by hand.
struct ManualClock(AtomicI64);

impl ManualClock {
    fn at(ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(ms)))
    }
    fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn store_with(clock: Arc<ManualClock>, settings: SessionSettings) -> SessionStore {
    SessionStore::with_clock(settings, BatteryForecaster::default(), clock)
}

#[test]
fn subscribers_see_samples_snapshots_and_predictions() {
    let clock = ManualClock::at(100 * MIN);
    let store = store_with(clock.clone(), SessionSettings::default());
    let id = store.create();
    let mut rx = store.subscribe(&id).unwrap();

    assert!(store.push_battery_sample(&id, BatterySample::new(clock.now() - 4 * MIN, 80.0, false)));
    assert!(store.push_battery_sample(&id, BatterySample::new(clock.now(), 78.0, false)));
    store
        .update_snapshot(
            &id,
            SessionSnapshot {
                responsiveness_index: Some(70.0),
                ..Default::default()
            },
        )
        .unwrap();
    let forecast = store.forecast(&id).unwrap();
    assert_eq!(forecast.status, ForecastStatus::Success);
    assert_eq!(forecast.drain_per_min, Some(0.5));

    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(match ev {
            SessionEvent::Battery(_) => "battery",
            SessionEvent::Snapshot(s) => {
                assert_eq!(s.responsiveness_index, Some(70.0));
                "snapshot"
            }
            SessionEvent::Prediction(p) => {
                assert_eq!(*p, forecast);
                "prediction"
            }
        });
    }
    assert_eq!(kinds, ["battery", "battery", "snapshot", "prediction"]);
}

#[test]
fn live_reading_in_snapshot_becomes_a_sample() {
    let clock = ManualClock::at(10 * MIN);
    let store = store_with(clock.clone(), SessionSettings::default());
    let id = store.create();
    store
        .update_snapshot(
            &id,
            SessionSnapshot {
                live: Some(LiveBattery {
                    level: 64.0,
                    charging: true,
                }),
                ..Default::default()
            },
        )
        .unwrap();
    let view = store.get(&id).unwrap();
    assert_eq!(view.samples.len(), 1);
    assert_eq!(view.samples[0].pct, 64.0);
    assert!(view.samples[0].charging);
    assert_eq!(store.forecast(&id).unwrap().status, ForecastStatus::ChargingPaused);
}

#[test]
fn newer_samples_supersede_an_earlier_live_reading() {
    let clock = ManualClock::at(50 * MIN);
    let store = store_with(clock.clone(), SessionSettings::default());
    let id = store.create();
    store
        .update_snapshot(
            &id,
            SessionSnapshot {
                live: Some(LiveBattery {
                    level: 80.0,
                    charging: false,
                }),
                ..Default::default()
            },
        )
        .unwrap();

    clock.advance(10 * MIN);
    assert!(store.push_battery_sample(&id, BatterySample::new(clock.now(), 70.0, false)));
    let r = store.forecast(&id).unwrap();
    assert_eq!(r.status, ForecastStatus::Success);
    assert_eq!(r.current_battery, Some(70.0));
    assert_eq!(r.battery_prediction[0], 70.0);

    clock.advance(MIN);
    assert!(store.push_battery_sample(&id, BatterySample::new(clock.now(), 70.5, true)));
    let r = store.forecast(&id).unwrap();
    assert_eq!(r.status, ForecastStatus::ChargingPaused);
    assert_eq!(r.current_battery, Some(70.5));
}

#[test]
fn late_sample_does_not_replace_newer_live_reading() {
    let clock = ManualClock::at(50 * MIN);
    let store = store_with(clock.clone(), SessionSettings::default());
    let id = store.create();
    store.push_battery_sample(&id, BatterySample::new(clock.now(), 60.0, true));
    // Arrives late, older than what the window already holds.
    store.push_battery_sample(&id, BatterySample::new(clock.now() - 2 * MIN, 64.0, false));
    let live = store.get(&id).unwrap().snapshot.live.unwrap();
    assert_eq!(live.level, 60.0);
    assert!(live.charging);
    assert_eq!(store.forecast(&id).unwrap().status, ForecastStatus::ChargingPaused);
}

#[test]
fn configured_session_settings_take_effect() {
    let cfg = EngineConfig::from_toml_str(
        "[session]\nsample_window_minutes = 1\nsample_capacity = 2\n\n[forecast]\nthresholds = [50]\n",
    )
    .unwrap();
    let store = SessionStore::from_config(&cfg);
    assert_eq!(store.settings().sample_window, Duration::from_secs(60));
    assert_eq!(store.settings().ttl, Duration::from_secs(120 * 60));

    let now = chrono::Utc::now().timestamp_millis();
    store.push_battery_sample("cfg", BatterySample::new(now - 5 * MIN, 90.0, false));
    assert!(store.get("cfg").unwrap().samples.is_empty());

    for (ago_ms, pct) in [(20_000, 80.0), (10_000, 79.0), (0, 78.0)] {
        store.push_battery_sample("cfg", BatterySample::new(now - ago_ms, pct, false));
    }
    let samples = store.get("cfg").unwrap().samples;
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].pct, 79.0);

    let r = store.forecast("cfg").unwrap();
    assert_eq!(r.predicted_time_to.keys().copied().collect::<Vec<_>>(), vec![50]);
}

#[test]
fn impossible_levels_are_rejected() {
    let store = SessionStore::default();
    assert!(!store.push_battery_sample("dev-1", BatterySample::new(0, 140.0, false)));
    assert!(!store.push_battery_sample("dev-1", BatterySample::new(0, f64::NAN, false)));
    // First sample still created the session.
    assert!(store.get("dev-1").unwrap().samples.is_empty());
}

#[test]
fn unknown_sessions_error() {
    let store = SessionStore::default();
    assert!(matches!(
        store.forecast("nope"),
        Err(SessionError::UnknownSession(_))
    ));
    assert!(store.subscribe("nope").is_err());
    assert!(store
        .update_snapshot("nope", SessionSnapshot::default())
        .is_err());
    assert!(store
        .set_device_info("nope", CanonicalDeviceInfo::default())
        .is_err());
    assert!(store.get("nope").is_none());
}

#[test]
fn confirmation_follows_the_device_record() {
    let store = SessionStore::default();
    let id = store.create_with_id("abc");
    assert!(!store.confirm_about_info(&id).unwrap());

    let info = CanonicalDeviceInfo {
        ram_gb: Some(6.0),
        ..Default::default()
    };
    store.set_device_info(&id, info.clone()).unwrap();
    assert!(store.confirm_about_info(&id).unwrap());
    assert!(store.get(&id).unwrap().about_confirmed);

    // Replacing the record clears the confirmation.
    store.set_device_info(&id, info).unwrap();
    assert!(!store.get(&id).unwrap().about_confirmed);
}

#[test]
fn unsubscribe_reports_remaining_receivers() {
    let store = SessionStore::default();
    let id = store.create();
    let a = store.subscribe(&id).unwrap();
    let _b = store.subscribe(&id).unwrap();
    assert_eq!(store.unsubscribe(&id, a), Some(1));
    let c = store.subscribe(&id).unwrap();
    assert_eq!(store.unsubscribe("gone", c), None);
}

#[test]
fn idle_sessions_expire_and_old_samples_are_pruned() {
    let clock = ManualClock::at(1_000 * MIN);
    let settings = SessionSettings {
        ttl: Duration::from_secs(10 * 60),
        ..SessionSettings::default()
    };
    let store = store_with(clock.clone(), settings);
    let idle = store.create_with_id("idle");
    let busy = store.create_with_id("busy");
    store.push_battery_sample(&busy, BatterySample::new(clock.now(), 90.0, false));

    clock.advance(8 * MIN);
    store.push_battery_sample(&busy, BatterySample::new(clock.now(), 88.0, false));
    assert_eq!(store.cleanup(), Some(0));

    clock.advance(5 * MIN);
    assert_eq!(store.cleanup(), Some(1));
    assert!(store.get(&idle).is_none());
    assert_eq!(store.get(&busy).unwrap().samples.len(), 2);

    // Samples older than the 30 minute window go, the session stays while touched.
    clock.advance(25 * MIN);
    store.push_battery_sample(&busy, BatterySample::new(clock.now(), 70.0, false));
    assert_eq!(store.cleanup(), Some(0));
    let samples = store.get(&busy).unwrap().samples;
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].pct, 88.0);
}

#[tokio::test]
async fn sweeper_expires_in_the_background() {
    let clock = ManualClock::at(5 * MIN);
    let settings = SessionSettings {
        ttl: Duration::from_secs(60),
        sweep_interval: Duration::from_millis(20),
        ..SessionSettings::default()
    };
    let store = Arc::new(store_with(clock.clone(), settings));
    store.create();
    store.create();
    let handle = store.spawn_sweeper();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(store.len(), 2);

    clock.advance(2 * MIN);
    let mut waited = 0;
    while !store.is_empty() && waited < 50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += 1;
    }
    assert!(store.is_empty());
    handle.abort();
}
