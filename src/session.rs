//! # Session Store
//! Per-session live state: battery sample window, telemetry snapshot, the
//! device record the user confirmed, and an event channel for subscribers.
//!
//! One coarse mutex guards the session map; every mutator and the expiry
//! sweep take it. The sweep is single-flight. Time comes from an injected
//! [`Clock`] so tests can drive expiry deterministically.

use serde::Serialize;
use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::device::{CanonicalDeviceInfo, LiveBattery, SessionSnapshot};
use crate::forecast::{BatteryForecaster, ForecastResult};
use crate::rolling::{BatterySample, SampleWindow};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_BUFFER: usize = 64;

pub trait Clock: Send + Sync {
    /// Epoch milliseconds.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Idle time after which a session is dropped.
    pub ttl: Duration,
    /// Age limit for retained battery samples.
    pub sample_window: Duration,
    pub sample_capacity: usize,
    pub sweep_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(120 * 60),
            sample_window: Duration::from_secs(30 * 60),
            sample_capacity: 360,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Carries the anonymised id.
    #[error("unknown session {0}")]
    UnknownSession(String),
}

/// What subscribers receive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Battery(BatterySample),
    Snapshot(SessionSnapshot),
    Prediction(Box<ForecastResult>),
}

/// Read-only copy of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub id: String,
    pub created_ms: i64,
    pub last_seen_ms: i64,
    pub snapshot: SessionSnapshot,
    pub device_info: Option<CanonicalDeviceInfo>,
    pub about_confirmed: bool,
    pub samples: Vec<BatterySample>,
}

struct Session {
    samples: SampleWindow,
    snapshot: SessionSnapshot,
    device_info: Option<CanonicalDeviceInfo>,
    about_confirmed: bool,
    created_ms: i64,
    last_seen_ms: i64,
    tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    fn new(now_ms: i64, settings: &SessionSettings) -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            samples: SampleWindow::with_window(settings.sample_window, settings.sample_capacity),
            snapshot: SessionSnapshot::default(),
            device_info: None,
            about_confirmed: false,
            created_ms: now_ms,
            last_seen_ms: now_ms,
            tx,
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    forecaster: BatteryForecaster,
    sweeping: AtomicBool,
    seq: AtomicU64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("settings", &self.settings)
            .field("sessions", &self.len())
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionSettings::default(), BatteryForecaster::default())
    }
}

impl SessionStore {
    pub fn new(settings: SessionSettings, forecaster: BatteryForecaster) -> Self {
        Self::with_clock(settings, forecaster, Arc::new(SystemClock))
    }

    /// Store with the `[session]` and `[forecast]` settings of `cfg`.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(
            cfg.session_settings(),
            BatteryForecaster::new(cfg.forecast_settings()),
        )
    }

    pub fn with_clock(
        settings: SessionSettings,
        forecaster: BatteryForecaster,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            settings,
            forecaster,
            sweeping: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().expect("session store mutex poisoned")
    }

    /// Start a session under a freshly generated id.
    pub fn create(&self) -> String {
        let now = self.clock.now_ms();
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = session_id(now, n);
        self.create_with_id(id)
    }

    /// Start a session under a caller-chosen id; an existing one is only touched.
    pub fn create_with_id(&self, id: impl Into<String>) -> String {
        let id = id.into();
        let now = self.clock.now_ms();
        let mut sessions = self.lock();
        sessions
            .entry(id.clone())
            .and_modify(|s| s.last_seen_ms = now)
            .or_insert_with(|| {
                info!(target: "session", session = %anon_id(&id), "session created");
                Session::new(now, &self.settings)
            });
        id
    }

    pub fn get(&self, id: &str) -> Option<SessionView> {
        let sessions = self.lock();
        sessions.get(id).map(|s| SessionView {
            id: id.to_string(),
            created_ms: s.created_ms,
            last_seen_ms: s.last_seen_ms,
            snapshot: s.snapshot.clone(),
            device_info: s.device_info.clone(),
            about_confirmed: s.about_confirmed,
            samples: s.samples.to_vec(),
        })
    }

    fn with_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Session, i64) -> T,
    ) -> Result<T, SessionError> {
        let now = self.clock.now_ms();
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownSession(anon_id(id)))?;
        session.last_seen_ms = now;
        Ok(f(session, now))
    }

    /// Store the device record for a session (replacing any earlier one).
    /// A new record needs confirming again.
    pub fn set_device_info(&self, id: &str, info: CanonicalDeviceInfo) -> Result<(), SessionError> {
        self.with_session(id, |s, _| {
            s.device_info = Some(info);
            s.about_confirmed = false;
        })
    }

    /// Mark the stored device record as confirmed by the user.
    pub fn confirm_about_info(&self, id: &str) -> Result<bool, SessionError> {
        self.with_session(id, |s, _| {
            s.about_confirmed = s.device_info.is_some();
            s.about_confirmed
        })
    }

    /// Merge a telemetry update into the snapshot. A live battery reading in
    /// the update is also recorded as a sample.
    pub fn update_snapshot(&self, id: &str, update: SessionSnapshot) -> Result<(), SessionError> {
        self.with_session(id, |s, now| {
            if let Some(live) = update.live {
                let sample = BatterySample::new(now, live.level, live.charging);
                if s.samples.record(sample, now) {
                    crate::metrics::record_battery_sample();
                    s.publish(SessionEvent::Battery(sample));
                }
            }
            s.snapshot.absorb(update);
            s.publish(SessionEvent::Snapshot(s.snapshot.clone()));
        })
    }

    /// Append a battery sample, creating the session on first use. A sample
    /// that is the newest in the window also becomes the live reading.
    /// Returns `false` if the sample was rejected (impossible level).
    pub fn push_battery_sample(&self, id: &str, sample: BatterySample) -> bool {
        let now = self.clock.now_ms();
        let mut sessions = self.lock();
        let session = sessions.entry(id.to_string()).or_insert_with(|| {
            info!(target: "session", session = %anon_id(id), "session created by first sample");
            Session::new(now, &self.settings)
        });
        session.last_seen_ms = now;
        let accepted = session.samples.record(sample, now);
        if accepted {
            // The newest sample is the live reading the forecaster trusts.
            if session.samples.latest().is_some_and(|l| l.ts <= sample.ts) {
                session.snapshot.live = Some(LiveBattery {
                    level: sample.pct,
                    charging: sample.charging,
                });
            }
            crate::metrics::record_battery_sample();
            session.publish(SessionEvent::Battery(sample));
        } else {
            debug!(target: "session", session = %anon_id(id), pct = sample.pct, "sample rejected");
        }
        accepted
    }

    /// Forecast from the session's window and snapshot; subscribers get the result too.
    pub fn forecast(&self, id: &str) -> Result<ForecastResult, SessionError> {
        self.with_session(id, |s, now| {
            s.samples.prune(now);
            let result = self
                .forecaster
                .compute_prediction(&s.samples.to_vec(), &s.snapshot);
            s.publish(SessionEvent::Prediction(Box::new(result.clone())));
            result
        })
    }

    pub fn subscribe(&self, id: &str) -> Result<broadcast::Receiver<SessionEvent>, SessionError> {
        self.with_session(id, |s, _| s.tx.subscribe())
    }

    /// Drop a subscription. Returns the number of subscribers left, if the
    /// session still exists.
    pub fn unsubscribe(&self, id: &str, rx: broadcast::Receiver<SessionEvent>) -> Option<usize> {
        drop(rx);
        let sessions = self.lock();
        sessions.get(id).map(|s| s.tx.receiver_count())
    }

    /// Expire idle sessions and prune old samples.
    ///
    /// Returns the number of sessions removed, or `None` if another sweep was
    /// already running.
    pub fn cleanup(&self) -> Option<usize> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let _gate = SweepGate(&self.sweeping);

        let now = self.clock.now_ms();
        let ttl_ms = i64::try_from(self.settings.ttl.as_millis()).unwrap_or(i64::MAX);
        let mut sessions = self.lock();
        let before = sessions.len();
        let mut pruned = 0usize;
        sessions.retain(|_, s| {
            if now.saturating_sub(s.last_seen_ms) > ttl_ms {
                return false;
            }
            pruned += s.samples.prune(now);
            true
        });
        let expired = before - sessions.len();
        drop(sessions);

        crate::metrics::record_sessions_expired(expired);
        if expired > 0 || pruned > 0 {
            info!(target: "session", expired, pruned, "session sweep");
        }
        Some(expired)
    }

    /// Periodic [`cleanup`](Self::cleanup) on the tokio runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let every = store.settings.sweep_interval.max(Duration::from_millis(10));
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if store.cleanup().is_none() {
                    debug!(target: "session", "sweep skipped, previous one still running");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears the single-flight flag even if the sweep panics.
struct SweepGate<'a>(&'a AtomicBool);

impl Drop for SweepGate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn session_id(now_ms: i64, seq: u64) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(now_ms.to_le_bytes());
    hasher.update(seq.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short SHA-256 prefix used in logs instead of the raw id.
pub(crate) fn anon_id(id: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(id.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
