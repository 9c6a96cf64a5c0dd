// src/lib.rs
// Public library surface for the CLI and integration tests.

pub mod classify;
pub mod config;
pub mod device;
pub mod engine;
pub mod forecast;
pub mod merge;
pub mod metrics;
pub mod normalize;
pub mod rolling;
pub mod score;
pub mod session;

// ---- Re-exports for stable public API ----
pub use crate::classify::{ClassifierError, DiagnosisOutcome, IssueClassifier, IssueLabel, IssueModel};
pub use crate::config::EngineConfig;
pub use crate::device::{CanonicalDeviceInfo, LiveBattery, RawFieldMap, SessionSnapshot};
pub use crate::engine::{assess, AssessmentInput, DeviceAssessment, EngineContext};
pub use crate::forecast::{compute_prediction, BatteryForecaster, ForecastResult, ForecastStatus};
pub use crate::merge::{merge, MergedDeviceInfo, Source, Tagged};
pub use crate::normalize::{normalize, FieldNormalizer};
pub use crate::rolling::{BatterySample, SampleWindow};
pub use crate::score::{
    compute_performance_score, compute_true_score, compute_verified_score, HealthLabel,
    ScoreComponent,
};
pub use crate::session::{SessionError, SessionEvent, SessionStore};
