//! # Issue Classifier
//! Thin wrapper over a pre-trained issue model (`IssueModel`), plus the
//! deterministic post-hoc rules that keep its label consistent with the device
//! profile:
//!
//! 1. Connectivity label without any connectivity distress -> best other label.
//! 2. Storage label on a large device without a confident model -> Slow Performance.
//! 3. Healthy-looking profile without a confident model -> No Major Issues.
//! 4. Classifier performance score: >= 80 (unless very confident) and >= 85
//!    force No Major Issues; >= 70 turns Slow Performance into Minor Optimization.
//!
//! The classifier performance score has its own weights (RAM 30 / storage 25 /
//! battery 25 / OS 20) and is deliberately not the health composite.

use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::device::{CanonicalDeviceInfo, SessionSnapshot};
use crate::normalize::leading_number;
use crate::score::curves::android_release_for_api;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("issue classifier is not loaded")]
    Unavailable,
    #[error("issue classifier failed: {0}")]
    Model(String),
}

/// Issue labels in model id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueLabel {
    BatteryDrainingFast,
    DeviceOverheating,
    SlowPerformance,
    StorageIssues,
    AppCrashes,
    ConnectivityProblems,
    NoMajorIssues,
    MinorOptimization,
}

impl IssueLabel {
    pub const ALL: [IssueLabel; 8] = [
        IssueLabel::BatteryDrainingFast,
        IssueLabel::DeviceOverheating,
        IssueLabel::SlowPerformance,
        IssueLabel::StorageIssues,
        IssueLabel::AppCrashes,
        IssueLabel::ConnectivityProblems,
        IssueLabel::NoMajorIssues,
        IssueLabel::MinorOptimization,
    ];

    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    pub fn id(self) -> usize {
        self as usize
    }

    pub fn title(self) -> &'static str {
        match self {
            IssueLabel::BatteryDrainingFast => "Battery Draining Fast",
            IssueLabel::DeviceOverheating => "Device Overheating",
            IssueLabel::SlowPerformance => "Slow Performance",
            IssueLabel::StorageIssues => "Storage Issues",
            IssueLabel::AppCrashes => "App Crashes",
            IssueLabel::ConnectivityProblems => "Connectivity Problems",
            IssueLabel::NoMajorIssues => "No Major Issues Detected",
            IssueLabel::MinorOptimization => "Minor Optimization Opportunities",
        }
    }

    pub fn solution(self) -> &'static str {
        match self {
            IssueLabel::BatteryDrainingFast => "Check for battery-intensive apps, reduce screen brightness, disable unused connectivity features (Bluetooth, WiFi, GPS), and consider battery replacement if the device is older than 2 years.",
            IssueLabel::DeviceOverheating => "Close background apps, remove phone case while charging, avoid using phone while charging, update software, and avoid direct sunlight exposure.",
            IssueLabel::SlowPerformance => "Clear cache, uninstall unused apps, check for available storage space, restart your device regularly, and consider factory reset if problems persist.",
            IssueLabel::StorageIssues => "Delete unused apps and media, clear app caches, move photos/videos to cloud storage, and use file manager apps to identify large files.",
            IssueLabel::AppCrashes => "Update apps to latest versions, clear app cache, ensure sufficient storage space, and reinstall problematic apps.",
            IssueLabel::ConnectivityProblems => "Toggle airplane mode, restart device, reset network settings, update software, and check for carrier outages.",
            IssueLabel::NoMajorIssues => "Your device appears healthy based on available indicators. Keep your software up to date, clear cache periodically, and monitor battery and storage for best performance.",
            IssueLabel::MinorOptimization => "Your device is generally healthy. For best responsiveness, clear cache, remove rarely used apps, keep at least 20% storage free, and reboot periodically.",
        }
    }
}

impl fmt::Display for IssueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Model input: `[ram_gb, os_version, storage_gb, battery_mah]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IssueFeatures {
    pub ram_gb: f64,
    pub os_version: f64,
    pub storage_gb: f64,
    pub battery_mah: f64,
}

impl IssueFeatures {
    /// `None` when any of the four inputs is unknown.
    pub fn from_device(info: &CanonicalDeviceInfo) -> Option<Self> {
        let os_version = info
            .os_version
            .as_deref()
            .and_then(leading_number)
            .or_else(|| {
                info.android_api_level
                    .and_then(android_release_for_api)
                    .map(f64::from)
            })?;
        Some(Self {
            ram_gb: info.ram_gb?,
            os_version,
            storage_gb: info.storage_total_gb?,
            battery_mah: f64::from(info.battery_capacity_mah?),
        })
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.ram_gb, self.os_version, self.storage_gb, self.battery_mah]
    }
}

/// The pre-trained black box.
pub trait IssueModel: Send + Sync {
    fn predict(&self, features: &[f64; 4]) -> Result<usize, ClassifierError>;

    /// Per-label probabilities in id order, when the model exposes them.
    fn predict_proba(&self, _features: &[f64; 4]) -> Option<Vec<f64>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentRule {
    ConnectivityWithoutDistress,
    StorageOnLargeDevice,
    HealthyProfile,
    StrongPerformance,
    HighPerformance,
    MinorOptimization,
}

impl AdjustmentRule {
    pub fn as_str(self) -> &'static str {
        match self {
            AdjustmentRule::ConnectivityWithoutDistress => "connectivity_without_distress",
            AdjustmentRule::StorageOnLargeDevice => "storage_on_large_device",
            AdjustmentRule::HealthyProfile => "healthy_profile",
            AdjustmentRule::StrongPerformance => "strong_performance",
            AdjustmentRule::HighPerformance => "high_performance",
            AdjustmentRule::MinorOptimization => "minor_optimization",
        }
    }
}

/// One label change made on top of the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub rule: AdjustmentRule,
    pub from: IssueLabel,
    pub to: IssueLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub label: IssueLabel,
    pub issue: String,
    pub solution: String,
    pub model_label: IssueLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Vec<f64>>,
    /// Classifier performance score, 0–100.
    pub performance_score: f64,
    pub adjustments: Vec<Adjustment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiagnosisOutcome {
    Diagnosed(Diagnosis),
    Unavailable { issue: String, solution: String },
}

impl DiagnosisOutcome {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        DiagnosisOutcome::Unavailable {
            issue: "Diagnosis unavailable".to_string(),
            solution: reason.into(),
        }
    }

    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            DiagnosisOutcome::Diagnosed(d) => Some(d),
            DiagnosisOutcome::Unavailable { .. } => None,
        }
    }
}

const SMALL_STORAGE_GB: f64 = 32.0;
const LARGE_STORAGE_GB: f64 = 64.0;
const STORAGE_CONFIDENCE: f64 = 0.6;
const HEALTHY_CONFIDENCE: f64 = 0.8;
const STRONG_SCORE: f64 = 80.0;
const STRONG_CONFIDENCE: f64 = 0.85;
const HIGH_SCORE: f64 = 85.0;
const MINOR_SCORE: f64 = 70.0;

#[derive(Clone, Default)]
pub struct IssueClassifier {
    model: Option<Arc<dyn IssueModel>>,
}

impl fmt::Debug for IssueClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssueClassifier")
            .field("loaded", &self.model.is_some())
            .finish()
    }
}

impl IssueClassifier {
    pub fn new(model: Arc<dyn IssueModel>) -> Self {
        Self { model: Some(model) }
    }

    /// A classifier with no model; every call fails with `Unavailable`.
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Diagnose a device record. Missing inputs give an `Unavailable` outcome
    /// without touching the model; a missing or failing model is an error.
    pub fn diagnose(
        &self,
        info: &CanonicalDeviceInfo,
        network: &SessionSnapshot,
    ) -> Result<DiagnosisOutcome, ClassifierError> {
        match IssueFeatures::from_device(info) {
            Some(features) => self.classify(&features, network).map(DiagnosisOutcome::Diagnosed),
            None => {
                debug!(target: "classify", "device record lacks classifier inputs");
                Ok(DiagnosisOutcome::unavailable(
                    "Insufficient device parameters to run model.",
                ))
            }
        }
    }

    pub fn classify(
        &self,
        features: &IssueFeatures,
        network: &SessionSnapshot,
    ) -> Result<Diagnosis, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::Unavailable)?;
        let x = features.as_array();
        let id = model.predict(&x)?;
        let model_label = IssueLabel::from_id(id)
            .ok_or_else(|| ClassifierError::Model(format!("unknown label id {id}")))?;
        let proba = model
            .predict_proba(&x)
            .filter(|p| p.len() >= IssueLabel::ALL.len() && p.iter().all(|v| v.is_finite()));

        let mut adj = Adjuster::new(model_label);
        adjust(&mut adj, features, proba.as_deref(), network);
        let performance_score = adj.performance_score;

        for a in &adj.applied {
            crate::metrics::record_override(a.rule.as_str());
        }
        if !adj.applied.is_empty() {
            debug!(
                target: "classify",
                model = %model_label,
                label = %adj.label,
                rules = adj.applied.len(),
                "classifier label adjusted"
            );
        }

        let label = adj.label;
        Ok(Diagnosis {
            label,
            issue: label.title().to_string(),
            solution: label.solution().to_string(),
            model_label,
            confidence: proba,
            performance_score,
            adjustments: adj.applied,
        })
    }
}

struct Adjuster {
    label: IssueLabel,
    applied: Vec<Adjustment>,
    performance_score: f64,
}

impl Adjuster {
    fn new(label: IssueLabel) -> Self {
        Self {
            label,
            applied: Vec::new(),
            performance_score: 0.0,
        }
    }

    fn set(&mut self, rule: AdjustmentRule, to: IssueLabel) {
        if self.label != to {
            self.applied.push(Adjustment {
                rule,
                from: self.label,
                to,
            });
            self.label = to;
        }
    }
}

fn adjust(
    adj: &mut Adjuster,
    f: &IssueFeatures,
    proba: Option<&[f64]>,
    network: &SessionSnapshot,
) {
    let max_conf = proba.and_then(|p| p.iter().copied().reduce(f64::max));

    if adj.label == IssueLabel::ConnectivityProblems && !is_connectivity_bad(network) {
        let repick = match proba {
            Some(p) => best_other_than(p, IssueLabel::ConnectivityProblems),
            None if f.storage_gb <= SMALL_STORAGE_GB => Some(IssueLabel::StorageIssues),
            None => Some(IssueLabel::SlowPerformance),
        };
        if let Some(to) = repick {
            adj.set(AdjustmentRule::ConnectivityWithoutDistress, to);
        }
    }

    if adj.label == IssueLabel::StorageIssues
        && f.storage_gb > LARGE_STORAGE_GB
        && max_conf.map_or(true, |c| c < STORAGE_CONFIDENCE)
    {
        adj.set(AdjustmentRule::StorageOnLargeDevice, IssueLabel::SlowPerformance);
    }

    let looks_healthy = (f.ram_gb >= 6.0 || f.os_version >= 12.0)
        && f.storage_gb >= LARGE_STORAGE_GB
        && f.battery_mah >= 4000.0;
    if looks_healthy && max_conf.map_or(true, |c| c < HEALTHY_CONFIDENCE) {
        adj.set(AdjustmentRule::HealthyProfile, IssueLabel::NoMajorIssues);
    }

    let score = classifier_performance_score(f);
    adj.performance_score = score;
    if score >= STRONG_SCORE && max_conf.map_or(true, |c| c < STRONG_CONFIDENCE) {
        adj.set(AdjustmentRule::StrongPerformance, IssueLabel::NoMajorIssues);
    }
    if score >= HIGH_SCORE {
        adj.set(AdjustmentRule::HighPerformance, IssueLabel::NoMajorIssues);
    } else if score >= MINOR_SCORE && adj.label == IssueLabel::SlowPerformance {
        adj.set(AdjustmentRule::MinorOptimization, IssueLabel::MinorOptimization);
    }
}

fn best_other_than(proba: &[f64], exclude: IssueLabel) -> Option<IssueLabel> {
    proba
        .iter()
        .enumerate()
        .take(IssueLabel::ALL.len())
        .filter(|(i, _)| *i != exclude.id())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .and_then(|(i, _)| IssueLabel::from_id(i))
}

/// Rounded 0–100 score with the classifier's own weights.
pub fn classifier_performance_score(f: &IssueFeatures) -> f64 {
    let part = |v: f64| v.clamp(0.0, 100.0);
    let ram = part(f.ram_gb / 12.0 * 100.0);
    let storage = part(f.storage_gb / 128.0 * 100.0);
    let battery = part(f.battery_mah / 5000.0 * 100.0);
    let os = part((f.os_version - 8.0) / 6.0 * 100.0);
    (0.30 * ram + 0.25 * storage + 0.25 * battery + 0.20 * os).round()
}

/// Offline, under 1 Mbps, or a network type of `offline`/`none`.
pub fn is_connectivity_bad(network: &SessionSnapshot) -> bool {
    if network.online == Some(false) {
        return true;
    }
    if network.network_speed_mbps.is_some_and(|s| s < 1.0) {
        return true;
    }
    matches!(network.network_type.as_deref(), Some("offline") | Some("none"))
}

/// Log and flatten a classifier failure into the outcome callers report.
pub fn outcome_or_unavailable(result: Result<DiagnosisOutcome, ClassifierError>) -> DiagnosisOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(target: "classify", error = %e, "diagnosis unavailable");
            DiagnosisOutcome::unavailable(e.to_string())
        }
    }
}
