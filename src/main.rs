//! Device Health CLI: binary entrypoint
//! Reads an assessment payload (`{screenshot, web, snapshot, battery_samples}`)
//! from a JSON file and prints the assessment as pretty JSON.
//!
//! Usage: `device-health <payload.json>`

use anyhow::Context;
use device_health::{
    assess, metrics::Metrics, AssessmentInput, EngineConfig, EngineContext, IssueClassifier,
};
use std::{fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn flag(name: &str) -> bool {
    std::env::var(name).ok().is_some_and(|v| v == "1")
}

/// Tracing to stderr so stdout stays clean JSON.
/// `DEVICE_HEALTH_LOG_JSON=1` switches to the JSON formatter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("device_health=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if flag("DEVICE_HEALTH_LOG_JSON") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: device-health <payload.json>")?;

    let metrics = if flag("DEVICE_HEALTH_PRINT_METRICS") {
        Some(Metrics::init()?)
    } else {
        None
    };

    let cfg = EngineConfig::load()?;
    // No trained model ships with the CLI; diagnoses come back as unavailable.
    let ctx = EngineContext::from_config(&cfg, IssueClassifier::unavailable());

    let body = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read payload at {}", path.display()))?;
    let input: AssessmentInput = serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse payload at {}", path.display()))?;

    let assessment = assess(&input, &ctx);
    info!(score = assessment.health_score, "assessment ready");
    println!("{}", serde_json::to_string_pretty(&assessment)?);

    if let Some(m) = metrics {
        eprintln!("{}", m.render());
    }
    Ok(())
}
