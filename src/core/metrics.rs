use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_generation_attempt(model: &str, outcome: &'static str) {
    metrics::counter!(
        "question_generation_attempts_total",
        "model" => model.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub(crate) fn record_submission(outcome: &'static str) {
    metrics::counter!("attempt_submissions_total", "outcome" => outcome).increment(1);
}
