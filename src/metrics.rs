//! Prometheus recorder + textfile export.

use std::path::Path;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const ENV_METRICS_TEXTFILE: &str = "FINDER_METRICS_TEXTFILE";

/// One-time metrics registration (so series carry help text).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("finder_postings_total", "Raw postings fetched from providers.");
        describe_counter!("finder_accepted_total", "Leads accepted (new and above threshold).");
        describe_counter!("finder_duplicates_total", "Leads dropped as already seen.");
        describe_counter!(
            "finder_rejected_total",
            "Postings rejected, labelled by stage (normalize, filter)."
        );
        describe_counter!("finder_augment_calls_total", "Borderline leads sent for augmentation.");
        describe_counter!("finder_provider_errors_total", "Provider fetch/parse errors.");
        describe_counter!("finder_runs_total", "Scheduled runs completed.");
        describe_gauge!("finder_last_run_ts", "Unix ts when the pipeline last finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Textfile-collector style: replace `path` atomically with the exposition.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        crate::store::write_atomic(path, self.render().as_bytes())
            .with_context(|| format!("writing metrics textfile {}", path.display()))
    }
}
