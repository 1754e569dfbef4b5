//! Binary entrypoint.
//! Loads config, wires providers/filter/store/notifiers and runs the
//! pipeline once, or on an interval when `FINDER_INTERVAL_SECS` is set.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use job_lead_finder::filter::augment::build_augmenter;
use job_lead_finder::ingest::{build_providers, scheduler::run_on_interval};
use job_lead_finder::metrics::{Metrics, ENV_METRICS_TEXTFILE};
use job_lead_finder::{FileStore, FinderConfig, NotifierMux, Pipeline, RunOutcome, TechFilter};

/// Compact text logs by default; `FINDER_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("job_lead_finder=info,warn"));
    let json = std::env::var("FINDER_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!(error = ?e, "fatal");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when any run finished with notification failures.
async fn run() -> Result<bool> {
    let cfg = FinderConfig::load().context("loading finder config")?;

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "metrics recorder unavailable");
            None
        }
    };
    let textfile = std::env::var(ENV_METRICS_TEXTFILE).ok().map(PathBuf::from);

    let filter = TechFilter::new(cfg.filter.clone()).context("compiling filter rules")?;
    let providers = build_providers(&cfg.sources).context("building providers")?;
    if providers.is_empty() {
        warn!("no sources configured; runs will be empty");
    }
    let store = Arc::new(FileStore::new(&cfg.store.state_dir));
    let notifier = NotifierMux::from_config(&cfg.notify);
    let augmenter = build_augmenter(&cfg.ai);

    info!(
        state_dir = %cfg.store.state_dir.display(),
        providers = providers.len(),
        channels = ?notifier.channel_names(),
        augmenter = augmenter.provider_name(),
        threshold = filter.threshold(),
        dry_run = cfg.dry_run,
        "starting"
    );

    let pipeline = Pipeline::new(filter, store)
        .with_augmenter(augmenter)
        .with_notifier(notifier)
        .with_dry_run(cfg.dry_run);

    let export = |metrics: &Option<Metrics>| {
        if let (Some(m), Some(path)) = (metrics, textfile.as_ref()) {
            if let Err(e) = m.write_textfile(path) {
                warn!(error = ?e, "metrics textfile export failed");
            }
        }
    };

    let Some(secs) = cfg.interval_secs else {
        let outcome = pipeline.run_providers(&providers).await?;
        export(&metrics);
        report(&outcome);
        return Ok(outcome.is_clean());
    };

    let clean = std::cell::Cell::new(true);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    run_on_interval(Duration::from_secs(secs), shutdown, |tick| {
        let pipeline = &pipeline;
        let providers = &providers;
        let metrics = &metrics;
        let export = &export;
        let clean = &clean;
        async move {
            match pipeline.run_providers(providers).await {
                Ok(outcome) => {
                    report(&outcome);
                    clean.set(clean.get() && outcome.is_clean());
                }
                // A failed tick leaves the SeenSet as it was; the next tick retries.
                Err(e) => error!(tick, error = ?e, "run failed"),
            }
            export(metrics);
        }
    })
    .await;
    Ok(clean.get())
}

fn report(outcome: &RunOutcome) {
    for lead in &outcome.accepted {
        println!(
            "{:>5.1}  {:<10}  {} @ {}  {}",
            lead.score,
            lead.category,
            lead.title,
            lead.company,
            lead.url.as_deref().unwrap_or("-")
        );
    }
    let s = &outcome.summary;
    println!(
        "fetched={} accepted={} duplicates={} rejected={} notify_failures={}{}",
        s.fetched,
        s.accepted,
        s.duplicates,
        s.rejected_normalization + s.rejected_filter,
        outcome.notify_failures.len(),
        if outcome.dry_run { " (dry run)" } else { "" }
    );
}
