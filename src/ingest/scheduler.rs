// src/ingest/scheduler.rs
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::time::MissedTickBehavior;

/// Run `tick` immediately and then every `period` until `shutdown` resolves.
/// Ticks never overlap; a slow tick delays the next one instead of bursting.
/// Returns the number of completed ticks.
pub async fn run_on_interval<F, Fut, S>(period: Duration, shutdown: S, mut tick: F) -> u64
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = ()>,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut n = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                tick(n).await;
                n += 1;
                counter!("finder_runs_total").increment(1);
            }
        }
    }
    tracing::info!(target: "ingest", ticks = n, "scheduler stopped");
    n
}
