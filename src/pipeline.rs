//! Run orchestration: raw batch → normalize → filter (→ augment) → dedup →
//! persist → commit SeenSet → notify.
//!
//! A run is atomic with respect to the SeenSet: new ids are staged in a
//! `DedupGate` and committed in one store call after the ledger append.
//! Any store failure before that point leaves the committed set untouched.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dedup::DedupGate;
use crate::error::{NormalizationError, RunError};
use crate::filter::augment::{DisabledAugmenter, DynAugmenter};
use crate::filter::{FilterVerdict, TechFilter};
use crate::ingest::types::SourceProvider;
use crate::lead::{Lead, RawPosting};
use crate::normalize::normalize;
use crate::notify::{NotifierMux, NotifyFailure};
use crate::store::LeadStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Filter,
    Duplicate,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Filter => "filter",
            Stage::Duplicate => "duplicate",
        }
    }
}

/// One dropped item, for the run log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    /// Position in the input batch.
    pub index: usize,
    pub stage: Stage,
    pub reason: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub provider_errors: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected_normalization: usize,
    pub rejected_filter: usize,
    pub augmented: usize,
    pub augment_unavailable: usize,
    /// Non-empty location text that yielded no geography or work-mode facts.
    pub location_unparsed: usize,
    pub rejections: Vec<Rejection>,
}

impl RunSummary {
    fn reject(&mut self, index: usize, stage: Stage, reason: String, id: Option<String>) {
        match stage {
            Stage::Normalize => self.rejected_normalization += 1,
            Stage::Filter => self.rejected_filter += 1,
            Stage::Duplicate => self.duplicates += 1,
        }
        self.rejections.push(Rejection {
            index,
            stage,
            reason,
            id,
        });
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    /// Accepted, new leads in batch order.
    pub accepted: Vec<Lead>,
    pub notify_failures: Vec<NotifyFailure>,
    pub dry_run: bool,
}

impl RunOutcome {
    pub fn is_clean(&self) -> bool {
        self.notify_failures.is_empty()
    }
}

pub struct Pipeline {
    filter: TechFilter,
    store: Arc<dyn LeadStore>,
    augmenter: DynAugmenter,
    notifier: NotifierMux,
    dry_run: bool,
}

type Evaluated = Result<(Lead, FilterVerdict), NormalizationError>;

impl Pipeline {
    pub fn new(filter: TechFilter, store: Arc<dyn LeadStore>) -> Self {
        Self {
            filter,
            store,
            augmenter: Arc::new(DisabledAugmenter),
            notifier: NotifierMux::new(),
            dry_run: false,
        }
    }

    pub fn with_augmenter(mut self, augmenter: DynAugmenter) -> Self {
        self.augmenter = augmenter;
        self
    }

    pub fn with_notifier(mut self, notifier: NotifierMux) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_dry_run(mut self, on: bool) -> Self {
        self.dry_run = on;
        self
    }

    pub fn filter(&self) -> &TechFilter {
        &self.filter
    }

    /// Fetch from every provider, then `run` the merged batch.
    pub async fn run_providers(
        &self,
        providers: &[Box<dyn SourceProvider>],
    ) -> Result<RunOutcome, RunError> {
        let (batch, provider_errors) = crate::ingest::fetch_all(providers).await;
        let mut outcome = self.run(batch).await?;
        outcome.summary.provider_errors = provider_errors;
        Ok(outcome)
    }

    /// Process one already-fetched batch.
    pub async fn run(&self, batch: Vec<RawPosting>) -> Result<RunOutcome, RunError> {
        crate::metrics::ensure_metrics_described();
        self.augmenter.begin_run();
        let now = Utc::now();

        let committed = self
            .store
            .load_seen_set()
            .await
            .map_err(RunError::LoadSeenSet)?;

        let mut summary = RunSummary {
            fetched: batch.len(),
            ..Default::default()
        };

        // Pure stage; may run in parallel, order is preserved.
        let evaluated = evaluate_batch(&self.filter, &batch);

        // Sequential stage: known-id check, augmentation, check-and-insert.
        let mut gate = DedupGate::new(committed);
        let mut accepted = Vec::new();

        for (index, item) in evaluated.into_iter().enumerate() {
            let (mut lead, mut verdict) = match item {
                Ok(v) => v,
                Err(e) => {
                    debug!(target: "pipeline", index, error = %e, "normalization rejected");
                    summary.reject(index, Stage::Normalize, e.to_string(), None);
                    continue;
                }
            };

            if !lead.location.raw.is_empty() && lead.location.is_unknown() {
                summary.location_unparsed += 1;
            }

            // Known ids are duplicates regardless of this run's verdict.
            if gate.is_known(&lead.id) {
                debug!(target: "pipeline", id = lead.short_id(), "duplicate");
                summary.reject(index, Stage::Duplicate, "already-seen".into(), Some(lead.id));
                continue;
            }

            if self.augmenter.is_enabled() && self.filter.is_borderline(&verdict) {
                counter!("finder_augment_calls_total").increment(1);
                match self
                    .augmenter
                    .try_augment(&lead, &verdict, self.filter.threshold())
                    .await
                {
                    Some(aug) => {
                        verdict = self.filter.apply_augmentation(verdict, &aug);
                        summary.augmented += 1;
                    }
                    None => summary.augment_unavailable += 1,
                }
            }

            verdict.apply_to(&mut lead);

            if !verdict.accept {
                let reason = verdict.excluded_by.clone().unwrap_or_else(|| {
                    format!(
                        "below-threshold: {:.2} < {:.2}",
                        verdict.score,
                        self.filter.threshold()
                    )
                });
                debug!(target: "pipeline", id = lead.short_id(), %reason, "filtered out");
                summary.reject(index, Stage::Filter, reason, Some(lead.id));
                continue;
            }

            if gate.check_and_insert(&lead.id, now) {
                lead.first_seen_at = now;
                debug!(target: "pipeline", id = lead.short_id(), score = lead.score, category = %lead.category, "accepted");
                accepted.push(lead);
            }
        }
        summary.accepted = accepted.len();

        let (next_seen, staged) = gate.finish();

        let notify_failures = if self.dry_run {
            info!(target: "pipeline", accepted = accepted.len(), "dry run: skipping persist, commit and notify");
            Vec::new()
        } else {
            if !staged.is_empty() {
                self.store
                    .persist(&accepted)
                    .await
                    .map_err(RunError::Persist)?;
                self.store
                    .commit_seen_set(&next_seen)
                    .await
                    .map_err(RunError::CommitSeenSet)?;
            }
            self.notifier.dispatch(&accepted).await
        };

        record_metrics(&summary);
        info!(
            target: "pipeline",
            fetched = summary.fetched,
            accepted = summary.accepted,
            duplicates = summary.duplicates,
            rejected_normalization = summary.rejected_normalization,
            rejected_filter = summary.rejected_filter,
            augmented = summary.augmented,
            location_unparsed = summary.location_unparsed,
            notify_failures = notify_failures.len(),
            dry_run = self.dry_run,
            "run finished"
        );
        if !notify_failures.is_empty() {
            warn!(target: "pipeline", failures = notify_failures.len(), "some notifications failed");
        }

        Ok(RunOutcome {
            summary,
            accepted,
            notify_failures,
            dry_run: self.dry_run,
        })
    }
}

fn evaluate_one(filter: &TechFilter, raw: &RawPosting) -> Evaluated {
    let lead = normalize(raw)?;
    let verdict = filter.evaluate(&lead);
    Ok((lead, verdict))
}

#[cfg(feature = "rayon")]
fn evaluate_batch(filter: &TechFilter, batch: &[RawPosting]) -> Vec<Evaluated> {
    use rayon::prelude::*;
    batch.par_iter().map(|raw| evaluate_one(filter, raw)).collect()
}

#[cfg(not(feature = "rayon"))]
fn evaluate_batch(filter: &TechFilter, batch: &[RawPosting]) -> Vec<Evaluated> {
    batch.iter().map(|raw| evaluate_one(filter, raw)).collect()
}

fn record_metrics(s: &RunSummary) {
    counter!("finder_accepted_total").increment(s.accepted as u64);
    counter!("finder_duplicates_total").increment(s.duplicates as u64);
    counter!("finder_rejected_total", "stage" => Stage::Normalize.as_str())
        .increment(s.rejected_normalization as u64);
    counter!("finder_rejected_total", "stage" => Stage::Filter.as_str())
        .increment(s.rejected_filter as u64);
    gauge!("finder_last_run_ts").set(Utc::now().timestamp() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterConfig, KeywordRule};
    use crate::store::MemoryStore;

    fn filter() -> TechFilter {
        TechFilter::new(FilterConfig {
            threshold: 2.0,
            positive: vec![KeywordRule::keyword("engineer", 1.0)],
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn summary_counts_every_item() {
        let store = Arc::new(MemoryStore::new());
        let p = Pipeline::new(filter(), store.clone());
        let batch = vec![
            RawPosting::new("lever", "Engineer").with_company("A"),
            RawPosting::new("lever", "  ").with_company("A"),
            RawPosting::new("lever", "Recruiter").with_company("A"),
            RawPosting::new("lever", "Engineer").with_company("A"),
        ];
        let out = p.run(batch).await.unwrap();
        let s = &out.summary;
        assert_eq!(s.fetched, 4);
        assert_eq!(s.accepted, 1);
        assert_eq!(s.rejected_normalization, 1);
        assert_eq!(s.rejected_filter, 1);
        assert_eq!(s.duplicates, 1);
        assert_eq!(s.rejections[0].stage, Stage::Normalize);
        assert_eq!(s.rejections[0].index, 1);
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn evaluation_keeps_batch_order() {
        let f = filter();
        let batch: Vec<RawPosting> = (0..300)
            .map(|i| {
                let title = if i % 7 == 0 { String::new() } else { format!("Engineer {i}") };
                RawPosting::new("lever", title).with_company("A")
            })
            .collect();
        let out = evaluate_batch(&f, &batch);
        assert_eq!(out.len(), batch.len());
        for (i, item) in out.iter().enumerate() {
            match item {
                Ok((lead, _)) => assert_eq!(lead.title, format!("Engineer {i}")),
                Err(_) => assert_eq!(i % 7, 0, "only blank titles fail, got {i}"),
            }
        }
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_evaluation_matches_sequential() {
        let f = filter();
        let batch: Vec<RawPosting> = (0..1_000)
            .map(|i| RawPosting::new("lever", format!("Engineer {i}")).with_company("A"))
            .collect();
        let parallel = evaluate_batch(&f, &batch);
        let sequential: Vec<Evaluated> = batch.iter().map(|raw| evaluate_one(&f, raw)).collect();
        assert_eq!(parallel, sequential);
    }

    #[tokio::test]
    async fn nothing_new_means_no_store_writes() {
        let store = Arc::new(MemoryStore::new());
        let p = Pipeline::new(filter(), store.clone());
        let out = p
            .run(vec![RawPosting::new("lever", "Recruiter").with_company("A")])
            .await
            .unwrap();
        assert!(out.accepted.is_empty());
        assert_eq!(store.commit_count(), 0);
        assert!(store.leads().is_empty());
    }

    #[tokio::test]
    async fn dry_run_leaves_store_untouched() {
        let store = Arc::new(MemoryStore::new());
        let p = Pipeline::new(filter(), store.clone()).with_dry_run(true);
        let out = p
            .run(vec![RawPosting::new("lever", "Engineer").with_company("A")])
            .await
            .unwrap();
        assert!(out.dry_run);
        assert_eq!(out.summary.accepted, 1);
        assert_eq!(store.commit_count(), 0);
        assert!(store.seen().is_empty());
    }
}
