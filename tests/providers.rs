// tests/providers.rs
use std::sync::Arc;

use job_lead_finder::filter::TechFilter;
use job_lead_finder::ingest::providers::{
    file::FileProvider, greenhouse::GreenhouseProvider, lever::LeverProvider,
};
use job_lead_finder::ingest::types::SourceProvider;
use job_lead_finder::pipeline::Stage;
use job_lead_finder::{FileStore, FinderConfig, Pipeline, Source};

const GREENHOUSE: &str = include_str!("fixtures/greenhouse_jobs.json");
const LEVER: &str = include_str!("fixtures/lever_postings.json");

#[tokio::test]
async fn greenhouse_board_maps_fields() {
    let p = GreenhouseProvider::from_fixture_str("Acme", GREENHOUSE);
    let out = p.fetch_latest().await.unwrap();
    assert_eq!(out.len(), 3, "blank titles are passed on to the normalizer");
    assert!(out[2].title.trim().is_empty());
    let first = &out[0];
    assert_eq!(first.source, Source::Ats("greenhouse".into()));
    assert_eq!(first.company.as_deref(), Some("Acme"));
    assert_eq!(first.location.as_deref(), Some("Remote - New York, NY"));
    assert_eq!(first.fetched_at.to_rfc3339(), "2026-09-30T16:00:00+00:00");
    assert!(first.description.as_deref().unwrap().contains("&lt;b&gt;Python"));
}

#[tokio::test]
async fn lever_postings_map_fields() {
    let p = LeverProvider::from_fixture_str("Beta", LEVER);
    let out = p.fetch_latest().await.unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].title, "Data Engineer");
    assert_eq!(out[0].description.as_deref(), Some("Spark, Python and SQL pipelines."));
    assert_eq!(out[1].location.as_deref(), Some("Austin, TX; Remote"));
    assert_eq!(out[1].description.as_deref(), Some("<div>Kubernetes, Terraform and Rust.</div>"));
    assert_eq!(out[0].fetched_at.timestamp_millis(), 1_759_000_000_000);
}

#[tokio::test]
async fn lever_blank_title_reaches_normalizer() {
    let p = LeverProvider::from_fixture_str(
        "Beta",
        r#"[{"text": "  ", "hostedUrl": "https://jobs.lever.co/beta/x"}, {"hostedUrl": "https://jobs.lever.co/beta/y"}]"#,
    );
    let out = p.fetch_latest().await.unwrap();
    assert_eq!(out.len(), 2);
    for raw in &out {
        assert!(job_lead_finder::normalize(raw).is_err());
    }
}

#[tokio::test]
async fn malformed_board_is_an_error() {
    let p = GreenhouseProvider::from_fixture_str("Acme", "<html>rate limited</html>");
    assert!(p.fetch_latest().await.is_err());
}

#[tokio::test]
async fn missing_file_is_an_error() {
    let p = FileProvider::new("/definitely/not/here.jsonl", "gmail");
    let err = p.fetch_latest().await.unwrap_err();
    assert!(format!("{err:#}").contains("not/here.jsonl"));
}

#[tokio::test]
async fn sample_config_end_to_end_over_fixtures() {
    let cfg = FinderConfig::load_from(std::path::Path::new("config/finder.toml")).unwrap();
    let filter = TechFilter::new(cfg.filter.clone()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let pipeline = Pipeline::new(filter, store.clone());

    let providers: Vec<Box<dyn SourceProvider>> = vec![
        Box::new(GreenhouseProvider::from_fixture_str("Acme", GREENHOUSE)),
        Box::new(LeverProvider::from_fixture_str("Beta", LEVER)),
        Box::new(FileProvider::new("tests/fixtures/mailbox.jsonl", "gmail")),
        Box::new(FileProvider::new(dir.path().join("missing.jsonl"), "gmail")),
    ];

    let out = pipeline.run_providers(&providers).await.unwrap();
    let s = &out.summary;
    assert_eq!(s.provider_errors, 1);
    assert_eq!(s.fetched, 9);
    // Blank greenhouse title and empty mailbox title.
    assert_eq!(s.rejected_normalization, 2);
    assert!(s
        .rejections
        .iter()
        .filter(|r| r.stage == Stage::Normalize)
        .all(|r| r.reason == "missing-required-field: title"));
    assert_eq!(s.duplicates, 1); // Acme backend role seen via greenhouse and mail

    let titles: Vec<_> = out.accepted.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(
        titles,
        [
            "Senior Backend Engineer (Remote)",
            "Data Engineer",
            "Platform Engineer",
            "Backend Engineer"
        ]
    );
    let cats: Vec<_> = out.accepted.iter().map(|l| l.category.as_str()).collect();
    assert_eq!(cats, ["backend", "data", "platform", "backend"]);
    // Denver, Colorado resolved to a US location.
    assert_eq!(out.accepted[3].location.state.as_deref(), Some("CO"));

    // Account executive (hard exclude) and the Paris internship are filtered.
    assert_eq!(s.rejected_filter, 2);

    // Second run over the same sources admits nothing new.
    let again = pipeline.run_providers(&providers).await.unwrap();
    assert_eq!(again.summary.accepted, 0);
    assert_eq!(again.summary.duplicates, 5);
}
