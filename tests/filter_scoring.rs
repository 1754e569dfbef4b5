// tests/filter_scoring.rs
use job_lead_finder::filter::{CategoryRule, FilterConfig, KeywordRule, TechFilter};
use job_lead_finder::{normalize, Lead, RawPosting};

fn lead(title: &str, location: &str, description: &str) -> Lead {
    normalize(
        &RawPosting::new("greenhouse", title)
            .with_company("Acme")
            .with_location(location)
            .with_description(description),
    )
    .unwrap()
}

fn cfg() -> FilterConfig {
    FilterConfig {
        threshold: 4.0,
        positive: vec![
            KeywordRule::keyword("backend", 3.0),
            KeywordRule::keyword("python", 2.0),
        ],
        categories: vec![
            CategoryRule::new("data", &["data engineer", "spark"]),
            CategoryRule::new("backend", &["backend"]),
        ],
        ..Default::default()
    }
}

#[test]
fn remote_backend_python_scenario() {
    let f = TechFilter::new(cfg()).unwrap();
    let l = lead(
        "Senior Backend Engineer (Remote)",
        "Remote - New York, NY",
        "You will write Python services on AWS.",
    );
    let v = f.evaluate(&l);
    assert!(v.score >= 5.0, "score {}", v.score);
    assert_eq!(v.category, "backend");
    assert!(v.accept);
    assert_eq!(v.matched, vec!["backend".to_string(), "python".to_string()]);
    assert!(l.location.remote);
    assert_eq!(l.location.city.as_deref(), Some("New York"));
    assert_eq!(l.location.state.as_deref(), Some("NY"));
}

#[test]
fn adding_a_matching_positive_rule_never_lowers_score() {
    let l = lead("Platform Engineer", "", "Kubernetes, Go and Rust in production.");
    let base = TechFilter::new(cfg()).unwrap().evaluate(&l).score;
    for extra in ["rust", "kubernetes", "go", "platform"] {
        let mut c = cfg();
        c.positive.push(KeywordRule::keyword(extra, 0.5));
        let s = TechFilter::new(c).unwrap().evaluate(&l).score;
        assert!(s >= base, "{extra}: {s} < {base}");
        assert!(s > base, "{extra} should have matched");
    }
}

#[test]
fn hard_exclude_beats_any_positive_score() {
    let mut c = cfg();
    c.positive.push(KeywordRule::keyword("engineer", 100.0));
    c.negative.push(KeywordRule::hard("intern"));
    let f = TechFilter::new(c).unwrap();
    let v = f.evaluate(&lead(
        "Backend Engineer Intern",
        "Remote",
        "python python backend",
    ));
    assert!(!v.accept);
    assert_eq!(v.score, 0.0);
    assert_eq!(v.category, "general");
    assert_eq!(v.excluded_by.as_deref(), Some("hard_exclude:intern"));
    assert!(!f.is_borderline(&v));
}

#[test]
fn hard_exclude_in_description_also_rejects() {
    let mut c = cfg();
    c.negative.push(KeywordRule::hard("security clearance"));
    let f = TechFilter::new(c).unwrap();
    let v = f.evaluate(&lead("Backend Engineer", "", "Active Security Clearance required."));
    assert!(!v.accept);
}

#[test]
fn title_only_rule_ignores_description() {
    let mut c = cfg();
    c.positive.push(KeywordRule {
        title_only: true,
        ..KeywordRule::keyword("data engineer", 4.0)
    });
    let f = TechFilter::new(c).unwrap();
    assert_eq!(f.evaluate(&lead("Analyst", "", "Work with our data engineer team")).score, 0.0);
    assert_eq!(f.evaluate(&lead("Data Engineer", "", "")).score, 8.0);
}

#[test]
fn evaluation_is_deterministic() {
    let f = TechFilter::new(cfg()).unwrap();
    let l = lead("Backend Data Engineer", "Austin, TX", "python, spark");
    let first = f.evaluate(&l);
    for _ in 0..20 {
        assert_eq!(f.evaluate(&l), first);
    }
    assert_eq!(first.category, "data");
}

#[test]
fn invalid_pattern_error_names_the_rule() {
    let mut c = cfg();
    c.negative.push(KeywordRule {
        keyword: None,
        pattern: Some("[unterminated".into()),
        weight: 1.0,
        hard_exclude: false,
        title_only: false,
    });
    let err = TechFilter::new(c).unwrap_err();
    assert!(format!("{err:#}").contains("[unterminated"), "{err:#}");
}
