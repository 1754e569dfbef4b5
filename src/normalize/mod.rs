// src/normalize/mod.rs
//! RawPosting → Lead. Pure: no I/O, returns a value or a typed rejection.

pub mod location;

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::NormalizationError;
use crate::lead::{IdentityPath, Lead, RawPosting};

pub use location::parse_location;

/// Category assigned before the filter runs (and when no rule matches).
pub const DEFAULT_CATEGORY: &str = "general";

const DESCRIPTION_CAP: usize = 4_000;

/// Query parameters that never contribute to identity.
const TRACKING_PARAMS: &[&str] = &[
    "gclid",
    "fbclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "_hsenc",
    "_hsmi",
    "igshid",
    "gh_src",
    "gh_jid_src",
    "lever-source",
    "lever-origin",
    "lever-via",
    "trackingid",
    "refid",
    "trk",
    "trkinfo",
    "ref",
    "referrer",
    "src",
    "source",
    "sessionid",
    "session_id",
    "sid",
    "jsessionid",
    "currentjobid",
    "eboid",
    "alertid",
];

/// Normalize text: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. NBSP)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Canonical form of a posting URL used for identity, or `None` when the
/// URL is not an absolute http(s) link.
///
/// Lowercases scheme/host (via `Url`), drops the fragment, default port and
/// tracking parameters, sorts what is left and trims a trailing path slash.
pub fn canonical_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut url = Url::parse(trimmed).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    url.set_fragment(None);

    let mut kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    kept.sort();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

/// Stable identity. Source-independent so the same posting scraped from two
/// sources collapses to one Lead (exact match only).
pub fn lead_id(
    canonical: Option<&str>,
    company: &str,
    title: &str,
    location_raw: &str,
) -> (String, IdentityPath) {
    let (material, path) = match canonical {
        Some(u) => (format!("url:{u}"), IdentityPath::Url),
        None => (
            format!(
                "fallback:{}\u{1f}{}\u{1f}{}",
                identity_key(company),
                identity_key(title),
                identity_key(location_raw)
            ),
            IdentityPath::Fallback,
        ),
    };
    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    (out, path)
}

fn identity_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Convert a raw posting into a canonical Lead (score/category unset).
///
/// `first_seen_at` starts as the fetch time; the pipeline stamps the run
/// time when the Lead is accepted.
pub fn normalize(raw: &RawPosting) -> Result<Lead, NormalizationError> {
    let title = normalize_text(&raw.title);
    if title.is_empty() {
        return Err(NormalizationError::MissingRequiredField { field: "title" });
    }
    let company = normalize_text(raw.company.as_deref().unwrap_or_default());
    if company.is_empty() {
        return Err(NormalizationError::MissingRequiredField { field: "company" });
    }

    let location = parse_location(&normalize_text(raw.location.as_deref().unwrap_or_default()));

    let canonical = raw.url.as_deref().and_then(canonical_url);
    let (id, identity) = lead_id(canonical.as_deref(), &company, &title, &location.raw);

    let mut description = normalize_text(raw.description.as_deref().unwrap_or_default());
    if description.chars().count() > DESCRIPTION_CAP {
        description = description.chars().take(DESCRIPTION_CAP).collect();
    }

    Ok(Lead {
        id,
        identity,
        title,
        company,
        location,
        source: raw.source.clone(),
        url: canonical,
        description,
        score: 0.0,
        category: DEFAULT_CATEGORY.to_string(),
        matched_keywords: Vec::new(),
        augmented: false,
        first_seen_at: raw.fetched_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_html_and_collapses() {
        let s = "<p>Senior&nbsp;<b>Backend</b>   Engineer &ldquo;Core&rdquo;</p>";
        assert_eq!(normalize_text(s), r#"Senior Backend Engineer "Core""#);
    }

    #[test]
    fn canonical_url_strips_tracking_and_sorts() {
        let u = canonical_url(
            "HTTPS://Boards.Greenhouse.io/acme/jobs/123/?utm_source=x&b=2&gh_src=abc&a=1#apply",
        )
        .unwrap();
        assert_eq!(u, "https://boards.greenhouse.io/acme/jobs/123?a=1&b=2");
    }

    #[test]
    fn canonical_url_drops_empty_query() {
        let u = canonical_url("https://jobs.lever.co/acme/abc-123?lever-source=LinkedIn").unwrap();
        assert_eq!(u, "https://jobs.lever.co/acme/abc-123");
    }

    #[test]
    fn canonical_url_rejects_non_http() {
        assert!(canonical_url("mailto:jobs@acme.io").is_none());
        assert!(canonical_url("not a url").is_none());
        assert!(canonical_url("   ").is_none());
    }

    #[test]
    fn fallback_identity_ignores_case_and_spacing() {
        let (a, pa) = lead_id(None, "ACME", "Backend  Engineer", "New York, NY");
        let (b, pb) = lead_id(None, "acme", "backend engineer", "new york,  ny");
        assert_eq!(a, b);
        assert_eq!(pa, IdentityPath::Fallback);
        assert_eq!(pb, IdentityPath::Fallback);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn empty_company_rejected() {
        let raw = RawPosting::new("greenhouse", "Backend Engineer").with_company("   ");
        assert_eq!(
            normalize(&raw).unwrap_err(),
            NormalizationError::MissingRequiredField { field: "company" }
        );
    }
}
