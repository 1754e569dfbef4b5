//! Canonical record shapes shared by every pipeline stage.
//!
//! `RawPosting` is what a source hands us (ephemeral, consumed once);
//! `Lead` is the normalized, scored unit of record that gets persisted
//! and announced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a posting came from. Serialized as the plain tag string:
/// `"gmail"` for the mailbox, otherwise the scraper name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    Ats(String),
    Gmail,
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Source::Ats(name) => name.as_str(),
            Source::Gmail => "gmail",
        }
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        let tag = s.trim().to_ascii_lowercase();
        if tag == "gmail" {
            Source::Gmail
        } else {
            Source::Ats(tag)
        }
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Source::from(s.to_string())
    }
}

impl From<Source> for String {
    fn from(s: Source) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-specific posting before normalization. Only `title` and `source`
/// are guaranteed; everything else is best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPosting {
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub source: Source,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl RawPosting {
    /// Minimal constructor used by providers and tests; optional fields start empty.
    pub fn new(source: impl Into<Source>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company: None,
            location: None,
            description: None,
            url: None,
            source: source.into(),
            fetched_at: Utc::now(),
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Structured geography facts. `remote`/`hybrid` are independent of the
/// physical fields: "Remote - New York, NY" sets both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub raw: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub remote: bool,
    pub hybrid: bool,
}

impl Location {
    /// Nothing could be extracted: no geography and no work-mode markers.
    pub fn is_unknown(&self) -> bool {
        self.city.is_none()
            && self.state.is_none()
            && self.country.is_none()
            && !self.remote
            && !self.hybrid
    }

    pub fn is_us(&self) -> bool {
        self.country.as_deref() == Some(crate::normalize::location::UNITED_STATES)
    }
}

/// Which identity derivation produced `Lead::id`. URL identity survives title
/// edits; fallback identity survives URL rotation but not title edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPath {
    Url,
    Fallback,
}

/// Canonical, deduplicated representation of one job posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub identity: IdentityPath,
    pub title: String,
    pub company: String,
    pub location: Location,
    pub source: Source,
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub score: f32,
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub augmented: bool,
    pub first_seen_at: DateTime<Utc>,
}

impl Lead {
    /// First 12 hex chars of the id; enough for log lines.
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(12);
        &self.id[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tag_roundtrips_as_plain_string() {
        let s: Source = serde_json::from_str(r#""Gmail""#).unwrap();
        assert_eq!(s, Source::Gmail);
        let g: Source = serde_json::from_str(r#""greenhouse""#).unwrap();
        assert_eq!(g, Source::Ats("greenhouse".into()));
        assert_eq!(serde_json::to_string(&g).unwrap(), r#""greenhouse""#);
    }

    #[test]
    fn raw_posting_optional_fields_default() {
        let raw: RawPosting =
            serde_json::from_str(r#"{"title":"Data Engineer","source":"lever"}"#).unwrap();
        assert_eq!(raw.title, "Data Engineer");
        assert!(raw.company.is_none());
        assert!(raw.url.is_none());
        assert_eq!(raw.source.as_str(), "lever");
    }

    #[test]
    fn empty_location_is_unknown() {
        assert!(Location::default().is_unknown());
        let remote_only = Location {
            remote: true,
            ..Default::default()
        };
        assert!(!remote_only.is_unknown());
    }
}
