use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use super::Mode;
use crate::ingest::types::SourceProvider;
use crate::lead::RawPosting;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Posting {
    text: Option<String>,
    #[serde(default)]
    categories: Categories,
    hosted_url: Option<String>,
    #[serde(default)]
    description_plain: Option<String>,
    #[serde(default)]
    description: Option<String>,
    /// Unix millis.
    created_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct Categories {
    location: Option<String>,
    #[serde(default, rename = "allLocations")]
    all_locations: Vec<String>,
}

/// Public Lever postings API (`api.lever.co/v0/postings/<site>`).
pub struct LeverProvider {
    company: String,
    mode: Mode,
}

impl LeverProvider {
    pub fn from_fixture_str(company: &str, s: &str) -> Self {
        Self {
            company: company.to_string(),
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_site(site: &str, company: &str, client: reqwest::Client) -> Self {
        Self {
            company: company.to_string(),
            mode: Mode::Http {
                url: format!("https://api.lever.co/v0/postings/{site}?mode=json"),
                client,
            },
        }
    }

    fn parse_postings(&self, s: &str) -> Result<Vec<RawPosting>> {
        let postings: Vec<Posting> = serde_json::from_str(s).context("parsing lever postings json")?;
        let now = Utc::now();
        Ok(postings
            .into_iter()
            .map(|p| {
                let title = p.text.unwrap_or_default();
                let location = p.categories.location.or_else(|| {
                    (!p.categories.all_locations.is_empty())
                        .then(|| p.categories.all_locations.join("; "))
                });
                let fetched_at: DateTime<Utc> = p
                    .created_at
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .unwrap_or(now);
                RawPosting {
                    title,
                    company: Some(self.company.clone()),
                    location,
                    description: p.description_plain.or(p.description),
                    url: p.hosted_url,
                    source: "lever".into(),
                    fetched_at,
                }
            })
            .collect())
    }
}

#[async_trait]
impl SourceProvider for LeverProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawPosting>> {
        let body = self.mode.body("lever").await?;
        self.parse_postings(&body)
    }

    fn name(&self) -> &'static str {
        "lever"
    }
}
