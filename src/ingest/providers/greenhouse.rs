use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::Mode;
use crate::ingest::types::SourceProvider;
use crate::lead::RawPosting;

#[derive(Debug, Deserialize)]
struct Board {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct Job {
    title: Option<String>,
    #[serde(default)]
    location: Option<JobLocation>,
    absolute_url: Option<String>,
    updated_at: Option<String>,
    /// Entity-escaped HTML.
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobLocation {
    name: Option<String>,
}

/// Public Greenhouse job board (`boards-api.greenhouse.io`).
pub struct GreenhouseProvider {
    company: String,
    mode: Mode,
}

impl GreenhouseProvider {
    pub fn from_fixture_str(company: &str, s: &str) -> Self {
        Self {
            company: company.to_string(),
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_board(board: &str, company: &str, client: reqwest::Client) -> Self {
        Self {
            company: company.to_string(),
            mode: Mode::Http {
                url: format!("https://boards-api.greenhouse.io/v1/boards/{board}/jobs?content=true"),
                client,
            },
        }
    }

    fn parse_board(&self, s: &str) -> Result<Vec<RawPosting>> {
        let board: Board = serde_json::from_str(s).context("parsing greenhouse board json")?;
        let now = Utc::now();
        Ok(board
            .jobs
            .into_iter()
            .map(|j| {
                // Blank titles flow on so the normalizer records the rejection.
                let title = j.title.unwrap_or_default();
                let fetched_at = j
                    .updated_at
                    .as_deref()
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or(now);
                RawPosting {
                    title,
                    company: Some(self.company.clone()),
                    location: j.location.and_then(|l| l.name),
                    description: j.content,
                    url: j.absolute_url,
                    source: "greenhouse".into(),
                    fetched_at,
                }
            })
            .collect())
    }
}

#[async_trait]
impl SourceProvider for GreenhouseProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawPosting>> {
        let body = self.mode.body("greenhouse").await?;
        self.parse_board(&body)
    }

    fn name(&self) -> &'static str {
        "greenhouse"
    }
}
