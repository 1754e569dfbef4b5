use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ingest::types::SourceProvider;
use crate::lead::{RawPosting, Source};

/// On-disk record; `source` and `fetched_at` are optional here.
#[derive(Debug, Deserialize)]
struct FileRecord {
    title: String,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<Source>,
    #[serde(default)]
    fetched_at: Option<DateTime<Utc>>,
}

/// Reads a JSON array or JSON-lines file of raw postings.
pub struct FileProvider {
    path: PathBuf,
    default_source: Source,
}

impl FileProvider {
    pub fn new(path: impl AsRef<Path>, default_source: impl Into<Source>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            default_source: default_source.into(),
        }
    }

    pub fn parse_str(&self, s: &str) -> Result<Vec<RawPosting>> {
        let trimmed = s.trim_start();
        let records: Vec<FileRecord> = if trimmed.is_empty() {
            Vec::new()
        } else if trimmed.starts_with('[') {
            serde_json::from_str(trimmed).context("parsing JSON array of postings")?
        } else {
            trimmed
                .lines()
                .enumerate()
                .filter(|(_, l)| !l.trim().is_empty())
                .map(|(i, l)| {
                    serde_json::from_str(l).with_context(|| format!("JSON-lines record {}", i + 1))
                })
                .collect::<Result<_>>()?
        };

        let now = Utc::now();
        Ok(records
            .into_iter()
            .map(|r| RawPosting {
                title: r.title,
                company: r.company,
                location: r.location,
                description: r.description,
                url: r.url,
                source: r.source.unwrap_or_else(|| self.default_source.clone()),
                fetched_at: r.fetched_at.unwrap_or(now),
            })
            .collect())
    }
}

#[async_trait]
impl SourceProvider for FileProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawPosting>> {
        let s = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading postings from {}", self.path.display()))?;
        self.parse_str(&s)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
