// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use anyhow::Result;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ingest::providers::{
    file::FileProvider, greenhouse::GreenhouseProvider, lever::LeverProvider,
};
use crate::ingest::types::SourceProvider;
use crate::lead::RawPosting;

fn default_file_source() -> String {
    "gmail".to_string()
}

/// A JSON / JSON-lines export on disk (mailbox dumps, manual batches).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSourceConfig {
    pub path: std::path::PathBuf,
    /// Tag for records that carry no `source` of their own.
    #[serde(default = "default_file_source")]
    pub source: String,
}

/// One public ATS job board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Board token (Greenhouse) or site name (Lever).
    pub board: String,
    /// Display name; defaults to the board token.
    #[serde(default)]
    pub company: Option<String>,
}

impl BoardConfig {
    pub fn company_name(&self) -> String {
        self.company
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.board.clone())
    }
}

/// `[sources]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub files: Vec<FileSourceConfig>,
    #[serde(default)]
    pub greenhouse: Vec<BoardConfig>,
    #[serde(default)]
    pub lever: Vec<BoardConfig>,
}

impl SourcesConfig {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.greenhouse.is_empty() && self.lever.is_empty()
    }
}

/// Instantiate every configured provider.
pub fn build_providers(cfg: &SourcesConfig) -> Result<Vec<Box<dyn SourceProvider>>> {
    let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
    for f in &cfg.files {
        out.push(Box::new(FileProvider::new(&f.path, f.source.as_str())));
    }
    if !cfg.greenhouse.is_empty() || !cfg.lever.is_empty() {
        let client = providers::http_client()?;
        for b in &cfg.greenhouse {
            out.push(Box::new(GreenhouseProvider::from_board(
                &b.board,
                &b.company_name(),
                client.clone(),
            )));
        }
        for b in &cfg.lever {
            out.push(Box::new(LeverProvider::from_site(
                &b.board,
                &b.company_name(),
                client.clone(),
            )));
        }
    }
    Ok(out)
}

/// Fetch from every provider. A failing provider is logged and counted,
/// never fatal. Returns the merged batch and the number of failed providers.
pub async fn fetch_all(providers: &[Box<dyn SourceProvider>]) -> (Vec<RawPosting>, usize) {
    crate::metrics::ensure_metrics_described();

    let mut raw = Vec::new();
    let mut errors = 0usize;
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => {
                debug!(target: "ingest", provider = p.name(), count = v.len(), "fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("finder_provider_errors_total").increment(1);
                errors += 1;
            }
        }
    }
    counter!("finder_postings_total").increment(raw.len() as u64);
    (raw, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<RawPosting>);
    struct Broken;

    #[async_trait::async_trait]
    impl SourceProvider for Fixed {
        async fn fetch_latest(&self) -> Result<Vec<RawPosting>> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[async_trait::async_trait]
    impl SourceProvider for Broken {
        async fn fetch_latest(&self) -> Result<Vec<RawPosting>> {
            anyhow::bail!("boom")
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[tokio::test]
    async fn failing_provider_does_not_abort_fetch() {
        let providers: Vec<Box<dyn SourceProvider>> = vec![
            Box::new(Broken),
            Box::new(Fixed(vec![RawPosting::new("lever", "Data Engineer")])),
        ];
        let (raw, errors) = fetch_all(&providers).await;
        assert_eq!(raw.len(), 1);
        assert_eq!(errors, 1);
    }

    #[test]
    fn board_company_defaults_to_token() {
        let b = BoardConfig {
            board: "acme".into(),
            company: Some("  ".into()),
        };
        assert_eq!(b.company_name(), "acme");
    }
}
