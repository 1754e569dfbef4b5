// src/ingest/types.rs
use anyhow::Result;

use crate::lead::RawPosting;

/// Producer of raw postings. Ordering and reliability are not assumed.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawPosting>>;
    fn name(&self) -> &'static str;
}
