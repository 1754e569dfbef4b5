use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{write_atomic, LeadStore};
use crate::dedup::SeenSet;
use crate::error::StoreError;
use crate::lead::Lead;

const LEDGER_FILE: &str = "leads.jsonl";
const SEEN_FILE: &str = "seen_ids.json";

/// `leads.jsonl` (append-only, one Lead per line) and `seen_ids.json`
/// (sorted id → first-seen map, replaced atomically) under one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    pub fn seen_path(&self) -> PathBuf {
        self.dir.join(SEEN_FILE)
    }

    /// Read the whole ledger back (used by tooling and tests).
    pub async fn read_ledger(&self) -> Result<Vec<Lead>, StoreError> {
        let content = match tokio::fs::read_to_string(self.ledger_path()).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait::async_trait]
impl LeadStore for FileStore {
    async fn load_seen_set(&self) -> Result<SeenSet, StoreError> {
        match tokio::fs::read_to_string(self.seen_path()).await {
            Ok(s) if s.trim().is_empty() => Ok(SeenSet::new()),
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SeenSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, leads: &[Lead]) -> Result<(), StoreError> {
        if leads.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::new();
        for lead in leads {
            serde_json::to_writer(&mut buf, lead)?;
            buf.push(b'\n');
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.ledger_path())
            .await?;
        f.write_all(&buf).await?;
        f.sync_all().await?;
        debug!(target: "store", count = leads.len(), "ledger appended");
        Ok(())
    }

    async fn commit_seen_set(&self, seen: &SeenSet) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(seen)?;
        write_atomic(&self.seen_path(), &bytes)?;
        debug!(target: "store", ids = seen.len(), "seen set committed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
