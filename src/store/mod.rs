//! Durable store collaborator: append-only lead ledger + settable SeenSet.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::dedup::SeenSet;
use crate::error::StoreError;
use crate::lead::Lead;

/// Failures are returned to the caller, never retried here.
#[async_trait::async_trait]
pub trait LeadStore: Send + Sync {
    async fn load_seen_set(&self) -> Result<SeenSet, StoreError>;
    /// Append accepted leads to the ledger.
    async fn persist(&self, leads: &[Lead]) -> Result<(), StoreError>;
    /// Replace the durable SeenSet in one step.
    async fn commit_seen_set(&self, seen: &SeenSet) -> Result<(), StoreError>;
    fn name(&self) -> &'static str;
}

/// Write to `<path>.tmp`, fsync, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested/state.json");
        write_atomic(&p, b"one").unwrap();
        write_atomic(&p, b"two").unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "two");
        assert!(!dir.path().join("nested/state.json.tmp").exists());
    }
}
