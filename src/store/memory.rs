use std::sync::Mutex;

use super::LeadStore;
use crate::dedup::SeenSet;
use crate::error::StoreError;
use crate::lead::Lead;

#[derive(Debug, Default)]
struct Inner {
    seen: SeenSet,
    leads: Vec<Lead>,
    commits: usize,
    fail_load: bool,
    fail_persist: bool,
    fail_commit: bool,
}

/// In-process store with switchable failures. Test helper.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seen(seen: SeenSet) -> Self {
        let store = Self::default();
        store.lock().seen = seen;
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock only happens in a failing test.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn fail_load(&self, on: bool) {
        self.lock().fail_load = on;
    }

    pub fn fail_persist(&self, on: bool) {
        self.lock().fail_persist = on;
    }

    pub fn fail_commit(&self, on: bool) {
        self.lock().fail_commit = on;
    }

    pub fn leads(&self) -> Vec<Lead> {
        self.lock().leads.clone()
    }

    pub fn seen(&self) -> SeenSet {
        self.lock().seen.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }
}

#[async_trait::async_trait]
impl LeadStore for MemoryStore {
    async fn load_seen_set(&self) -> Result<SeenSet, StoreError> {
        let g = self.lock();
        if g.fail_load {
            return Err(StoreError::Unavailable("injected load failure".into()));
        }
        Ok(g.seen.clone())
    }

    async fn persist(&self, leads: &[Lead]) -> Result<(), StoreError> {
        let mut g = self.lock();
        if g.fail_persist {
            return Err(StoreError::Unavailable("injected persist failure".into()));
        }
        g.leads.extend_from_slice(leads);
        Ok(())
    }

    async fn commit_seen_set(&self, seen: &SeenSet) -> Result<(), StoreError> {
        let mut g = self.lock();
        if g.fail_commit {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        g.seen = seen.clone();
        g.commits += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
