//! SeenSet + DedupGate.
//!
//! The gate stages new ids on top of the committed set; nothing becomes
//! durable until the pipeline commits `finish()`'s result through the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Append-only identity memory: id → first time it was accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeenSet {
    ids: BTreeMap<String, DateTime<Utc>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    pub fn first_seen(&self, id: &str) -> Option<DateTime<Utc>> {
        self.ids.get(id).copied()
    }

    /// Insert if absent. Existing timestamps are never overwritten.
    pub fn insert(&mut self, id: impl Into<String>, at: DateTime<Utc>) -> bool {
        match self.ids.entry(id.into()) {
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(at);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, DateTime<Utc>)> for SeenSet {
    fn from_iter<T: IntoIterator<Item = (S, DateTime<Utc>)>>(iter: T) -> Self {
        let mut set = SeenSet::new();
        for (id, at) in iter {
            set.insert(id, at);
        }
        set
    }
}

/// Single-owner check-and-insert over one run's batch.
#[derive(Debug)]
pub struct DedupGate {
    seen: SeenSet,
    staged: Vec<String>,
}

impl DedupGate {
    pub fn new(committed: SeenSet) -> Self {
        Self {
            seen: committed,
            staged: Vec::new(),
        }
    }

    /// `true` exactly once per distinct id (first occurrence wins).
    pub fn check_and_insert(&mut self, id: &str, at: DateTime<Utc>) -> bool {
        let is_new = self.seen.insert(id, at);
        if is_new {
            self.staged.push(id.to_string());
        }
        is_new
    }

    /// Committed, or already admitted earlier in this run.
    pub fn is_known(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn staged(&self) -> &[String] {
        &self.staged
    }

    /// Committed set ∪ staged ids, plus the staged ids in arrival order.
    pub fn finish(self) -> (SeenSet, Vec<String>) {
        (self.seen, self.staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn in_batch_duplicate_only_first_is_new() {
        let mut gate = DedupGate::new(SeenSet::new());
        assert!(gate.check_and_insert("a", t(1)));
        assert!(gate.check_and_insert("b", t(1)));
        assert!(!gate.check_and_insert("a", t(2)));
        let (seen, staged) = gate.finish();
        assert_eq!(staged, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(seen.first_seen("a"), Some(t(1)));
    }

    #[test]
    fn committed_ids_are_never_new() {
        let committed: SeenSet = [("x", t(0))].into_iter().collect();
        let mut gate = DedupGate::new(committed);
        assert!(!gate.check_and_insert("x", t(5)));
        let (seen, staged) = gate.finish();
        assert!(staged.is_empty());
        assert_eq!(seen.first_seen("x"), Some(t(0)));
    }

    #[test]
    fn seen_set_serializes_as_sorted_map() {
        let set: SeenSet = [("b", t(1)), ("a", t(2))].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.starts_with("{\"a\":"));
        let back: SeenSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
