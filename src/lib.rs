// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod lead;
pub mod metrics;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::FinderConfig;
pub use crate::dedup::{DedupGate, SeenSet};
pub use crate::error::{AugmentError, NormalizationError, RunError, StoreError};
pub use crate::filter::{FilterVerdict, TechFilter};
pub use crate::lead::{IdentityPath, Lead, Location, RawPosting, Source};
pub use crate::normalize::{normalize, parse_location};
pub use crate::notify::NotifierMux;
pub use crate::pipeline::{Pipeline, RunOutcome, RunSummary};
pub use crate::store::{FileStore, LeadStore, MemoryStore};
