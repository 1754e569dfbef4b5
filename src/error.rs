use thiserror::Error;

/// Per-item rejection raised by the normalizer. Never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("missing-required-field: {field}")]
    MissingRequiredField { field: &'static str },
}

/// Failure of the durable store collaborator. Fatal to the run.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Why the optional LLM refinement produced nothing. Always degraded to
/// the keyword-only verdict by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AugmentError {
    #[error("augmentation provider unavailable: {0}")]
    Unavailable(String),

    #[error("augmentation budget exhausted")]
    BudgetExhausted,

    #[error("malformed augmentation response: {0}")]
    Malformed(String),
}

/// Fatal run failure surfaced to the caller. No SeenSet commit has happened
/// when `Persist` or `LoadSeenSet` is returned.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("loading seen set failed: {0}")]
    LoadSeenSet(#[source] StoreError),

    #[error("persisting accepted leads failed: {0}")]
    Persist(#[source] StoreError),

    #[error("committing seen set failed: {0}")]
    CommitSeenSet(#[source] StoreError),
}

