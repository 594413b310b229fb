use async_trait::async_trait;
use thiserror::Error;

use kolscout_common::{CandidateRef, RawEntity};

/// Sort hint for platform search. Implementations map these onto whatever
/// the platform supports; rotating hints across terms diversifies results
/// between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSort {
    Relevance,
    Popularity,
    Recency,
}

impl SearchSort {
    /// Rotation used by the candidate stream, one hint per search term.
    pub const ROTATION: [SearchSort; 3] =
        [SearchSort::Popularity, SearchSort::Recency, SearchSort::Relevance];
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("entity not found")]
    NotFound,
    #[error("platform signalled rate limiting")]
    RateLimited,
    #[error("transient fetch failure: {0}")]
    Transient(String),
}

/// Facts gathered by expanding an entity's surroundings: provenance plus
/// contribution metadata (commit trailers, recent activity text) that the
/// classifier's contact fallback mines for an address.
#[derive(Debug, Clone, Default)]
pub struct ExpansionFacts {
    pub contribution_notes: Vec<String>,
}

/// Per-platform capability the engine is polymorphic over. Implementations
/// own the scraping specifics; the engine owns pacing, retries, dedup and
/// classification.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform_name(&self) -> &str;

    /// Best-effort search: partial results are returned rather than raised;
    /// only total failure is an error (caller logs it and skips the term).
    async fn search(
        &self,
        term: &str,
        max_results: usize,
        sort: SearchSort,
    ) -> Result<Vec<CandidateRef>, FetchError>;

    /// One-to-many traversal from a candidate (contributors of a
    /// repository, channels behind recommended videos). `max_items: None`
    /// returns every available item; depth-first mining depends on that.
    async fn expand(
        &self,
        candidate: &CandidateRef,
        max_items: Option<usize>,
    ) -> Result<Vec<CandidateRef>, FetchError>;

    /// Full profile fetch. Missing optional fields are returned with
    /// best-effort defaults and `RawEntity::partial` set, never as errors.
    async fn fetch_profile(&self, candidate: &CandidateRef) -> Result<RawEntity, FetchError>;

    /// Contribution metadata for the classifier's contact fallback.
    /// Platforms without such a source keep the default empty answer.
    async fn expansion_facts(
        &self,
        _candidate: &CandidateRef,
    ) -> Result<ExpansionFacts, FetchError> {
        Ok(ExpansionFacts::default())
    }
}
