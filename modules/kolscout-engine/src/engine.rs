use std::sync::Arc;
use std::sync::Mutex;

use chrono::Utc;
use futures::StreamExt;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use kolscout_common::{
    CancellationStore, CandidateRef, Category, DiscoveryConfig, EntityRecord, KolScoutError,
    RawEntity, RunPhase, RunStats, RunStatusStore, Verdict,
};
use kolscout_store::{DedupStore, Repository};

use crate::classifier::Classifier;
use crate::limiter::RateLimiter;
use crate::platform::{ExpansionFacts, FetchError, PlatformClient};
use crate::quota::RunQuota;
use crate::retry::RetryPolicy;
use crate::stream;

/// Current scheduler phase, shared between the run loop and the candidate
/// stream and readable from other tasks.
pub(crate) struct PhaseCell(Mutex<RunPhase>);

impl PhaseCell {
    fn new() -> Self {
        Self(Mutex::new(RunPhase::Idle))
    }

    pub(crate) fn set(&self, next: RunPhase) {
        let mut current = self.0.lock().expect("phase lock");
        if *current != next {
            debug!(from = %*current, to = %next, "phase transition");
            *current = next;
        }
    }

    pub(crate) fn get(&self) -> RunPhase {
        *self.0.lock().expect("phase lock")
    }
}

/// Depth-first, quota-seeking discovery scheduler for one platform.
///
/// The engine owns pacing, retries, dedup, classification and persistence;
/// the injected `PlatformClient` owns the scraping specifics. One engine
/// instance drives one run at a time.
pub struct DiscoveryEngine {
    client: Arc<dyn PlatformClient>,
    classifier: Box<dyn Classifier>,
    repo: Arc<dyn Repository>,
    dedup: DedupStore,
    cancel: Arc<dyn CancellationStore>,
    status: Option<Arc<dyn RunStatusStore>>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    config: DiscoveryConfig,
    phase: PhaseCell,
}

impl DiscoveryEngine {
    /// Fails fast on an invalid configuration, before any network call.
    pub fn new(
        client: Arc<dyn PlatformClient>,
        classifier: Box<dyn Classifier>,
        repo: Arc<dyn Repository>,
        cancel: Arc<dyn CancellationStore>,
        config: DiscoveryConfig,
    ) -> Result<Self, KolScoutError> {
        config.validate()?;
        let limiter = RateLimiter::new(&config.rate_limit);
        let retry = RetryPolicy::new(config.max_retries);
        Ok(Self {
            dedup: DedupStore::new(repo.clone()),
            client,
            classifier,
            repo,
            cancel,
            status: None,
            limiter,
            retry,
            config,
            phase: PhaseCell::new(),
        })
    }

    /// Publish a durable running/stopped flag for external observers.
    pub fn with_status(mut self, status: Arc<dyn RunStatusStore>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase.get()
    }

    /// Execute one discovery run to quota, exhaustion or cancellation.
    ///
    /// The status flag is cleared on every exit path, including repository
    /// failures.
    pub async fn run(&self) -> Result<RunStats, KolScoutError> {
        if let Some(status) = &self.status {
            status.set_running(true)?;
        }
        self.cancel.clear()?;

        let result = self.run_inner().await;

        if let Some(status) = &self.status {
            if let Err(err) = status.set_running(false) {
                warn!(error = %err, "failed to clear run status flag");
            }
        }
        result
    }

    async fn run_inner(&self) -> Result<RunStats, KolScoutError> {
        let mut terms = self.config.search_terms.clone();
        terms.shuffle(&mut rand::rng());

        let quota = RunQuota::new(&self.config);
        let mut stats = RunStats::default();
        let mut cancelled = false;

        info!(
            platform = self.client.platform_name(),
            target = quota.target(),
            terms = terms.len(),
            "discovery run starting"
        );
        self.phase.set(RunPhase::Searching);

        {
            let candidates = stream::candidates(
                self.client.as_ref(),
                &terms,
                &quota,
                &self.limiter,
                &self.dedup,
                self.cancel.as_ref(),
                &self.phase,
            );
            futures::pin_mut!(candidates);

            while let Some(candidate) = candidates.next().await {
                stats.discovered += 1;

                if self.cancel.should_stop() {
                    cancelled = true;
                    break;
                }
                if quota.target_reached() {
                    break;
                }
                if quota.attempts_exhausted() {
                    warn!(
                        attempts = quota.attempts(),
                        qualified = quota.qualified(),
                        "attempt ceiling reached, ending run"
                    );
                    break;
                }

                let key = candidate.key();
                if self.dedup.seen(&key).await? {
                    debug!(entity = %key, "already known, skipping");
                    stats.skipped_seen += 1;
                    continue;
                }
                quota.record_attempt();

                let entity = match self.fetch_profile(&candidate).await {
                    Ok(entity) => entity,
                    Err(err) => {
                        warn!(entity = %key, error = %err, "profile fetch failed, skipping");
                        stats.failed += 1;
                        continue;
                    }
                };
                if entity.partial {
                    debug!(entity = %key, "profile fetched with partial data");
                }

                let facts = match self.client.expansion_facts(&candidate).await {
                    Ok(facts) => facts,
                    Err(err) => {
                        debug!(entity = %key, error = %err, "expansion facts unavailable");
                        ExpansionFacts::default()
                    }
                };

                self.phase.set(RunPhase::Classifying);
                let verdict = match self.classifier.classify(&entity, &facts) {
                    Ok(verdict) => verdict,
                    Err(err) => {
                        warn!(entity = %key, error = %err, "classification failed, recording rejection");
                        Verdict::rejected(Category::Commercial, format!("classification error: {err}"))
                    }
                };

                let record = EntityRecord {
                    entity,
                    verdict,
                    discovered_from: candidate.source_hint.clone(),
                    discovered_at: Utc::now(),
                };
                self.repo.save(&record).await?;
                self.dedup.mark_seen(&key);

                let qualified = record.verdict.qualifies;
                quota.record_processed(qualified);
                stats.processed += 1;
                if qualified {
                    stats.qualified += 1;
                    *stats
                        .by_category
                        .entry(record.verdict.category.to_string())
                        .or_insert(0) += 1;
                    info!(
                        entity = %key,
                        category = %record.verdict.category,
                        qualified = stats.qualified,
                        target = quota.target(),
                        "entity qualified"
                    );
                } else {
                    stats.rejected += 1;
                    debug!(
                        entity = %key,
                        reason = record.verdict.reject_reason.as_deref().unwrap_or("unspecified"),
                        "entity rejected"
                    );
                }
                self.phase.set(RunPhase::Searching);
            }
        }

        if cancelled || self.cancel.should_stop() {
            self.phase.set(RunPhase::Cancelled);
            info!(qualified = stats.qualified, "run cancelled on request");
        } else {
            self.phase.set(RunPhase::Done);
            if !quota.target_reached() {
                warn!(
                    qualified = stats.qualified,
                    target = quota.target(),
                    attempts = quota.attempts(),
                    "candidate sources exhausted below target"
                );
            }
        }
        info!("{stats}");
        Ok(stats)
    }

    /// Paced, retried profile fetch. Throttle signals grow the limiter
    /// penalty; any success clears it.
    async fn fetch_profile(&self, candidate: &CandidateRef) -> Result<RawEntity, FetchError> {
        self.retry
            .run("fetch_profile", || async {
                self.limiter.wait().await;
                match self.client.fetch_profile(candidate).await {
                    Ok(entity) => {
                        self.limiter.succeeded();
                        Ok(entity)
                    }
                    Err(FetchError::RateLimited) => {
                        self.limiter.throttled();
                        Err(FetchError::RateLimited)
                    }
                    Err(err) => Err(err),
                }
            })
            .await
    }
}
