use async_stream::stream;
use futures::Stream;
use tracing::{debug, warn};

use kolscout_common::{CancellationStore, CandidateRef, RunPhase};
use kolscout_store::DedupStore;

use crate::engine::PhaseCell;
use crate::limiter::RateLimiter;
use crate::platform::{FetchError, PlatformClient, SearchSort};
use crate::quota::RunQuota;

/// Lazy, quota-seeking candidate source.
///
/// Terms are consumed one at a time; each search issues a batch sized from
/// the live qualification rate. A hit flagged as a traversal root is mined
/// depth-first: all of its children are yielded before the next hit is
/// touched, so a productive root can fill the quota without spending more
/// search calls. Roots themselves are never yielded.
///
/// Cancellation and quota state are polled before every network call, never
/// mid-call. Failed searches and expansions are logged and skipped; they
/// are not errors of the stream.
pub fn candidates<'a>(
    client: &'a dyn PlatformClient,
    terms: &'a [String],
    quota: &'a RunQuota,
    limiter: &'a RateLimiter,
    dedup: &'a DedupStore,
    cancel: &'a dyn CancellationStore,
    phase: &'a PhaseCell,
) -> impl Stream<Item = CandidateRef> + 'a {
    stream! {
        for (index, term) in terms.iter().enumerate() {
            if cancel.should_stop() || quota.target_reached() || quota.attempts_exhausted() {
                return;
            }
            let batch = quota.next_batch_size();
            if batch == 0 {
                return;
            }
            let sort = SearchSort::ROTATION[index % SearchSort::ROTATION.len()];

            phase.set(RunPhase::Searching);
            limiter.wait().await;
            let hits = match client.search(term, batch, sort).await {
                Ok(hits) => {
                    limiter.succeeded();
                    hits
                }
                Err(FetchError::RateLimited) => {
                    limiter.throttled();
                    warn!(%term, "search throttled, skipping term");
                    continue;
                }
                Err(err) => {
                    warn!(%term, error = %err, "search failed, skipping term");
                    continue;
                }
            };
            debug!(%term, batch, hits = hits.len(), sort = ?sort, "search term issued");

            for hit in hits {
                if cancel.should_stop() || quota.target_reached() || quota.attempts_exhausted() {
                    return;
                }

                if !hit.traversal_root {
                    yield hit;
                    continue;
                }

                // Dedup precedes expansion: an already-mined root is not
                // worth a second network call.
                let root_key = hit.key();
                match dedup.seen(&root_key).await {
                    Ok(true) => {
                        debug!(root = %root_key, "traversal root already mined");
                        continue;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        warn!(root = %root_key, error = %err, "dedup lookup failed, mining anyway");
                    }
                }

                phase.set(RunPhase::Expanding);
                limiter.wait().await;
                let children = match client.expand(&hit, None).await {
                    Ok(children) => {
                        limiter.succeeded();
                        children
                    }
                    Err(FetchError::RateLimited) => {
                        limiter.throttled();
                        warn!(root = %root_key, "expansion throttled, skipping root");
                        continue;
                    }
                    Err(err) => {
                        warn!(root = %root_key, error = %err, "expansion failed, skipping root");
                        continue;
                    }
                };
                dedup.mark_seen(&root_key);
                debug!(root = %root_key, children = children.len(), "traversal root mined");

                for child in children {
                    if cancel.should_stop() || quota.target_reached() || quota.attempts_exhausted()
                    {
                        return;
                    }
                    yield child;
                }
            }
        }
    }
}
