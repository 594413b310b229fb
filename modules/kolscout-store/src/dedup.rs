use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use kolscout_common::{EntityKey, KolScoutError};

use crate::repository::Repository;

/// Run-scoped duplicate guard in front of the repository.
///
/// The repository's existence check is the single source of truth across
/// runs; the in-process set only caches positive answers within one run so
/// repeated sightings of the same key cost one lookup, not one per sighting.
pub struct DedupStore {
    repo: Arc<dyn Repository>,
    seen_this_run: Mutex<HashSet<EntityKey>>,
}

impl DedupStore {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            seen_this_run: Mutex::new(HashSet::new()),
        }
    }

    pub async fn seen(&self, key: &EntityKey) -> Result<bool, KolScoutError> {
        if self.seen_this_run.lock().expect("dedup lock").contains(key) {
            return Ok(true);
        }
        let exists = self.repo.exists(key).await?;
        if exists {
            self.seen_this_run
                .lock()
                .expect("dedup lock")
                .insert(key.clone());
        }
        Ok(exists)
    }

    pub fn mark_seen(&self, key: &EntityKey) {
        self.seen_this_run
            .lock()
            .expect("dedup lock")
            .insert(key.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use kolscout_common::{Category, EntityRecord, Platform};

    use super::*;

    /// Counts existence lookups so tests can assert the cache short-circuits.
    #[derive(Default)]
    struct CountingRepo {
        lookups: AtomicU32,
    }

    #[async_trait]
    impl Repository for CountingRepo {
        async fn exists(&self, key: &EntityKey) -> Result<bool, KolScoutError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(key.id == "known")
        }

        async fn save(&self, _record: &EntityRecord) -> Result<(), KolScoutError> {
            Ok(())
        }

        async fn count_qualified(
            &self,
            _category: Option<Category>,
        ) -> Result<u32, KolScoutError> {
            Ok(0)
        }

        async fn list_qualified(
            &self,
            _category: Option<Category>,
            _limit: u32,
        ) -> Result<Vec<EntityRecord>, KolScoutError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn repository_is_authoritative() {
        let dedup = DedupStore::new(Arc::new(CountingRepo::default()));
        assert!(dedup
            .seen(&EntityKey::new(Platform::CodeForge, "known"))
            .await
            .unwrap());
        assert!(!dedup
            .seen(&EntityKey::new(Platform::CodeForge, "new"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn positive_answers_are_cached_within_run() {
        let repo = Arc::new(CountingRepo::default());
        let dedup = DedupStore::new(repo.clone());
        let key = EntityKey::new(Platform::CodeForge, "known");

        assert!(dedup.seen(&key).await.unwrap());
        assert!(dedup.seen(&key).await.unwrap());
        assert_eq!(repo.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mark_seen_short_circuits_lookup() {
        let repo = Arc::new(CountingRepo::default());
        let dedup = DedupStore::new(repo.clone());
        let key = EntityKey::new(Platform::CodeForge, "freshly-saved");

        dedup.mark_seen(&key);
        assert!(dedup.seen(&key).await.unwrap());
        assert_eq!(repo.lookups.load(Ordering::SeqCst), 0);
    }
}
