use async_trait::async_trait;

use kolscout_common::{Category, EntityKey, EntityRecord, KolScoutError};

/// Persistence consumed by the discovery engine; owned by the caller.
///
/// The engine issues no concurrent writes itself but implementations must
/// tolerate being one of several writers when multiple platforms run
/// against the same store. Errors propagate; the engine never retries
/// writes, keeping a single write path per record.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Authoritative "have we already processed this entity" check.
    async fn exists(&self, key: &EntityKey) -> Result<bool, KolScoutError>;

    /// Idempotent upsert: inserting an existing key is a no-op, never an error.
    async fn save(&self, record: &EntityRecord) -> Result<(), KolScoutError>;

    async fn count_qualified(&self, category: Option<Category>) -> Result<u32, KolScoutError>;

    async fn list_qualified(
        &self,
        category: Option<Category>,
        limit: u32,
    ) -> Result<Vec<EntityRecord>, KolScoutError>;
}
