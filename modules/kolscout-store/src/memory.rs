use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use kolscout_common::{Category, EntityKey, EntityRecord, KolScoutError};

use crate::repository::Repository;

/// Map-backed repository for single-process deployments and tests.
/// First write per key wins, matching the idempotent-insert contract.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: Mutex<HashMap<EntityKey, EntityRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("repository lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &EntityKey) -> Option<EntityRecord> {
        self.records.lock().expect("repository lock").get(key).cloned()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn exists(&self, key: &EntityKey) -> Result<bool, KolScoutError> {
        Ok(self.records.lock().expect("repository lock").contains_key(key))
    }

    async fn save(&self, record: &EntityRecord) -> Result<(), KolScoutError> {
        self.records
            .lock()
            .expect("repository lock")
            .entry(record.key().clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn count_qualified(&self, category: Option<Category>) -> Result<u32, KolScoutError> {
        let records = self.records.lock().expect("repository lock");
        let count = records
            .values()
            .filter(|r| r.verdict.qualifies)
            .filter(|r| category.is_none_or(|c| r.verdict.category == c))
            .count();
        Ok(count as u32)
    }

    async fn list_qualified(
        &self,
        category: Option<Category>,
        limit: u32,
    ) -> Result<Vec<EntityRecord>, KolScoutError> {
        let records = self.records.lock().expect("repository lock");
        let mut qualified: Vec<EntityRecord> = records
            .values()
            .filter(|r| r.verdict.qualifies)
            .filter(|r| category.is_none_or(|c| r.verdict.category == c))
            .cloned()
            .collect();
        qualified.sort_by(|a, b| b.discovered_at.cmp(&a.discovered_at));
        qualified.truncate(limit as usize);
        Ok(qualified)
    }
}
