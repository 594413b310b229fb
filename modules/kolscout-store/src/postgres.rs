use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use kolscout_common::{
    Category, ContactInfo, EntityKey, EntityRecord, KolScoutError, Platform, RawEntity, Verdict,
};

use crate::repository::Repository;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    platform        TEXT NOT NULL,
    entity_id       TEXT NOT NULL,
    name            TEXT NOT NULL,
    bio             TEXT NOT NULL DEFAULT '',
    affiliation     TEXT,
    followers       BIGINT NOT NULL DEFAULT 0,
    popularity      DOUBLE PRECISION NOT NULL DEFAULT 0,
    email           TEXT,
    website         TEXT,
    social          JSONB NOT NULL DEFAULT '[]',
    recent_titles   JSONB NOT NULL DEFAULT '[]',
    partial         BOOLEAN NOT NULL DEFAULT FALSE,
    category        TEXT NOT NULL,
    qualifies       BOOLEAN NOT NULL,
    attributes      JSONB NOT NULL DEFAULT '{}',
    reject_reason   TEXT,
    discovered_from TEXT NOT NULL DEFAULT '',
    discovered_at   TIMESTAMPTZ NOT NULL,
    fetched_at      TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (platform, entity_id)
);
CREATE INDEX IF NOT EXISTS idx_entities_qualified
    ON entities (qualifies, category, discovered_at DESC);
"#;

/// Postgres-backed entity repository. Inserts are idempotent via
/// `ON CONFLICT DO NOTHING`: the first verdict for a key is final and
/// re-discovery on later runs never rewrites history.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub async fn connect(database_url: &str) -> Result<Self, KolScoutError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| KolScoutError::Database(format!("connect: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing. Idempotent.
    pub async fn migrate(&self) -> Result<(), KolScoutError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| KolScoutError::Database(format!("migrate: {e}")))?;
        info!("entity schema ready");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct EntityRow {
    platform: String,
    entity_id: String,
    name: String,
    bio: String,
    affiliation: Option<String>,
    followers: i64,
    popularity: f64,
    email: Option<String>,
    website: Option<String>,
    social: Json<Vec<String>>,
    recent_titles: Json<Vec<String>>,
    partial: bool,
    category: String,
    qualifies: bool,
    attributes: Json<BTreeMap<String, String>>,
    reject_reason: Option<String>,
    discovered_from: String,
    discovered_at: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
}

fn platform_from_str(s: &str) -> Result<Platform, KolScoutError> {
    match s {
        "video_site" => Ok(Platform::VideoSite),
        "code_forge" => Ok(Platform::CodeForge),
        "social_feed" => Ok(Platform::SocialFeed),
        other => Err(KolScoutError::Database(format!("unknown platform {other:?}"))),
    }
}

fn category_from_str(s: &str) -> Result<Category, KolScoutError> {
    match s {
        "commercial" => Ok(Category::Commercial),
        "academic" => Ok(Category::Academic),
        other => Err(KolScoutError::Database(format!("unknown category {other:?}"))),
    }
}

impl EntityRow {
    fn into_record(self) -> Result<EntityRecord, KolScoutError> {
        Ok(EntityRecord {
            entity: RawEntity {
                key: EntityKey::new(platform_from_str(&self.platform)?, self.entity_id),
                name: self.name,
                bio: self.bio,
                affiliation: self.affiliation,
                followers: self.followers.max(0) as u64,
                popularity_score: self.popularity,
                contact: ContactInfo {
                    email: self.email,
                    website: self.website,
                    social: self.social.0,
                },
                recent_titles: self.recent_titles.0,
                fetched_at: self.fetched_at,
                partial: self.partial,
            },
            verdict: Verdict {
                category: category_from_str(&self.category)?,
                qualifies: self.qualifies,
                attributes: self.attributes.0,
                reject_reason: self.reject_reason,
            },
            discovered_from: self.discovered_from,
            discovered_at: self.discovered_at,
        })
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn exists(&self, key: &EntityKey) -> Result<bool, KolScoutError> {
        let found: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM entities WHERE platform = $1 AND entity_id = $2",
        )
        .bind(key.platform.as_str())
        .bind(&key.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KolScoutError::Database(format!("exists: {e}")))?;
        Ok(found.is_some())
    }

    async fn save(&self, record: &EntityRecord) -> Result<(), KolScoutError> {
        let entity = &record.entity;
        let verdict = &record.verdict;
        sqlx::query(
            "INSERT INTO entities (
                platform, entity_id, name, bio, affiliation, followers, popularity,
                email, website, social, recent_titles, partial,
                category, qualifies, attributes, reject_reason,
                discovered_from, discovered_at, fetched_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                      $13, $14, $15, $16, $17, $18, $19)
            ON CONFLICT (platform, entity_id) DO NOTHING",
        )
        .bind(entity.key.platform.as_str())
        .bind(&entity.key.id)
        .bind(&entity.name)
        .bind(&entity.bio)
        .bind(&entity.affiliation)
        .bind(entity.followers as i64)
        .bind(entity.popularity_score)
        .bind(&entity.contact.email)
        .bind(&entity.contact.website)
        .bind(Json(&entity.contact.social))
        .bind(Json(&entity.recent_titles))
        .bind(entity.partial)
        .bind(verdict.category.as_str())
        .bind(verdict.qualifies)
        .bind(Json(&verdict.attributes))
        .bind(&verdict.reject_reason)
        .bind(&record.discovered_from)
        .bind(record.discovered_at)
        .bind(entity.fetched_at)
        .execute(&self.pool)
        .await
        .map_err(|e| KolScoutError::Database(format!("save {}: {e}", entity.key)))?;
        Ok(())
    }

    async fn count_qualified(&self, category: Option<Category>) -> Result<u32, KolScoutError> {
        let (count,): (i64,) = match category {
            Some(c) => sqlx::query_as(
                "SELECT COUNT(*) FROM entities WHERE qualifies AND category = $1",
            )
            .bind(c.as_str())
            .fetch_one(&self.pool)
            .await,
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM entities WHERE qualifies")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| KolScoutError::Database(format!("count_qualified: {e}")))?;
        Ok(count.max(0) as u32)
    }

    async fn list_qualified(
        &self,
        category: Option<Category>,
        limit: u32,
    ) -> Result<Vec<EntityRecord>, KolScoutError> {
        let rows: Vec<EntityRow> = match category {
            Some(c) => sqlx::query_as(
                "SELECT * FROM entities
                 WHERE qualifies AND category = $1
                 ORDER BY discovered_at DESC LIMIT $2",
            )
            .bind(c.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as(
                "SELECT * FROM entities
                 WHERE qualifies
                 ORDER BY discovered_at DESC LIMIT $1",
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| KolScoutError::Database(format!("list_qualified: {e}")))?;

        rows.into_iter().map(EntityRow::into_record).collect()
    }
}
