use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External content platform a candidate was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    VideoSite,
    CodeForge,
    SocialFeed,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::VideoSite => "video_site",
            Platform::CodeForge => "code_forge",
            Platform::SocialFeed => "social_feed",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global identity of an entity. At most one `EntityRecord` exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub platform: Platform,
    pub id: String,
}

impl EntityKey {
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            platform,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.id)
    }
}

/// Lightweight pointer to an entity discovered via search or expansion,
/// not yet fetched in full.
///
/// `source_hint` records provenance for audit/logging only
/// ("contributor #4 of repo X, 37 commits") and never affects identity.
/// `traversal_root` marks search hits that are mined for children
/// (a repository, a seed video) rather than classified themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRef {
    pub platform: Platform,
    pub id: String,
    pub source_hint: String,
    #[serde(default)]
    pub traversal_root: bool,
}

impl CandidateRef {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.platform, self.id.clone())
    }
}

/// Contact surface extracted from a profile, in priority order
/// email > social > website.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub social: Vec<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.website.is_none() && self.social.is_empty()
    }

    /// Best single contact string, or None.
    pub fn primary(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or_else(|| self.social.first().map(|s| s.as_str()))
            .or(self.website.as_deref())
    }
}

/// A fetched profile plus its measurable facts. Immutable once fetched;
/// re-fetching produces a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub key: EntityKey,
    pub name: String,
    pub bio: String,
    /// Affiliation text (company field, institution line), if the platform has one.
    #[serde(default)]
    pub affiliation: Option<String>,
    pub followers: u64,
    /// Platform aggregate popularity (total stars, mean views, engagement).
    pub popularity_score: f64,
    pub contact: ContactInfo,
    /// Titles of recent works (videos, repositories, posts), newest first.
    #[serde(default)]
    pub recent_titles: Vec<String>,
    pub fetched_at: DateTime<Utc>,
    /// True when optional fields could not be read and fell back to defaults.
    #[serde(default)]
    pub partial: bool,
}

/// Classification outcome category. Assignment happens before threshold
/// checks because qualification floors differ by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Commercial,
    Academic,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Commercial => "commercial",
            Category::Academic => "academic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub category: Category,
    pub qualifies: bool,
    /// Structured attributes for downstream consumers
    /// (priority score, relevance ratio, matched terms, contact).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub reject_reason: Option<String>,
}

impl Verdict {
    pub fn rejected(category: Category, reason: impl Into<String>) -> Self {
        Self {
            category,
            qualifies: false,
            attributes: BTreeMap::new(),
            reject_reason: Some(reason.into()),
        }
    }
}

/// Persisted unit: entity + verdict + provenance. Written at most once per
/// `EntityKey`; duplicate insertion is a no-op, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: RawEntity,
    pub verdict: Verdict,
    pub discovered_from: String,
    pub discovered_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn key(&self) -> &EntityKey {
        &self.entity.key
    }
}

/// Scheduler state for one discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Searching,
    Expanding,
    Classifying,
    Done,
    Cancelled,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Idle => "idle",
            RunPhase::Searching => "searching",
            RunPhase::Expanding => "expanding",
            RunPhase::Classifying => "classifying",
            RunPhase::Done => "done",
            RunPhase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Counters from one discovery run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub discovered: u32,
    pub skipped_seen: u32,
    pub processed: u32,
    pub qualified: u32,
    pub rejected: u32,
    pub failed: u32,
    pub by_category: BTreeMap<String, u32>,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Discovery Run Complete ===")?;
        writeln!(f, "Candidates discovered: {}", self.discovered)?;
        writeln!(f, "Skipped (seen):        {}", self.skipped_seen)?;
        writeln!(f, "Processed:             {}", self.processed)?;
        writeln!(f, "Qualified:             {}", self.qualified)?;
        writeln!(f, "Rejected:              {}", self.rejected)?;
        writeln!(f, "Fetch failures:        {}", self.failed)?;
        if !self.by_category.is_empty() {
            writeln!(f, "\nQualified by category:")?;
            for (category, count) in &self.by_category {
                writeln!(f, "  {category}: {count}")?;
            }
        }
        Ok(())
    }
}
