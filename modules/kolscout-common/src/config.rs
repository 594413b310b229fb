use std::path::Path;

use serde::Deserialize;

use crate::error::KolScoutError;

/// Run configuration for one platform's discovery.
///
/// Loaded from a JSON file; every knob except `search_terms` has a documented
/// default. A missing or empty `search_terms` is a fatal configuration error
/// caught before any network call.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub search_terms: Vec<String>,

    /// Target number of qualified entities for a run.
    #[serde(default = "default_target")]
    pub target: u32,
    /// Multiplier on the remaining quota when sizing the next search batch,
    /// compensating for the expected rejection rate.
    #[serde(default = "default_buffer_ratio")]
    pub buffer_ratio: f64,
    #[serde(default = "default_min_batch")]
    pub min_batch: usize,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Hard safety ceiling: the run ends once total attempts exceed
    /// `target * attempt_multiplier`.
    #[serde(default = "default_attempt_multiplier")]
    pub attempt_multiplier: u32,

    /// Entity names/ids rejected outright (case-insensitive).
    #[serde(default)]
    pub exclusion_list: Vec<String>,

    #[serde(default)]
    pub influence: InfluenceThresholds,
    #[serde(default)]
    pub keywords: KeywordRules,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Force-reclassify qualifying-but-uncontactable entities as rejected.
    /// A product rule, unverified for new platforms, hence configurable.
    #[serde(default = "default_true")]
    pub require_contact: bool,
}

/// Minimum influence floors. An entity passes when ANY configured floor is
/// met (OR semantics); an unset floor is ignored. Both unset = pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfluenceFloor {
    pub followers: Option<u64>,
    pub popularity_score: Option<f64>,
}

impl InfluenceFloor {
    pub fn passes(&self, followers: u64, popularity: f64) -> bool {
        match (self.followers, self.popularity_score) {
            (None, None) => true,
            (f, p) => {
                f.is_some_and(|min| followers >= min) || p.is_some_and(|min| popularity >= min)
            }
        }
    }
}

/// Qualification floors differ by category: academic entities are held to
/// lower influence bars than commercial ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InfluenceThresholds {
    pub commercial: InfluenceFloor,
    pub academic: InfluenceFloor,
}

impl Default for InfluenceThresholds {
    fn default() -> Self {
        Self {
            commercial: InfluenceFloor {
                followers: Some(1_000),
                popularity_score: Some(100.0),
            },
            academic: InfluenceFloor {
                followers: Some(200),
                popularity_score: Some(50.0),
            },
        }
    }
}

/// Curated keyword sets driving relevance, category assignment and the
/// exclusion heuristics. All matching is lowercase substring.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordRules {
    /// Any single match suffices for domain relevance.
    pub core_terms: Vec<String>,
    /// Count only when a generic qualifier co-occurs in the same text.
    pub helper_terms: Vec<String>,
    pub generic_qualifiers: Vec<String>,
    /// Name-level rejection of news/media outlets.
    pub news_terms: Vec<String>,
    /// Title-pattern rejection of lecture-series channels.
    pub course_terms: Vec<String>,
    /// Category assignment: institutional affiliation.
    pub institution_terms: Vec<String>,
    /// Category assignment: publication-style work titles.
    pub publication_terms: Vec<String>,
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self {
            core_terms: vec![
                "stable diffusion".into(),
                "generative ai".into(),
                "large language model".into(),
                "llm".into(),
                "text-to-image".into(),
                "image generation".into(),
            ],
            helper_terms: vec![
                "agent".into(),
                "assistant".into(),
                "pipeline".into(),
                "fine-tune".into(),
                "inference".into(),
            ],
            generic_qualifiers: vec!["ai".into(), "ml".into(), "model".into(), "neural".into()],
            news_terms: vec![
                "news".into(),
                "media".into(),
                "press".into(),
                "daily".into(),
                "weekly".into(),
            ],
            course_terms: vec![
                "lecture".into(),
                "lesson".into(),
                "course".into(),
                "tutorial series".into(),
                "bootcamp".into(),
                "chapter".into(),
            ],
            institution_terms: vec![
                "university".into(),
                "college".into(),
                "institute".into(),
                "laboratory".into(),
                "lab".into(),
                "academy".into(),
                "faculty".into(),
                "phd".into(),
                "professor".into(),
                "researcher".into(),
            ],
            publication_terms: vec![
                "paper".into(),
                "arxiv".into(),
                "preprint".into(),
                "official implementation".into(),
                "neurips".into(),
                "icml".into(),
                "cvpr".into(),
            ],
        }
    }
}

/// Pacing parameters for one platform client instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Seconds added per consecutive throttle signal.
    pub penalty_unit_secs: u64,
    /// Ceiling on the accumulated penalty, in seconds.
    pub penalty_cap_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 4_000,
            max_delay_ms: 7_000,
            penalty_unit_secs: 2,
            penalty_cap_secs: 5,
        }
    }
}

fn default_target() -> u32 {
    50
}
fn default_buffer_ratio() -> f64 {
    1.5
}
fn default_min_batch() -> usize {
    5
}
fn default_max_batch() -> usize {
    25
}
fn default_attempt_multiplier() -> u32 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_true() -> bool {
    true
}

impl DiscoveryConfig {
    /// Load and validate from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KolScoutError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| KolScoutError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| KolScoutError::Config(format!("invalid config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that must pass before any network call is issued.
    pub fn validate(&self) -> Result<(), KolScoutError> {
        if self.search_terms.is_empty() {
            return Err(KolScoutError::Config(
                "search_terms must not be empty".into(),
            ));
        }
        if self.target == 0 {
            return Err(KolScoutError::Config("target must be positive".into()));
        }
        if self.buffer_ratio <= 0.0 {
            return Err(KolScoutError::Config(
                "buffer_ratio must be positive".into(),
            ));
        }
        if self.min_batch == 0 || self.max_batch < self.min_batch {
            return Err(KolScoutError::Config(
                "batch bounds require 0 < min_batch <= max_batch".into(),
            ));
        }
        if self.rate_limit.max_delay_ms < self.rate_limit.min_delay_ms {
            return Err(KolScoutError::Config(
                "rate_limit.max_delay_ms must be >= min_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json(terms: &str) -> String {
        format!(r#"{{"search_terms": {terms}}}"#)
    }

    #[test]
    fn defaults_fill_optional_keys() {
        let config: DiscoveryConfig =
            serde_json::from_str(&minimal_json(r#"["stable diffusion"]"#)).unwrap();
        config.validate().unwrap();
        assert_eq!(config.target, 50);
        assert_eq!(config.min_batch, 5);
        assert_eq!(config.max_batch, 25);
        assert!(config.require_contact);
        assert_eq!(config.rate_limit.penalty_cap_secs, 5);
    }

    #[test]
    fn empty_search_terms_is_fatal() {
        let config: DiscoveryConfig = serde_json::from_str(&minimal_json("[]")).unwrap();
        assert!(matches!(
            config.validate(),
            Err(KolScoutError::Config(_))
        ));
    }

    #[test]
    fn missing_search_terms_fails_deserialization() {
        let result: Result<DiscoveryConfig, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn influence_floor_is_or_not_and() {
        let floor = InfluenceFloor {
            followers: Some(1_000),
            popularity_score: Some(100.0),
        };
        assert!(floor.passes(2_000, 0.0), "followers alone should pass");
        assert!(floor.passes(0, 150.0), "popularity alone should pass");
        assert!(!floor.passes(500, 50.0), "both below should fail");
    }

    #[test]
    fn unset_influence_floor_passes() {
        let floor = InfluenceFloor::default();
        assert!(floor.passes(0, 0.0));
    }
}
