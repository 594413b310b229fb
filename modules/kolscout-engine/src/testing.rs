//! Scripted fakes for exercising the engine without a live platform.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use kolscout_common::{
    Category, CandidateRef, ContactInfo, DiscoveryConfig, Platform, RawEntity, Verdict,
};

use crate::classifier::{Classifier, ClassifyError};
use crate::platform::{ExpansionFacts, FetchError, PlatformClient, SearchSort};

/// One scripted answer for a profile fetch.
#[derive(Debug, Clone)]
pub enum FetchScript {
    Entity(RawEntity),
    NotFound,
    RateLimited,
    Transient(String),
}

impl FetchScript {
    fn into_result(self) -> Result<RawEntity, FetchError> {
        match self {
            FetchScript::Entity(entity) => Ok(entity),
            FetchScript::NotFound => Err(FetchError::NotFound),
            FetchScript::RateLimited => Err(FetchError::RateLimited),
            FetchScript::Transient(msg) => Err(FetchError::Transient(msg)),
        }
    }
}

/// Platform fake answering from pre-scripted tables and recording every
/// call in order, so tests can assert traversal order and call counts.
pub struct ScriptedPlatform {
    platform: Platform,
    searches: HashMap<String, Vec<CandidateRef>>,
    expansions: HashMap<String, Vec<CandidateRef>>,
    facts: HashMap<String, Vec<String>>,
    profiles: Mutex<HashMap<String, Vec<FetchScript>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedPlatform {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            searches: HashMap::new(),
            expansions: HashMap::new(),
            facts: HashMap::new(),
            profiles: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_search(mut self, term: &str, hits: Vec<CandidateRef>) -> Self {
        self.searches.insert(term.to_string(), hits);
        self
    }

    pub fn on_expand(mut self, id: &str, children: Vec<CandidateRef>) -> Self {
        self.expansions.insert(id.to_string(), children);
        self
    }

    /// Script a sequence of fetch outcomes for one id. The last entry is
    /// sticky: further fetches keep returning it.
    pub fn on_fetch(self, id: &str, script: Vec<FetchScript>) -> Self {
        self.profiles
            .lock()
            .expect("profiles lock")
            .insert(id.to_string(), script);
        self
    }

    /// Shortcut: every fetch of this entity's id succeeds with the profile.
    pub fn with_profile(self, entity: RawEntity) -> Self {
        let id = entity.key.id.clone();
        self.on_fetch(&id, vec![FetchScript::Entity(entity)])
    }

    pub fn with_facts(mut self, id: &str, notes: Vec<String>) -> Self {
        self.facts.insert(id.to_string(), notes);
        self
    }

    /// Every call made so far, in order, as "kind:id" strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn log(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl PlatformClient for ScriptedPlatform {
    fn platform_name(&self) -> &str {
        self.platform.as_str()
    }

    async fn search(
        &self,
        term: &str,
        max_results: usize,
        _sort: SearchSort,
    ) -> Result<Vec<CandidateRef>, FetchError> {
        self.log(format!("search:{term}"));
        let hits = self.searches.get(term).cloned().unwrap_or_default();
        Ok(hits.into_iter().take(max_results).collect())
    }

    async fn expand(
        &self,
        candidate: &CandidateRef,
        _max_items: Option<usize>,
    ) -> Result<Vec<CandidateRef>, FetchError> {
        self.log(format!("expand:{}", candidate.id));
        Ok(self.expansions.get(&candidate.id).cloned().unwrap_or_default())
    }

    async fn fetch_profile(&self, candidate: &CandidateRef) -> Result<RawEntity, FetchError> {
        self.log(format!("fetch:{}", candidate.id));
        let mut profiles = self.profiles.lock().expect("profiles lock");
        match profiles.get_mut(&candidate.id) {
            Some(script) if script.len() > 1 => script.remove(0).into_result(),
            Some(script) => script
                .first()
                .cloned()
                .map(FetchScript::into_result)
                .unwrap_or(Err(FetchError::NotFound)),
            None => Err(FetchError::NotFound),
        }
    }

    async fn expansion_facts(
        &self,
        candidate: &CandidateRef,
    ) -> Result<ExpansionFacts, FetchError> {
        self.log(format!("facts:{}", candidate.id));
        Ok(ExpansionFacts {
            contribution_notes: self.facts.get(&candidate.id).cloned().unwrap_or_default(),
        })
    }
}

/// Classifier fake qualifying everything as commercial.
pub struct AcceptAll;

impl Classifier for AcceptAll {
    fn classify(&self, _: &RawEntity, _: &ExpansionFacts) -> Result<Verdict, ClassifyError> {
        Ok(Verdict {
            category: Category::Commercial,
            qualifies: true,
            attributes: Default::default(),
            reject_reason: None,
        })
    }
}

/// Classifier fake rejecting everything.
pub struct RejectAll;

impl Classifier for RejectAll {
    fn classify(&self, _: &RawEntity, _: &ExpansionFacts) -> Result<Verdict, ClassifyError> {
        Ok(Verdict::rejected(Category::Commercial, "scripted rejection"))
    }
}

/// Classifier fake that always errors.
pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&self, _: &RawEntity, _: &ExpansionFacts) -> Result<Verdict, ClassifyError> {
        Err(ClassifyError::Failed("scripted failure".into()))
    }
}

/// A directly classifiable search hit.
pub fn creator(id: &str) -> CandidateRef {
    CandidateRef {
        platform: Platform::CodeForge,
        id: id.to_string(),
        source_hint: format!("search hit {id}"),
        traversal_root: false,
    }
}

/// A search hit mined for children instead of classified.
pub fn root(id: &str) -> CandidateRef {
    CandidateRef {
        platform: Platform::CodeForge,
        id: id.to_string(),
        source_hint: format!("seed {id}"),
        traversal_root: true,
    }
}

pub fn profile(id: &str, bio: &str, followers: u64) -> RawEntity {
    RawEntity {
        key: creator(id).key(),
        name: id.to_string(),
        bio: bio.to_string(),
        affiliation: None,
        followers,
        popularity_score: 0.0,
        contact: ContactInfo {
            email: Some(format!("{id}@forge.dev")),
            website: None,
            social: Vec::new(),
        },
        recent_titles: Vec::new(),
        fetched_at: Utc::now(),
        partial: false,
    }
}

/// Config with zero pacing delays so tests run at full speed.
pub fn fast_config(terms: &[&str]) -> DiscoveryConfig {
    use kolscout_common::config::RateLimitConfig;

    DiscoveryConfig {
        search_terms: terms.iter().map(|t| t.to_string()).collect(),
        target: 50,
        buffer_ratio: 1.5,
        min_batch: 5,
        max_batch: 25,
        attempt_multiplier: 10,
        exclusion_list: Vec::new(),
        influence: Default::default(),
        keywords: Default::default(),
        rate_limit: RateLimitConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            penalty_unit_secs: 0,
            penalty_cap_secs: 0,
        },
        max_retries: 3,
        require_contact: true,
    }
}
