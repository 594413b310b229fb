use thiserror::Error;

use kolscout_common::config::{DiscoveryConfig, InfluenceFloor, KeywordRules};
use kolscout_common::{Category, ContactInfo, RawEntity, Verdict};

use crate::contact;
use crate::platform::ExpansionFacts;

/// How many of the most recent work titles the course-content heuristic
/// inspects, and the match share at which a channel is treated as a
/// lecture series rather than a creator.
const COURSE_SAMPLE: usize = 5;
const COURSE_REJECT_RATIO: f64 = 0.6;

const PRIORITY_RELEVANCE_WEIGHT: f64 = 0.6;
const PRIORITY_INFLUENCE_WEIGHT: f64 = 0.4;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("classification failed: {0}")]
    Failed(String),
}

/// Pure decision function over an already-fetched entity. Kept synchronous:
/// everything it needs (profile plus expansion facts) is gathered by the
/// engine beforehand.
pub trait Classifier: Send + Sync {
    fn classify(&self, entity: &RawEntity, facts: &ExpansionFacts) -> Result<Verdict, ClassifyError>;
}

/// Keyword-and-threshold classifier. Evaluation order is fixed and each
/// rejecting step short-circuits the rest:
///
/// 1. category assignment (academic signals, else commercial)
/// 2. exclusion list membership
/// 3. news-outlet and course-content heuristics
/// 4. per-category influence floor (OR over configured floors)
/// 5. domain relevance from core/helper terms
/// 6. contact derivability, with a fallback over contribution notes
pub struct RuleClassifier {
    exclusion_list: Vec<String>,
    keywords: KeywordRules,
    commercial_floor: InfluenceFloor,
    academic_floor: InfluenceFloor,
    require_contact: bool,
}

impl RuleClassifier {
    pub fn new(config: &DiscoveryConfig) -> Self {
        Self {
            exclusion_list: config
                .exclusion_list
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            keywords: config.keywords.clone(),
            commercial_floor: config.influence.commercial.clone(),
            academic_floor: config.influence.academic.clone(),
            require_contact: config.require_contact,
        }
    }

    fn assign_category(&self, entity: &RawEntity) -> Category {
        let affiliation = entity.affiliation.as_deref().unwrap_or("").to_lowercase();
        let bio = entity.bio.to_lowercase();
        if matches_any(&affiliation, &self.keywords.institution_terms)
            || matches_any(&bio, &self.keywords.institution_terms)
        {
            return Category::Academic;
        }
        let titles = entity.recent_titles.join(" ").to_lowercase();
        if matches_any(&titles, &self.keywords.publication_terms) {
            return Category::Academic;
        }
        Category::Commercial
    }

    fn is_excluded(&self, entity: &RawEntity) -> bool {
        let name = entity.name.to_lowercase();
        let id = entity.key.id.to_lowercase();
        self.exclusion_list
            .iter()
            .any(|entry| entry == &name || entry == &id)
    }

    fn looks_like_news_outlet(&self, entity: &RawEntity) -> bool {
        matches_any(&entity.name.to_lowercase(), &self.keywords.news_terms)
    }

    /// A channel whose recent output is mostly numbered lectures is a
    /// course mirror, not a creator worth contacting.
    fn looks_like_course_content(&self, entity: &RawEntity) -> bool {
        let sample: Vec<&String> = entity.recent_titles.iter().take(COURSE_SAMPLE).collect();
        if sample.is_empty() {
            return false;
        }
        let hits = sample
            .iter()
            .filter(|title| matches_any(&title.to_lowercase(), &self.keywords.course_terms))
            .count();
        hits as f64 / sample.len() as f64 >= COURSE_REJECT_RATIO
    }

    fn influence_floor(&self, category: Category) -> &InfluenceFloor {
        match category {
            Category::Commercial => &self.commercial_floor,
            Category::Academic => &self.academic_floor,
        }
    }

    /// Share of recent titles touching the domain, counting a core-term
    /// match always and a helper-term match only alongside a generic
    /// qualifier. The bio alone can establish relevance for entities with
    /// no recent output.
    fn relevance_ratio(&self, entity: &RawEntity) -> (f64, Vec<String>) {
        let mut matched_terms = Vec::new();
        let bio = entity.bio.to_lowercase();
        let bio_relevant = self.text_is_relevant(&bio, &mut matched_terms);

        if entity.recent_titles.is_empty() {
            return (if bio_relevant { 1.0 } else { 0.0 }, matched_terms);
        }

        let mut relevant = 0usize;
        for title in &entity.recent_titles {
            if self.text_is_relevant(&title.to_lowercase(), &mut matched_terms) {
                relevant += 1;
            }
        }
        let mut ratio = relevant as f64 / entity.recent_titles.len() as f64;
        if bio_relevant && ratio == 0.0 {
            ratio = 0.5;
        }
        (ratio, matched_terms)
    }

    fn text_is_relevant(&self, text: &str, matched_terms: &mut Vec<String>) -> bool {
        let mut relevant = false;
        for term in &self.keywords.core_terms {
            if text.contains(term.to_lowercase().as_str()) {
                relevant = true;
                push_unique(matched_terms, term);
            }
        }
        if !relevant && matches_any(text, &self.keywords.generic_qualifiers) {
            for term in &self.keywords.helper_terms {
                if text.contains(term.to_lowercase().as_str()) {
                    relevant = true;
                    push_unique(matched_terms, term);
                }
            }
        }
        relevant
    }

    fn resolve_contact(&self, entity: &RawEntity, facts: &ExpansionFacts) -> ContactInfo {
        if !entity.contact.is_empty() {
            return entity.contact.clone();
        }
        let notes: Vec<&str> = facts
            .contribution_notes
            .iter()
            .map(String::as_str)
            .collect();
        contact::derive_contact(&notes)
    }

    fn influence_score(&self, entity: &RawEntity, floor: &InfluenceFloor) -> f64 {
        let follower_score = floor
            .followers
            .filter(|min| *min > 0)
            .map(|min| entity.followers as f64 / min as f64);
        let popularity_score = floor
            .popularity_score
            .filter(|min| *min > 0.0)
            .map(|min| entity.popularity_score / min);
        match (follower_score, popularity_score) {
            (Some(f), Some(p)) => f.max(p).min(1.0),
            (Some(f), None) => f.min(1.0),
            (None, Some(p)) => p.min(1.0),
            (None, None) => 1.0,
        }
    }
}

impl Classifier for RuleClassifier {
    fn classify(&self, entity: &RawEntity, facts: &ExpansionFacts) -> Result<Verdict, ClassifyError> {
        let category = self.assign_category(entity);

        if self.is_excluded(entity) {
            return Ok(Verdict::rejected(category, "on exclusion list"));
        }
        if self.looks_like_news_outlet(entity) {
            return Ok(Verdict::rejected(category, "news outlet name"));
        }
        if self.looks_like_course_content(entity) {
            return Ok(Verdict::rejected(category, "course content channel"));
        }

        let floor = self.influence_floor(category);
        if !floor.passes(entity.followers, entity.popularity_score) {
            return Ok(Verdict::rejected(category, "below influence floor"));
        }

        let (relevance_ratio, matched_terms) = self.relevance_ratio(entity);
        if relevance_ratio <= 0.0 {
            return Ok(Verdict::rejected(category, "no domain relevance"));
        }

        let resolved = self.resolve_contact(entity, facts);
        if self.require_contact && resolved.is_empty() {
            return Ok(Verdict::rejected(category, "no contact surface"));
        }

        let influence_score = self.influence_score(entity, floor);
        let priority = relevance_ratio * PRIORITY_RELEVANCE_WEIGHT
            + influence_score * PRIORITY_INFLUENCE_WEIGHT;

        let mut verdict = Verdict {
            category,
            qualifies: true,
            attributes: Default::default(),
            reject_reason: None,
        };
        verdict
            .attributes
            .insert("priority".into(), format!("{priority:.3}"));
        verdict
            .attributes
            .insert("relevance_ratio".into(), format!("{relevance_ratio:.3}"));
        verdict
            .attributes
            .insert("matched_terms".into(), matched_terms.join(","));
        if let Some(primary) = resolved.primary() {
            verdict.attributes.insert("contact".into(), primary.to_string());
        }
        Ok(verdict)
    }
}

fn matches_any(text: &str, terms: &[String]) -> bool {
    terms
        .iter()
        .any(|term| text.contains(term.to_lowercase().as_str()))
}

fn push_unique(terms: &mut Vec<String>, term: &str) {
    if !terms.iter().any(|t| t == term) {
        terms.push(term.to_string());
    }
}
