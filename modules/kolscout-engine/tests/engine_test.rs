use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kolscout_common::{
    CancellationStore, Category, KolScoutError, MemoryCancellation, MemoryRunStatus, Platform,
    RawEntity, RunPhase, RunStatusStore, Verdict,
};
use kolscout_engine::testing::{
    creator, fast_config, profile, root, AcceptAll, FailingClassifier, FetchScript, RejectAll,
    ScriptedPlatform,
};
use kolscout_engine::{Classifier, ClassifyError, DiscoveryEngine, ExpansionFacts, RetryPolicy};
use kolscout_store::MemoryRepository;

fn engine(
    platform: Arc<ScriptedPlatform>,
    classifier: Box<dyn Classifier>,
    repo: Arc<MemoryRepository>,
    cancel: Arc<MemoryCancellation>,
    config: kolscout_common::DiscoveryConfig,
) -> DiscoveryEngine {
    DiscoveryEngine::new(platform, classifier, repo, cancel, config)
        .expect("valid config")
        .with_retry_policy(RetryPolicy::new(3).with_base_delay(Duration::from_millis(1)))
}

#[tokio::test]
async fn run_stops_fetching_once_target_is_reached() {
    let mut config = fast_config(&["diffusion models"]);
    config.target = 2;

    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("diffusion models", vec![root("seed-repo")])
            .on_expand(
                "seed-repo",
                vec![creator("a"), creator("b"), creator("c"), creator("d")],
            )
            .with_profile(profile("a", "llm tools", 5_000))
            .with_profile(profile("b", "llm tools", 5_000))
            .with_profile(profile("c", "llm tools", 5_000))
            .with_profile(profile("d", "llm tools", 5_000)),
    );
    let repo = Arc::new(MemoryRepository::new());
    let engine = engine(
        platform.clone(),
        Box::new(AcceptAll),
        repo.clone(),
        Arc::new(MemoryCancellation::new()),
        config,
    );

    let stats = engine.run().await.unwrap();

    assert_eq!(stats.qualified, 2);
    assert_eq!(platform.count_calls("fetch:"), 2, "quota met, c and d never fetched");
    assert_eq!(repo.len(), 2);
    assert_eq!(engine.phase(), RunPhase::Done);
}

#[tokio::test]
async fn second_run_skips_entities_known_to_the_repository() {
    let repo = Arc::new(MemoryRepository::new());
    let config = fast_config(&["ai agents"]);

    let first_platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![creator("a"), creator("b")])
            .with_profile(profile("a", "llm tools", 5_000))
            .with_profile(profile("b", "llm tools", 5_000)),
    );
    let first = engine(
        first_platform,
        Box::new(AcceptAll),
        repo.clone(),
        Arc::new(MemoryCancellation::new()),
        config.clone(),
    );
    let stats = first.run().await.unwrap();
    assert_eq!(stats.processed, 2);

    // Fresh engine, fresh run-scoped cache, same repository.
    let second_platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![creator("a"), creator("b")])
            .with_profile(profile("a", "llm tools", 5_000))
            .with_profile(profile("b", "llm tools", 5_000)),
    );
    let second = engine(
        second_platform.clone(),
        Box::new(AcceptAll),
        repo.clone(),
        Arc::new(MemoryCancellation::new()),
        config,
    );
    let stats = second.run().await.unwrap();

    assert_eq!(stats.skipped_seen, 2);
    assert_eq!(stats.processed, 0);
    assert_eq!(second_platform.count_calls("fetch:"), 0, "known keys cost no fetch");
    assert_eq!(repo.len(), 2);
}

/// Qualifies everything except one named entity.
struct RejectNamed(&'static str);

impl Classifier for RejectNamed {
    fn classify(&self, entity: &RawEntity, _: &ExpansionFacts) -> Result<Verdict, ClassifyError> {
        if entity.name == self.0 {
            return Ok(Verdict::rejected(Category::Commercial, "scripted rejection"));
        }
        Ok(Verdict {
            category: Category::Commercial,
            qualifies: true,
            attributes: Default::default(),
            reject_reason: None,
        })
    }
}

#[tokio::test]
async fn rejections_do_not_count_toward_the_quota() {
    let mut config = fast_config(&["diffusion models"]);
    config.target = 2;

    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("diffusion models", vec![root("seed-repo")])
            .on_expand(
                "seed-repo",
                vec![creator("a"), creator("b"), creator("c"), creator("d")],
            )
            .with_profile(profile("a", "llm tools", 5_000))
            .with_profile(profile("b", "llm tools", 5_000))
            .with_profile(profile("c", "llm tools", 5_000))
            .with_profile(profile("d", "llm tools", 5_000)),
    );
    let engine = engine(
        platform.clone(),
        Box::new(RejectNamed("b")),
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryCancellation::new()),
        config,
    );

    let stats = engine.run().await.unwrap();

    // a qualifies, b is rejected, c fills the quota; d is never fetched.
    assert_eq!(stats.qualified, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(platform.count_calls("fetch:"), 3);
    assert_eq!(platform.count_calls("fetch:d"), 0);
}

/// Qualifies everything and raises the shared stop flag after the first
/// candidate, simulating an operator cancelling mid-run.
struct StopAfterFirst {
    cancel: Arc<MemoryCancellation>,
}

impl Classifier for StopAfterFirst {
    fn classify(&self, _: &RawEntity, _: &ExpansionFacts) -> Result<Verdict, ClassifyError> {
        self.cancel.request_stop().map_err(|e| ClassifyError::Failed(e.to_string()))?;
        Ok(Verdict {
            category: Category::Commercial,
            qualifies: true,
            attributes: Default::default(),
            reject_reason: None,
        })
    }
}

#[tokio::test]
async fn cancellation_takes_effect_before_the_next_fetch() {
    let cancel = Arc::new(MemoryCancellation::new());
    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![creator("a"), creator("b"), creator("c")])
            .with_profile(profile("a", "llm tools", 5_000))
            .with_profile(profile("b", "llm tools", 5_000))
            .with_profile(profile("c", "llm tools", 5_000)),
    );
    let engine = engine(
        platform.clone(),
        Box::new(StopAfterFirst {
            cancel: cancel.clone(),
        }),
        Arc::new(MemoryRepository::new()),
        cancel,
        fast_config(&["ai agents"]),
    );

    let stats = engine.run().await.unwrap();

    assert_eq!(stats.processed, 1);
    assert_eq!(platform.count_calls("fetch:"), 1, "no fetch after the stop request");
    assert_eq!(engine.phase(), RunPhase::Cancelled);
}

#[tokio::test]
async fn traversal_roots_are_mined_depth_first() {
    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![root("repo-1"), root("repo-2")])
            .on_expand("repo-1", vec![creator("c1"), creator("c2")])
            .on_expand("repo-2", vec![creator("c3")])
            .with_profile(profile("c1", "llm tools", 5_000))
            .with_profile(profile("c2", "llm tools", 5_000))
            .with_profile(profile("c3", "llm tools", 5_000)),
    );
    let engine = engine(
        platform.clone(),
        Box::new(AcceptAll),
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryCancellation::new()),
        fast_config(&["ai agents"]),
    );

    engine.run().await.unwrap();

    let traversal: Vec<String> = platform
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("expand:") || call.starts_with("fetch:"))
        .collect();
    assert_eq!(
        traversal,
        vec![
            "expand:repo-1",
            "fetch:c1",
            "fetch:c2",
            "expand:repo-2",
            "fetch:c3"
        ],
        "all children of a root come before the next root"
    );
}

#[tokio::test]
async fn invalid_config_fails_before_any_network_call() {
    let platform = Arc::new(ScriptedPlatform::new(Platform::CodeForge));
    let result = DiscoveryEngine::new(
        platform.clone(),
        Box::new(AcceptAll),
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryCancellation::new()),
        fast_config(&[]),
    );

    assert!(matches!(result, Err(KolScoutError::Config(_))));
    assert!(platform.calls().is_empty());
}

#[tokio::test]
async fn classification_error_is_persisted_as_rejection() {
    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![creator("a")])
            .with_profile(profile("a", "llm tools", 5_000)),
    );
    let repo = Arc::new(MemoryRepository::new());
    let engine = engine(
        platform,
        Box::new(FailingClassifier),
        repo.clone(),
        Arc::new(MemoryCancellation::new()),
        fast_config(&["ai agents"]),
    );

    let stats = engine.run().await.unwrap();

    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.qualified, 0);
    let record = repo.get(&creator("a").key()).expect("rejection persisted");
    assert!(!record.verdict.qualifies);
    assert!(record
        .verdict
        .reject_reason
        .as_deref()
        .unwrap()
        .contains("classification error"));
}

#[tokio::test]
async fn throttled_fetch_is_retried_and_recovers() {
    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![creator("a")])
            .on_fetch(
                "a",
                vec![
                    FetchScript::RateLimited,
                    FetchScript::Entity(profile("a", "llm tools", 5_000)),
                ],
            ),
    );
    let engine = engine(
        platform.clone(),
        Box::new(AcceptAll),
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryCancellation::new()),
        fast_config(&["ai agents"]),
    );

    let stats = engine.run().await.unwrap();

    assert_eq!(stats.qualified, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(platform.count_calls("fetch:a"), 2);
}

#[tokio::test]
async fn persistent_fetch_failure_is_skipped_not_fatal() {
    let mut config = fast_config(&["ai agents"]);
    config.max_retries = 1;

    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![creator("ghost"), creator("b")])
            .with_profile(profile("b", "llm tools", 5_000)),
    );
    let engine = DiscoveryEngine::new(
        platform.clone(),
        Box::new(AcceptAll),
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryCancellation::new()),
        config,
    )
    .unwrap();

    let stats = engine.run().await.unwrap();

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.qualified, 1, "the run continues past a dead candidate");
    assert_eq!(platform.count_calls("fetch:ghost"), 1);
}

/// Observes the durable status flag while the run is in flight.
struct StatusProbe {
    status: Arc<MemoryRunStatus>,
    observed_running: Arc<AtomicBool>,
}

impl Classifier for StatusProbe {
    fn classify(&self, _: &RawEntity, _: &ExpansionFacts) -> Result<Verdict, ClassifyError> {
        self.observed_running
            .store(self.status.is_running(), Ordering::SeqCst);
        Ok(Verdict::rejected(Category::Commercial, "probe"))
    }
}

#[tokio::test]
async fn status_flag_tracks_the_run_lifecycle() {
    let status = Arc::new(MemoryRunStatus::new());
    let observed_running = Arc::new(AtomicBool::new(false));
    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![creator("a")])
            .with_profile(profile("a", "llm tools", 5_000)),
    );
    let engine = engine(
        platform,
        Box::new(StatusProbe {
            status: status.clone(),
            observed_running: observed_running.clone(),
        }),
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryCancellation::new()),
        fast_config(&["ai agents"]),
    )
    .with_status(status.clone());

    engine.run().await.unwrap();

    assert!(observed_running.load(Ordering::SeqCst), "flag set while running");
    assert!(!status.is_running(), "flag cleared after the run");
}

#[tokio::test]
async fn exhausted_sources_end_the_run_below_target() {
    let platform = Arc::new(
        ScriptedPlatform::new(Platform::CodeForge)
            .on_search("ai agents", vec![creator("a")])
            .with_profile(profile("a", "llm tools", 5_000)),
    );
    let engine = engine(
        platform,
        Box::new(RejectAll),
        Arc::new(MemoryRepository::new()),
        Arc::new(MemoryCancellation::new()),
        fast_config(&["ai agents"]),
    );

    let stats = engine.run().await.unwrap();

    assert_eq!(stats.qualified, 0);
    assert_eq!(stats.rejected, 1);
    assert_eq!(engine.phase(), RunPhase::Done);
}
