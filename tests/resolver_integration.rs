//! End-to-end orchestration behavior with scripted stub strategies

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use yt_transcript_resolver::cache::{CacheKey, FileCache, MemoryCache, TranscriptCache};
use yt_transcript_resolver::{
    RawPayload, ResolveError, RetryPolicy, StrategyError, StrategyPayload, TranscriptResolver,
    TranscriptResult, TranscriptStrategy, VideoId,
};

const VIDEO: &str = "dQw4w9WgXcQ";
const SRT: &str = "1\n00:00:00,000 --> 00:00:01,500\nfirst line\n\n2\n00:00:01,500 --> 00:00:03,000\nsecond line\n";

type Step = Result<RawPayload, StrategyError>;

/// Replays a script of outcomes, repeating the last one once exhausted
struct ScriptedStrategy {
    name: &'static str,
    script: Mutex<VecDeque<Step>>,
    last: Step,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedStrategy {
    fn new(name: &'static str, steps: Vec<Step>) -> Arc<Self> {
        Self::build(name, steps, None)
    }

    fn slow(name: &'static str, delay: Duration, step: Step) -> Arc<Self> {
        Self::build(name, vec![step], Some(delay))
    }

    fn build(name: &'static str, steps: Vec<Step>, delay: Option<Duration>) -> Arc<Self> {
        let last = steps
            .last()
            .cloned()
            .unwrap_or_else(|| Err(StrategyError::Empty("empty script".to_string())));
        Arc::new(Self {
            name,
            script: Mutex::new(steps.into()),
            last,
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, _video_id: &VideoId, language: &str) -> Result<StrategyPayload, StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let step = self.script.lock().unwrap().pop_front().unwrap_or_else(|| self.last.clone());
        step.map(|raw| StrategyPayload {
            raw,
            language: language.to_string(),
            is_auto_generated: false,
        })
    }
}

fn srt() -> Step {
    Ok(RawPayload::Srt(SRT.to_string()))
}

fn resolver(strategies: &[Arc<ScriptedStrategy>]) -> TranscriptResolver {
    let strategies = strategies
        .iter()
        .map(|s| s.clone() as Arc<dyn TranscriptStrategy>)
        .collect();
    TranscriptResolver::new(strategies).with_retry_policy(RetryPolicy::immediate(3))
}

#[tokio::test]
async fn first_success_short_circuits_later_strategies() {
    let first = ScriptedStrategy::new("first", vec![Err(StrategyError::Transport("connection reset".to_string()))]);
    let second = ScriptedStrategy::new("second", vec![srt()]);
    let third = ScriptedStrategy::new("third", vec![srt()]);
    let resolver = resolver(&[first.clone(), second.clone(), third.clone()]);

    let result = resolver.resolve(VIDEO, "en").await.unwrap();

    match result {
        TranscriptResult::Available { source, segments, .. } => {
            assert_eq!(source, "second");
            assert_eq!(segments.len(), 2);
            assert_eq!(segments[1].text, "second line");
        }
        other => panic!("expected available, got {:?}", other),
    }
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
    assert_eq!(third.calls(), 0);
}

#[tokio::test]
async fn exhaustion_reports_one_diagnostic_per_strategy() {
    let transport = ScriptedStrategy::new("transport", vec![Err(StrategyError::Transport("dns failure".to_string()))]);
    let permission = ScriptedStrategy::new("permission", vec![Err(StrategyError::Permission("403".to_string()))]);
    let empty_payload = ScriptedStrategy::new("empty_payload", vec![Ok(RawPayload::Srt(String::new()))]);
    let resolver = resolver(&[transport, permission, empty_payload]);

    let result = resolver.resolve(VIDEO, "en").await.unwrap();

    match result {
        TranscriptResult::Unavailable { video_id, diagnostics, .. } => {
            assert_eq!(video_id.as_str(), VIDEO);
            assert_eq!(diagnostics.len(), 3);
            assert!(diagnostics["transport"].starts_with("[transport]"));
            assert!(diagnostics["permission"].starts_with("[permission]"));
            assert!(diagnostics["empty_payload"].starts_with("[parse]"));
        }
        other => panic!("expected unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn rate_limits_are_retried_until_success() {
    let flaky = ScriptedStrategy::new(
        "flaky",
        vec![
            Err(StrategyError::RateLimited("429".to_string())),
            Err(StrategyError::RateLimited("429".to_string())),
            srt(),
        ],
    );
    let resolver = resolver(&[flaky.clone()]);

    let result = resolver.resolve(VIDEO, "en").await.unwrap();

    assert!(result.is_available());
    assert_eq!(flaky.calls(), 3);
}

#[tokio::test]
async fn retry_exhaustion_is_recorded_with_attempt_count() {
    let limited = ScriptedStrategy::new("limited", vec![Err(StrategyError::RateLimited("429".to_string()))]);
    let resolver = resolver(&[limited.clone()]);

    let result = resolver.resolve(VIDEO, "en").await.unwrap();

    match result {
        TranscriptResult::Unavailable { diagnostics, .. } => {
            assert!(diagnostics["limited"].contains("after 3 attempts"));
        }
        other => panic!("expected unavailable, got {:?}", other),
    }
    assert_eq!(limited.calls(), 3);
}

#[tokio::test]
async fn non_rate_limit_errors_are_not_retried() {
    let broken = ScriptedStrategy::new("broken", vec![Err(StrategyError::Parse("bad xml".to_string()))]);
    let resolver = resolver(&[broken.clone()]);

    resolver.resolve(VIDEO, "en").await.unwrap();
    assert_eq!(broken.calls(), 1);
}

#[tokio::test]
async fn resolution_is_idempotent_for_stable_sources() {
    let stable = ScriptedStrategy::new("stable", vec![srt()]);
    let resolver = resolver(&[stable]);

    let first = resolver.resolve(VIDEO, "en").await.unwrap();
    let second = resolver.resolve(&format!("https://youtu.be/{}", VIDEO), "en").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn invalid_identifier_never_calls_strategies() {
    let strategy = ScriptedStrategy::new("unused", vec![srt()]);
    let resolver = resolver(&[strategy.clone()]);

    let err = resolver.resolve("https://example.com/video", "en").await.unwrap_err();
    assert!(matches!(err, ResolveError::IdentifierNotFound(_)));
    assert_eq!(strategy.calls(), 0);
}

#[tokio::test]
async fn cache_hit_skips_strategies() {
    let strategy = ScriptedStrategy::new("counted", vec![srt()]);
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver(&[strategy.clone()]).with_cache(cache.clone(), Duration::from_secs(60));

    let first = resolver.resolve(VIDEO, "en").await.unwrap();
    let second = resolver.resolve(VIDEO, "EN").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(strategy.calls(), 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn unavailable_results_are_not_cached_by_default() {
    let strategy = ScriptedStrategy::new("failing", vec![Err(StrategyError::Empty("none".to_string()))]);
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver(&[strategy.clone()]).with_cache(cache.clone(), Duration::from_secs(60));

    resolver.resolve(VIDEO, "en").await.unwrap();
    resolver.resolve(VIDEO, "en").await.unwrap();

    assert_eq!(strategy.calls(), 2);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn unavailable_results_cached_when_enabled() {
    let strategy = ScriptedStrategy::new("failing", vec![Err(StrategyError::Empty("none".to_string()))]);
    let resolver = resolver(&[strategy.clone()])
        .with_cache(Arc::new(MemoryCache::new()), Duration::from_secs(60))
        .cache_unavailable(true);

    resolver.resolve(VIDEO, "en").await.unwrap();
    resolver.resolve(VIDEO, "en").await.unwrap();

    assert_eq!(strategy.calls(), 1);
}

#[tokio::test]
async fn file_cache_survives_new_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let strategy = ScriptedStrategy::new("counted", vec![srt()]);

    for _ in 0..2 {
        let cache = Arc::new(FileCache::new(dir.path().to_path_buf()));
        let resolver = resolver(&[strategy.clone()]).with_cache(cache, Duration::from_secs(3600));
        assert!(resolver.resolve(VIDEO, "en").await.unwrap().is_available());
    }

    assert_eq!(strategy.calls(), 1);
    let stats = FileCache::new(dir.path().to_path_buf()).stats().await.unwrap();
    assert_eq!(stats.available_transcripts, 1);
}

#[tokio::test]
async fn cancellation_stops_resolution_and_skips_cache() {
    let slow = ScriptedStrategy::slow("slow", Duration::from_secs(30), srt());
    let never = ScriptedStrategy::new("never", vec![srt()]);
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver(&[slow.clone(), never.clone()]).with_cache(cache.clone(), Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = resolver.resolve_with_cancel(VIDEO, "en", &cancel).await;

    assert_eq!(outcome, Err(ResolveError::Cancelled));
    assert_eq!(slow.calls(), 1);
    assert_eq!(never.calls(), 0);
    let key = CacheKey::new(VIDEO.parse().unwrap(), "en");
    assert!(cache.get(&key).await.is_none());
}

#[tokio::test]
async fn empty_language_uses_default() {
    let strategy = ScriptedStrategy::new("echo", vec![srt()]);
    let resolver = resolver(&[strategy]).with_default_language("fr");

    match resolver.resolve(VIDEO, "  ").await.unwrap() {
        TranscriptResult::Available { language, .. } => assert_eq!(language, "fr"),
        other => panic!("expected available, got {:?}", other),
    }
}
