//! Resolution orchestrator
//!
//! Runs the configured strategies strictly in order, isolates every
//! strategy failure, stops at the first transcript that normalizes to at
//! least one segment, and otherwise returns an `Unavailable` result carrying
//! one diagnostics entry per strategy.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, FileCache, MemoryCache, TranscriptCache};
use crate::config::{CacheBackend, Config};
use crate::error::{ResolveError, Result, StrategyError};
use crate::normalize::normalize;
use crate::retry::{with_retry, RetryPolicy};
use crate::strategies::{build_strategies, TranscriptStrategy};
use crate::transcript::{
    diagnostics_from, AttemptOutcome, StrategyAttempt, TranscriptResult, NO_STRATEGY_REASON,
};
use crate::video_id::{parse_video_id, VideoId};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);

pub struct TranscriptResolver {
    strategies: Vec<Arc<dyn TranscriptStrategy>>,
    retry: RetryPolicy,
    cache: Option<Arc<dyn TranscriptCache>>,
    cache_ttl: Duration,
    cache_unavailable: bool,
    default_language: String,
}

impl TranscriptResolver {
    /// Resolver over an explicit strategy list, with default retry policy and no cache
    pub fn new(strategies: Vec<Arc<dyn TranscriptStrategy>>) -> Self {
        Self {
            strategies,
            retry: RetryPolicy::default(),
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_unavailable: false,
            default_language: "en".to_string(),
        }
    }

    /// Build the full resolver (strategies, retry, cache) from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let strategies = build_strategies(config).context("Failed to build strategies")?;
        let mut resolver = Self::new(strategies)
            .with_retry_policy(RetryPolicy::from(&config.retry))
            .with_default_language(&config.youtube.default_language)
            .cache_unavailable(config.cache.cache_unavailable);

        if config.cache.enabled {
            let cache: Arc<dyn TranscriptCache> = match config.cache.backend {
                CacheBackend::Memory => Arc::new(MemoryCache::new()),
                CacheBackend::File => Arc::new(FileCache::new(config.cache.dir.clone())),
            };
            resolver = resolver.with_cache(cache, config.cache.ttl());
        }

        Ok(resolver)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn TranscriptCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Also cache `Unavailable` results
    pub fn cache_unavailable(mut self, enable: bool) -> Self {
        self.cache_unavailable = enable;
        self
    }

    pub fn with_default_language(mut self, language: &str) -> Self {
        self.default_language = language.to_string();
        self
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Parse `input` as an ID or URL, then resolve it.
    ///
    /// Only an unparseable identifier is an error; every strategy failure
    /// ends up in the `Unavailable` diagnostics.
    pub async fn resolve(&self, input: &str, language: &str) -> Result<TranscriptResult> {
        let video_id =
            parse_video_id(input).ok_or_else(|| ResolveError::IdentifierNotFound(input.to_string()))?;
        Ok(self.resolve_id(&video_id, language).await)
    }

    /// Like [`resolve`](Self::resolve), but abandons the in-flight strategy
    /// (and any pending backoff sleep) as soon as `cancel` fires.
    /// Cancelled runs never reach the cache.
    pub async fn resolve_with_cancel(
        &self,
        input: &str,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<TranscriptResult> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("🛑 Resolution of {} cancelled", input);
                Err(ResolveError::Cancelled)
            }
            result = self.resolve(input, language) => result,
        }
    }

    /// Resolve an already-parsed identifier, consulting the cache first
    pub async fn resolve_id(&self, video_id: &VideoId, language: &str) -> TranscriptResult {
        let language = match language.trim() {
            "" => self.default_language.as_str(),
            lang => lang,
        };
        let key = CacheKey::new(video_id.clone(), language);

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                info!("📚 Cache hit for {}", key);
                return hit;
            }
        }

        let result = self.run_strategies(video_id, language).await;

        if let Some(cache) = &self.cache {
            if result.is_available() || self.cache_unavailable {
                cache.put(&key, &result, self.cache_ttl).await;
            }
        }

        result
    }

    async fn run_strategies(&self, video_id: &VideoId, language: &str) -> TranscriptResult {
        info!(
            "🎬 Resolving transcript for {} ({}) with {} strategies",
            video_id,
            language,
            self.strategies.len()
        );
        let mut attempts: Vec<StrategyAttempt> = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let name = strategy.name().to_string();

            if let Err(reason) = strategy.availability() {
                info!("⏭️ Skipping {}: {}", name, reason);
                attempts.push(StrategyAttempt {
                    strategy: name,
                    outcome: AttemptOutcome::Skipped(reason),
                    attempts: 0,
                });
                continue;
            }

            debug!("🔍 Trying {} for {}", name, video_id);
            let policy = if strategy.retry_on_rate_limit() {
                self.retry.clone()
            } else {
                RetryPolicy::none()
            };
            let fetched = with_retry(&policy, &name, StrategyError::is_rate_limited, || {
                strategy.fetch(video_id, language)
            })
            .await;

            let normalized = fetched.result.and_then(|payload| {
                let segments = normalize(&payload.raw).map_err(StrategyError::from)?;
                Ok((payload, segments))
            });

            match normalized {
                Ok((payload, segments)) => {
                    info!(
                        "✅ {} produced {} segments for {} ({}{})",
                        name,
                        segments.len(),
                        video_id,
                        payload.language,
                        if payload.is_auto_generated { ", auto-generated" } else { "" }
                    );
                    return TranscriptResult::Available {
                        video_id: video_id.clone(),
                        segments,
                        language: payload.language,
                        is_auto_generated: payload.is_auto_generated,
                        source: name,
                    };
                }
                Err(StrategyError::NotConfigured(reason)) => {
                    info!("⏭️ Skipping {}: {}", name, reason);
                    attempts.push(StrategyAttempt {
                        strategy: name,
                        outcome: AttemptOutcome::Skipped(reason),
                        attempts: fetched.attempts,
                    });
                }
                Err(e) => {
                    let attempt = StrategyAttempt {
                        strategy: name,
                        outcome: AttemptOutcome::Failure(e),
                        attempts: fetched.attempts,
                    };
                    info!("❌ {}", attempt);
                    attempts.push(attempt);
                }
            }
        }

        warn!("⚠️ No transcript for {} after {} strategies", video_id, attempts.len());
        for attempt in &attempts {
            warn!("   {}", attempt);
        }

        TranscriptResult::Unavailable {
            video_id: video_id.clone(),
            reason: NO_STRATEGY_REASON.to_string(),
            diagnostics: diagnostics_from(&attempts),
        }
    }
}
