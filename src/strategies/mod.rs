//! Transcript acquisition strategies
//!
//! Each strategy is one independent way of getting a transcript out of
//! YouTube or a third party. They share a lazily-built HTTP client and the
//! same contract: return a raw payload plus the language actually served, or
//! a [`StrategyError`].

pub mod data_api;
pub mod http;
pub mod mirrors;
pub mod timedtext;
pub mod watch_page;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::StrategyError;
use crate::normalize::RawPayload;
use crate::video_id::VideoId;

pub use data_api::{CaptionCredential, DataApiStrategy, StaticTokenCredential};
pub use http::HttpFetcher;
pub use mirrors::MirrorStrategy;
pub use timedtext::TimedTextStrategy;
pub use watch_page::WatchPageStrategy;

pub const TIMEDTEXT: &str = "timedtext";
pub const TIMEDTEXT_ASR: &str = "timedtext_asr";
pub const WATCH_PAGE: &str = "watch_page";
pub const DATA_API: &str = "data_api";
pub const MIRRORS: &str = "mirrors";

/// Every strategy name, in default priority order
pub const KNOWN_STRATEGIES: &[&str] = &[TIMEDTEXT, TIMEDTEXT_ASR, WATCH_PAGE, DATA_API, MIRRORS];

/// What a strategy hands to the normalizer
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPayload {
    pub raw: RawPayload,
    /// Language of the track actually fetched
    pub language: String,
    pub is_auto_generated: bool,
}

/// One independent acquisition method
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    /// Stable name used in diagnostics and configuration
    fn name(&self) -> &str;

    /// `Err(reason)` when the strategy cannot run at all (missing credential
    /// or key). The orchestrator records it as skipped without calling
    /// [`fetch`](Self::fetch).
    fn availability(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Whether rate-limit failures should be retried with backoff
    fn retry_on_rate_limit(&self) -> bool {
        true
    }

    async fn fetch(&self, video_id: &VideoId, language: &str) -> std::result::Result<StrategyPayload, StrategyError>;
}

/// Build the configured strategy list in priority order
pub fn build_strategies(config: &Config) -> Result<Vec<Arc<dyn TranscriptStrategy>>> {
    let http = Arc::new(HttpFetcher::new(config.http.clone()));

    config
        .strategies
        .order
        .iter()
        .map(|name| -> Result<Arc<dyn TranscriptStrategy>> {
            let strategy: Arc<dyn TranscriptStrategy> = match name.as_str() {
                TIMEDTEXT => Arc::new(TimedTextStrategy::manual(http.clone(), &config.youtube)),
                TIMEDTEXT_ASR => Arc::new(TimedTextStrategy::auto_generated(http.clone(), &config.youtube)),
                WATCH_PAGE => Arc::new(WatchPageStrategy::new(http.clone(), &config.youtube)),
                DATA_API => {
                    let credential = config
                        .auth
                        .oauth_token
                        .clone()
                        .map(|token| Arc::new(StaticTokenCredential::new(token)) as Arc<dyn CaptionCredential>);
                    Arc::new(DataApiStrategy::new(http.clone(), &config.youtube, credential))
                }
                MIRRORS => Arc::new(MirrorStrategy::new(http.clone(), &config.mirrors)),
                other => return Err(anyhow!("Unknown strategy '{}'", other)),
            };
            Ok(strategy)
        })
        .collect()
}
