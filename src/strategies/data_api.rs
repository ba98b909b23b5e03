/// Authenticated YouTube Data API caption download
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::http::HttpFetcher;
use super::{StrategyPayload, TranscriptStrategy, DATA_API};
use crate::config::YouTubeConfig;
use crate::error::StrategyError;
use crate::language::{select_track, CaptionTrack};
use crate::normalize::RawPayload;
use crate::video_id::VideoId;

/// Opaque stored credential. The resolver only needs to know whether one is
/// usable and how to authenticate a single call with it.
pub trait CaptionCredential: Send + Sync {
    fn is_available(&self) -> bool;
    fn bearer_token(&self) -> Option<String>;
}

/// A bearer token supplied through configuration or the environment
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl CaptionCredential for StaticTokenCredential {
    fn is_available(&self) -> bool {
        !self.token.trim().is_empty()
    }

    fn bearer_token(&self) -> Option<String> {
        Some(self.token.clone()).filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct CaptionListResponse {
    #[serde(default)]
    items: Vec<CaptionResource>,
}

#[derive(Debug, Deserialize)]
struct CaptionResource {
    id: String,
    snippet: CaptionSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionSnippet {
    language: String,
    #[serde(default)]
    track_kind: Option<String>,
}

impl CaptionTrack for CaptionResource {
    fn language_code(&self) -> &str {
        &self.snippet.language
    }

    fn is_auto_generated(&self) -> bool {
        self.snippet
            .track_kind
            .as_deref()
            .map(|kind| kind.eq_ignore_ascii_case("asr"))
            .unwrap_or(false)
    }
}

/// `captions.list` then `captions.download` in SRT form.
///
/// Downloads usually require the video owner's consent, so a permission
/// failure here is expected and only recorded as a diagnostic.
pub struct DataApiStrategy {
    http: Arc<HttpFetcher>,
    api_base_url: String,
    fallback_language: String,
    credential: Option<Arc<dyn CaptionCredential>>,
}

impl DataApiStrategy {
    pub fn new(
        http: Arc<HttpFetcher>,
        youtube: &YouTubeConfig,
        credential: Option<Arc<dyn CaptionCredential>>,
    ) -> Self {
        Self {
            http,
            api_base_url: youtube.api_base_url.trim_end_matches('/').to_string(),
            fallback_language: youtube.fallback_language.clone(),
            credential,
        }
    }

    fn token(&self) -> Result<String, StrategyError> {
        self.credential
            .as_ref()
            .and_then(|c| c.bearer_token())
            .ok_or_else(|| StrategyError::NotConfigured("no OAuth credential available".to_string()))
    }
}

#[async_trait]
impl TranscriptStrategy for DataApiStrategy {
    fn name(&self) -> &str {
        DATA_API
    }

    fn availability(&self) -> Result<(), String> {
        match &self.credential {
            Some(credential) if credential.is_available() => Ok(()),
            _ => Err("no OAuth credential available".to_string()),
        }
    }

    async fn fetch(&self, video_id: &VideoId, language: &str) -> Result<StrategyPayload, StrategyError> {
        let token = self.token()?;

        let list_url = format!(
            "{}/youtube/v3/captions?part=snippet&videoId={}",
            self.api_base_url, video_id
        );
        let body = self
            .http
            .send_text(self.http.get(&list_url).bearer_auth(&token))
            .await?;
        let listing: CaptionListResponse = serde_json::from_str(&body)
            .map_err(|e| StrategyError::Parse(format!("invalid captions.list response: {}", e)))?;

        let track = select_track(&listing.items, language, &self.fallback_language)
            .ok_or_else(|| StrategyError::Empty("captions.list returned no tracks".to_string()))?;
        debug!(
            "Data API lists {} tracks, downloading {} ({})",
            listing.items.len(),
            track.id,
            track.snippet.language
        );

        let download_url = format!("{}/youtube/v3/captions/{}?tfmt=srt", self.api_base_url, track.id);
        let srt = self
            .http
            .send_text(self.http.get(&download_url).bearer_auth(&token))
            .await
            .map_err(|e| match e {
                StrategyError::Permission(detail) => StrategyError::Permission(format!(
                    "caption track exists but download is not permitted ({})",
                    detail
                )),
                other => other,
            })?;

        Ok(StrategyPayload {
            raw: RawPayload::Srt(srt),
            language: track.snippet.language.clone(),
            is_auto_generated: track.is_auto_generated(),
        })
    }
}
