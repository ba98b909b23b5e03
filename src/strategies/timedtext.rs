/// Public timed-text endpoint (`/api/timedtext`)
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::http::HttpFetcher;
use super::{StrategyPayload, TranscriptStrategy, TIMEDTEXT, TIMEDTEXT_ASR};
use crate::config::YouTubeConfig;
use crate::error::StrategyError;
use crate::language::{select_track, CaptionTrack};
use crate::normalize::{parse_track_list, RawPayload};
use crate::video_id::VideoId;

/// Direct timed-text lookup.
///
/// The manual variant asks for the requested language and, when the body is
/// empty, consults the track listing and asks again for the best listed track.
/// The auto-generated variant adds `kind=asr` and makes a single request.
pub struct TimedTextStrategy {
    http: Arc<HttpFetcher>,
    base_url: String,
    fallback_language: String,
    auto_generated: bool,
}

impl TimedTextStrategy {
    pub fn manual(http: Arc<HttpFetcher>, youtube: &YouTubeConfig) -> Self {
        Self::build(http, youtube, false)
    }

    pub fn auto_generated(http: Arc<HttpFetcher>, youtube: &YouTubeConfig) -> Self {
        Self::build(http, youtube, true)
    }

    fn build(http: Arc<HttpFetcher>, youtube: &YouTubeConfig, auto_generated: bool) -> Self {
        Self {
            http,
            base_url: youtube.base_url.trim_end_matches('/').to_string(),
            fallback_language: youtube.fallback_language.clone(),
            auto_generated,
        }
    }

    fn transcript_url(&self, video_id: &VideoId, language: &str, name: Option<&str>, asr: bool) -> String {
        let mut url = format!(
            "{}/api/timedtext?lang={}&v={}",
            self.base_url,
            urlencoding::encode(language),
            video_id
        );
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            url.push_str(&format!("&name={}", urlencoding::encode(name)));
        }
        if asr {
            url.push_str("&kind=asr");
        }
        url
    }

    fn payload(&self, body: String, language: &str, is_auto_generated: bool) -> StrategyPayload {
        StrategyPayload {
            raw: RawPayload::TimedTextXml(body),
            language: language.to_string(),
            is_auto_generated,
        }
    }
}

#[async_trait]
impl TranscriptStrategy for TimedTextStrategy {
    fn name(&self) -> &str {
        if self.auto_generated {
            TIMEDTEXT_ASR
        } else {
            TIMEDTEXT
        }
    }

    async fn fetch(&self, video_id: &VideoId, language: &str) -> Result<StrategyPayload, StrategyError> {
        let body = self
            .http
            .get_text(&self.transcript_url(video_id, language, None, self.auto_generated))
            .await?;
        if !body.trim().is_empty() {
            return Ok(self.payload(body, language, self.auto_generated));
        }

        if self.auto_generated {
            return Err(StrategyError::Empty(format!(
                "no auto-generated captions for language '{}'",
                language
            )));
        }

        debug!("Empty timed-text body for {} ({}), consulting track list", video_id, language);
        let list_url = format!("{}/api/timedtext?type=list&v={}", self.base_url, video_id);
        let listing = self.http.get_text(&list_url).await?;
        let tracks = parse_track_list(&listing)?;

        let track = select_track(&tracks, language, &self.fallback_language)
            .ok_or_else(|| StrategyError::Empty("video lists no caption tracks".to_string()))?;

        // Plain re-request of the same language would just repeat the empty body
        if track.lang_code == language && track.name.is_empty() && !track.is_auto_generated() {
            return Err(StrategyError::Empty(format!(
                "listed track '{}' returned an empty body",
                language
            )));
        }

        debug!("Retrying timed-text with listed track {} ({})", track.lang_code, track.name);
        let body = self
            .http
            .get_text(&self.transcript_url(
                video_id,
                &track.lang_code,
                Some(&track.name),
                track.is_auto_generated(),
            ))
            .await?;
        if body.trim().is_empty() {
            return Err(StrategyError::Empty(format!(
                "listed track '{}' returned an empty body",
                track.lang_code
            )));
        }

        Ok(self.payload(body, &track.lang_code, track.is_auto_generated()))
    }
}
