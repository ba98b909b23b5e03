/// Caption track discovery through the watch page
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::http::{looks_rate_limited, HttpFetcher};
use super::{StrategyPayload, TranscriptStrategy, WATCH_PAGE};
use crate::config::YouTubeConfig;
use crate::error::StrategyError;
use crate::language::{select_track, CaptionTrack};
use crate::normalize::RawPayload;
use crate::video_id::VideoId;

const PLAYER_RESPONSE_MARKER: &str = "ytInitialPlayerResponse";
const CAPTION_TRACKS_MARKER: &str = "\"captionTracks\":";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<WatchCaptionTrack>,
}

/// A caption track embedded in the watch page's player response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchCaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    name: Option<TrackName>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Deserialize)]
struct TextRun {
    text: String,
}

impl WatchCaptionTrack {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(TrackName { simple_text: Some(text), .. }) => text.clone(),
            Some(TrackName { runs, .. }) => runs.iter().map(|r| r.text.as_str()).collect(),
            None => self.language_code.clone(),
        }
    }
}

impl CaptionTrack for WatchCaptionTrack {
    fn language_code(&self) -> &str {
        &self.language_code
    }

    fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Parse the first JSON value starting at `start`, ignoring whatever follows
fn parse_json_prefix<T: DeserializeOwned>(text: &str, start: usize) -> Option<T> {
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<T>()
        .next()
        .and_then(|r| r.ok())
}

fn player_response_in(script: &str) -> Option<PlayerResponse> {
    let marker = script.find(PLAYER_RESPONSE_MARKER)?;
    let brace = script[marker..].find('{')? + marker;
    parse_json_prefix(script, brace)
}

/// Locate `ytInitialPlayerResponse` inside the page's inline scripts
fn extract_player_response(html: &str) -> Option<PlayerResponse> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script").ok()?;

    document
        .select(&selector)
        .map(|script| script.text().collect::<String>())
        .filter(|text| text.contains(PLAYER_RESPONSE_MARKER))
        .find_map(|text| player_response_in(&text))
}

/// Last resort when the player response is not a clean JSON object:
/// pull the bare `"captionTracks":[...]` array out of the page
fn extract_caption_tracks_fragment(html: &str) -> Option<Vec<WatchCaptionTrack>> {
    let marker = html.find(CAPTION_TRACKS_MARKER)?;
    parse_json_prefix(html, marker + CAPTION_TRACKS_MARKER.len())
}

/// Turn `playabilityStatus` into a descriptive failure
fn check_playability(status: &PlayabilityStatus) -> Result<(), StrategyError> {
    let code = status.status.as_deref().unwrap_or("OK");
    if code == "OK" {
        return Ok(());
    }
    let reason = status.reason.clone().unwrap_or_else(|| "no reason given".to_string());
    let lower = reason.to_lowercase();

    if lower.contains("not a bot") || lower.contains("unusual traffic") {
        return Err(StrategyError::RateLimited(format!("{}: {}", code, reason)));
    }
    match code {
        "LOGIN_REQUIRED" | "AGE_CHECK_REQUIRED" | "CONTENT_CHECK_REQUIRED" => {
            Err(StrategyError::Permission(format!("{}: {}", code, reason)))
        }
        _ => Err(StrategyError::Empty(format!("video not playable ({}): {}", code, reason))),
    }
}

/// Find the caption tracks advertised by a watch page
pub fn caption_tracks_from_page(html: &str) -> Result<Vec<WatchCaptionTrack>, StrategyError> {
    match extract_player_response(html) {
        Some(player) => {
            if let Some(status) = &player.playability_status {
                check_playability(status)?;
            }
            let tracks = player
                .captions
                .and_then(|c| c.renderer)
                .map(|r| r.caption_tracks)
                .unwrap_or_default();
            if tracks.is_empty() {
                return Err(StrategyError::Empty("video has no caption tracks".to_string()));
            }
            Ok(tracks)
        }
        None => match extract_caption_tracks_fragment(html) {
            Some(tracks) if !tracks.is_empty() => Ok(tracks),
            _ if looks_rate_limited(html) => Err(StrategyError::RateLimited(
                "watch page replaced by a captcha".to_string(),
            )),
            _ => Err(StrategyError::Parse(
                "no player response or caption track list in watch page".to_string(),
            )),
        },
    }
}

/// Fetch the watch page, pick a caption track, download it as JSON3
pub struct WatchPageStrategy {
    http: Arc<HttpFetcher>,
    base_url: String,
    fallback_language: String,
}

impl WatchPageStrategy {
    pub fn new(http: Arc<HttpFetcher>, youtube: &YouTubeConfig) -> Self {
        Self {
            http,
            base_url: youtube.base_url.trim_end_matches('/').to_string(),
            fallback_language: youtube.fallback_language.clone(),
        }
    }

    fn track_url(&self, base_url: &str) -> String {
        let absolute = if base_url.starts_with('/') {
            format!("{}{}", self.base_url, base_url)
        } else {
            base_url.to_string()
        };
        let separator = if absolute.contains('?') { '&' } else { '?' };
        format!("{}{}fmt=json3", absolute, separator)
    }
}

#[async_trait]
impl TranscriptStrategy for WatchPageStrategy {
    fn name(&self) -> &str {
        WATCH_PAGE
    }

    async fn fetch(&self, video_id: &VideoId, language: &str) -> Result<StrategyPayload, StrategyError> {
        let page_url = format!("{}/watch?v={}", self.base_url, video_id);
        let html = self.http.get_text(&page_url).await?;

        let tracks = caption_tracks_from_page(&html)?;
        let track = select_track(&tracks, language, &self.fallback_language)
            .ok_or_else(|| StrategyError::Empty("video has no caption tracks".to_string()))?;
        debug!(
            "Watch page offers {} tracks, using {} ({})",
            tracks.len(),
            track.language_code,
            track.display_name()
        );

        let body = self.http.get_text(&self.track_url(&track.base_url)).await?;
        if body.trim().is_empty() {
            return Err(StrategyError::Empty(format!(
                "caption track '{}' returned an empty body",
                track.language_code
            )));
        }

        Ok(StrategyPayload {
            raw: RawPayload::Json3(body),
            language: track.language_code.clone(),
            is_auto_generated: track.is_auto_generated(),
        })
    }
}
