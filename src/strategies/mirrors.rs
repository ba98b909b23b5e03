/// Third-party mirror and proxy transcript services
use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::http::HttpFetcher;
use super::{StrategyPayload, TranscriptStrategy, MIRRORS};
use crate::config::MirrorConfig;
use crate::error::StrategyError;
use crate::language::{select_track, CaptionTrack};
use crate::normalize::{normalize, RawPayload};
use crate::video_id::VideoId;

const RAPIDAPI_HOST: &str = "youtube-transcript-api.p.rapidapi.com";

#[derive(Debug, Deserialize)]
struct InvidiousCaptionList {
    #[serde(default)]
    captions: Vec<InvidiousCaption>,
}

#[derive(Debug, Deserialize)]
struct InvidiousCaption {
    #[serde(default)]
    label: String,
    #[serde(rename = "languageCode", alias = "language_code")]
    language_code: String,
    url: String,
}

impl CaptionTrack for InvidiousCaption {
    fn language_code(&self) -> &str {
        &self.language_code
    }

    fn is_auto_generated(&self) -> bool {
        self.label.to_lowercase().contains("auto-generated")
    }
}

/// Where one mirror attempt goes
#[derive(Debug, Clone, PartialEq)]
enum MirrorSource {
    Invidious(String),
    Direct(String),
    RapidApi,
}

impl MirrorSource {
    fn label(&self) -> String {
        match self {
            Self::Invidious(instance) => instance.clone(),
            Self::Direct(template) => Url::parse(template)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| template.clone()),
            Self::RapidApi => "rapidapi".to_string(),
        }
    }
}

/// Tries a shuffled subset of Invidious-style instances, then the direct
/// transcript-JSON services in shuffled order, then RapidAPI when a key is configured.
/// The first source whose payload normalizes to at least one segment wins.
pub struct MirrorStrategy {
    http: Arc<HttpFetcher>,
    settings: MirrorConfig,
}

impl MirrorStrategy {
    pub fn new(http: Arc<HttpFetcher>, settings: &MirrorConfig) -> Self {
        Self {
            http,
            settings: settings.clone(),
        }
    }

    /// Both mirror families are shuffled per call to spread load
    fn sources(&self) -> Vec<MirrorSource> {
        let mut rng = rand::thread_rng();
        let mut instances = self.settings.invidious_instances.clone();
        instances.shuffle(&mut rng);
        let mut direct = self.settings.direct_endpoints.clone();
        direct.shuffle(&mut rng);

        let mut sources: Vec<MirrorSource> = instances
            .into_iter()
            .take(self.settings.max_instances_per_attempt)
            .map(|i| MirrorSource::Invidious(i.trim_end_matches('/').to_string()))
            .collect();
        sources.extend(direct.into_iter().map(MirrorSource::Direct));
        if self.settings.rapidapi_key.is_some() {
            sources.push(MirrorSource::RapidApi);
        }
        sources
    }

    async fn try_source(
        &self,
        source: &MirrorSource,
        video_id: &VideoId,
        language: &str,
    ) -> Result<StrategyPayload, StrategyError> {
        match source {
            MirrorSource::Invidious(instance) => self.fetch_invidious(instance, video_id, language).await,
            MirrorSource::Direct(template) => {
                let url = expand_template(template, video_id, language);
                let body = self.http.get_text(&url).await?;
                Ok(StrategyPayload {
                    raw: RawPayload::detect(body),
                    language: language.to_string(),
                    is_auto_generated: false,
                })
            }
            MirrorSource::RapidApi => {
                let key = self
                    .settings
                    .rapidapi_key
                    .as_deref()
                    .ok_or_else(|| StrategyError::NotConfigured("no RapidAPI key".to_string()))?;
                let request = self
                    .http
                    .get(&self.settings.rapidapi_url)
                    .query(&[("video_id", video_id.as_str()), ("language", language)])
                    .header("X-RapidAPI-Key", key)
                    .header("X-RapidAPI-Host", RAPIDAPI_HOST);
                let body = self.http.send_text(request).await?;
                Ok(StrategyPayload {
                    raw: RawPayload::ProxyJson(body),
                    language: language.to_string(),
                    is_auto_generated: false,
                })
            }
        }
    }

    async fn fetch_invidious(
        &self,
        instance: &str,
        video_id: &VideoId,
        language: &str,
    ) -> Result<StrategyPayload, StrategyError> {
        let listing_url = format!("{}/api/v1/captions/{}", instance, video_id);
        let body = self.http.get_text(&listing_url).await?;
        let listing: InvidiousCaptionList = serde_json::from_str(&body)
            .map_err(|e| StrategyError::Parse(format!("invalid caption listing: {}", e)))?;

        let track = select_track(&listing.captions, language, language)
            .ok_or_else(|| StrategyError::Empty("mirror lists no captions".to_string()))?;

        let caption_url = Url::parse(instance)
            .and_then(|base| base.join(&track.url))
            .map_err(|e| StrategyError::Parse(format!("bad caption URL '{}': {}", track.url, e)))?;
        let content = self.http.get_text(caption_url.as_str()).await?;

        Ok(StrategyPayload {
            raw: RawPayload::detect(content),
            language: track.language_code.clone(),
            is_auto_generated: track.is_auto_generated(),
        })
    }
}

fn expand_template(template: &str, video_id: &VideoId, language: &str) -> String {
    template
        .replace("{video_id}", video_id.as_str())
        .replace("{language}", &urlencoding::encode(language))
}

#[async_trait]
impl TranscriptStrategy for MirrorStrategy {
    fn name(&self) -> &str {
        MIRRORS
    }

    fn availability(&self) -> Result<(), String> {
        if self.settings.invidious_instances.is_empty()
            && self.settings.direct_endpoints.is_empty()
            && self.settings.rapidapi_key.is_none()
        {
            return Err("no mirror services configured".to_string());
        }
        Ok(())
    }

    async fn fetch(&self, video_id: &VideoId, language: &str) -> Result<StrategyPayload, StrategyError> {
        let sources = self.sources();
        let mut failures = Vec::with_capacity(sources.len());
        let mut all_rate_limited = true;

        for source in &sources {
            let outcome = match self.try_source(source, video_id, language).await {
                // Validate here so an unusable mirror falls through to the next one
                Ok(payload) => normalize(&payload.raw).map(|_| payload).map_err(StrategyError::from),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(payload) => {
                    info!("🪞 Mirror {} served a transcript for {}", source.label(), video_id);
                    return Ok(payload);
                }
                Err(e) => {
                    debug!("Mirror {} failed: {}", source.label(), e);
                    all_rate_limited &= e.is_rate_limited();
                    failures.push(format!("{}: {}", source.label(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(StrategyError::NotConfigured("no mirror services configured".to_string()));
        }

        let summary = format!("all {} mirror sources failed ({})", failures.len(), failures.join("; "));
        if all_rate_limited {
            Err(StrategyError::RateLimited(summary))
        } else {
            Err(StrategyError::Transport(summary))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn id() -> VideoId {
        "dQw4w9WgXcQ".parse().unwrap()
    }

    fn strategy(settings: MirrorConfig) -> MirrorStrategy {
        MirrorStrategy::new(Arc::new(HttpFetcher::new(HttpConfig::default())), &settings)
    }

    fn empty_settings() -> MirrorConfig {
        MirrorConfig {
            invidious_instances: vec![],
            direct_endpoints: vec![],
            rapidapi_key: None,
            ..MirrorConfig::default()
        }
    }

    #[test]
    fn test_template_expansion() {
        assert_eq!(
            expand_template("https://x/subtitles?video_id={video_id}&language={language}", &id(), "pt-BR"),
            "https://x/subtitles?video_id=dQw4w9WgXcQ&language=pt-BR"
        );
    }

    #[test]
    fn test_source_limit_and_order() {
        let settings = MirrorConfig {
            invidious_instances: (0..6).map(|i| format!("https://inv{}.example", i)).collect(),
            max_instances_per_attempt: 2,
            direct_endpoints: vec!["https://direct.example/{video_id}".to_string()],
            rapidapi_key: Some("k".to_string()),
            ..MirrorConfig::default()
        };
        let sources = strategy(settings).sources();
        assert_eq!(sources.len(), 4);
        assert!(matches!(sources[0], MirrorSource::Invidious(_)));
        assert!(matches!(sources[1], MirrorSource::Invidious(_)));
        assert_eq!(sources[2], MirrorSource::Direct("https://direct.example/{video_id}".to_string()));
        assert_eq!(sources[3], MirrorSource::RapidApi);
    }

    #[test]
    fn test_direct_endpoints_are_shuffled() {
        let endpoints: Vec<String> = (0..8).map(|i| format!("https://direct{}.example/{{video_id}}", i)).collect();
        let settings = MirrorConfig {
            direct_endpoints: endpoints.clone(),
            ..empty_settings()
        };
        let mirrors = strategy(settings);

        let mut saw_reordering = false;
        for _ in 0..20 {
            let order: Vec<String> = mirrors
                .sources()
                .into_iter()
                .map(|source| match source {
                    MirrorSource::Direct(template) => template,
                    other => panic!("unexpected source {:?}", other),
                })
                .collect();
            let mut sorted = order.clone();
            sorted.sort();
            assert_eq!(sorted, endpoints);
            saw_reordering |= order != endpoints;
        }
        assert!(saw_reordering);
    }

    #[test]
    fn test_unconfigured_is_skipped() {
        assert!(strategy(empty_settings()).availability().is_err());
    }

    #[tokio::test]
    async fn test_invidious_vtt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/captions/dQw4w9WgXcQ"))
            .and(query_param("label", "English"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nnever gonna\n\n00:00:02.000 --> 00:00:04.000\ngive you up\n",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/captions/dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "captions": [
                    {"label": "English", "languageCode": "en", "url": "/api/v1/captions/dQw4w9WgXcQ?label=English"}
                ]
            })))
            .mount(&server)
            .await;

        let settings = MirrorConfig {
            invidious_instances: vec![server.uri()],
            ..empty_settings()
        };
        let payload = strategy(settings).fetch(&id(), "en").await.unwrap();
        assert_eq!(payload.language, "en");
        assert!(matches!(payload.raw, RawPayload::WebVtt(_)));
    }

    #[tokio::test]
    async fn test_falls_through_to_direct_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken/dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty/dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success": true, "items": []}"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/subtitles"))
            .and(query_param("video_id", "dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"items": [{"text": "hello", "start": 0, "dur": 1}]}"#,
            ))
            .mount(&server)
            .await;

        let settings = MirrorConfig {
            direct_endpoints: vec![
                format!("{}/broken/{{video_id}}", server.uri()),
                format!("{}/empty/{{video_id}}", server.uri()),
                format!("{}/subtitles?video_id={{video_id}}&language={{language}}", server.uri()),
            ],
            ..empty_settings()
        };
        let payload = strategy(settings).fetch(&id(), "en").await.unwrap();
        assert!(matches!(payload.raw, RawPayload::ProxyJson(_)));
    }

    #[tokio::test]
    async fn test_rapidapi_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/retrieve"))
            .and(query_param("video_id", "dQw4w9WgXcQ"))
            .and(header("X-RapidAPI-Key", "key"))
            .and(header("X-RapidAPI-Host", RAPIDAPI_HOST))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"text": "hi", "start": 1.0, "duration": 2.0}]"#))
            .mount(&server)
            .await;

        let settings = MirrorConfig {
            rapidapi_key: Some("key".to_string()),
            rapidapi_url: format!("{}/retrieve", server.uri()),
            ..empty_settings()
        };
        assert!(strategy(settings).fetch(&id(), "en").await.is_ok());
    }

    #[tokio::test]
    async fn test_all_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let settings = MirrorConfig {
            direct_endpoints: vec![format!("{}/a/{{video_id}}", server.uri()), format!("{}/b/{{video_id}}", server.uri())],
            ..empty_settings()
        };
        let err = strategy(settings).fetch(&id(), "en").await.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("all 2 mirror sources failed"));
    }
}
