/// Shared HTTP plumbing for every strategy
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::error::StrategyError;

/// Phrases only ever seen on YouTube's block/interstitial pages
const RATE_LIMIT_MARKERS: &[&str] = &[
    "too many requests",
    "unusual traffic",
    "our systems have detected",
    "/sorry/index",
];

/// Lazily built `reqwest` client shared by all strategies of a resolver.
///
/// Nothing touches the network or builds a connection pool until the first
/// request is made.
pub struct HttpFetcher {
    settings: HttpConfig,
    client: OnceLock<Client>,
}

impl HttpFetcher {
    pub fn new(settings: HttpConfig) -> Self {
        Self {
            settings,
            client: OnceLock::new(),
        }
    }

    pub fn client(&self) -> &Client {
        self.client.get_or_init(|| {
            let mut builder = Client::builder()
                .timeout(self.settings.timeout())
                .user_agent(self.settings.user_agent.as_str());

            if let Some(proxy) = &self.settings.proxy {
                match reqwest::Proxy::all(proxy.as_str()) {
                    Ok(proxy) => builder = builder.proxy(proxy),
                    Err(e) => warn!("Ignoring invalid proxy {}: {}", proxy, e),
                }
            }

            builder.build().unwrap_or_else(|e| {
                warn!("Failed to build configured HTTP client ({}), using defaults", e);
                Client::new()
            })
        })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client().get(url)
    }

    /// GET a URL and return its body, classifying failures
    pub async fn get_text(&self, url: &str) -> Result<String, StrategyError> {
        self.send_text(self.get(url)).await
    }

    /// Send a prepared request and return its body, classifying failures
    pub async fn send_text(&self, request: RequestBuilder) -> Result<String, StrategyError> {
        let response = request.send().await?;
        read_body(response).await
    }
}

async fn read_body(response: Response) -> Result<String, StrategyError> {
    let status = response.status();
    let url = response.url().to_string();
    debug!("HTTP {} from {}", status.as_u16(), url);

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(StrategyError::RateLimited(format!("HTTP 429 from {}", url)));
    }

    if response.url().path().starts_with("/sorry/") {
        return Err(StrategyError::RateLimited(
            "redirected to the unusual-traffic interstitial".to_string(),
        ));
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(StrategyError::Permission(format!("HTTP {} from {}", status.as_u16(), url)));
    }

    if !status.is_success() {
        return Err(StrategyError::HttpStatus {
            status: status.as_u16(),
            url,
        });
    }

    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    let body = response.text().await?;

    if is_html && looks_rate_limited(&body) && !body.contains("ytInitialPlayerResponse") {
        return Err(StrategyError::RateLimited(format!("block page served by {}", url)));
    }

    Ok(body)
}

/// Whether a page body is a rate-limit or captcha page
pub fn looks_rate_limited(body: &str) -> bool {
    let lower = body.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(HttpConfig::default())
    }

    #[test]
    fn test_rate_limit_markers() {
        assert!(looks_rate_limited("<html>Our systems have detected unusual traffic</html>"));
        assert!(looks_rate_limited("429 Too Many Requests"));
        assert!(!looks_rate_limited("<transcript><text>hello</text></transcript>"));
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forbidden"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/captcha"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<html>Our systems have detected unusual traffic from your computer network</html>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
            .mount(&server)
            .await;

        let http = fetcher();
        let url = |p: &str| format!("{}{}", server.uri(), p);

        assert!(http.get_text(&url("/limited")).await.unwrap_err().is_rate_limited());
        assert!(matches!(
            http.get_text(&url("/forbidden")).await,
            Err(StrategyError::Permission(_))
        ));
        assert!(matches!(
            http.get_text(&url("/missing")).await,
            Err(StrategyError::HttpStatus { status: 404, .. })
        ));
        assert!(http.get_text(&url("/captcha")).await.unwrap_err().is_rate_limited());
        assert_eq!(http.get_text(&url("/ok")).await.unwrap(), "fine");
    }

    #[tokio::test]
    async fn test_sorry_redirect_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("{}/sorry/index", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sorry/index"))
            .respond_with(ResponseTemplate::new(200).set_body_string("captcha"))
            .mount(&server)
            .await;

        let err = fetcher().get_text(&format!("{}/watch", server.uri())).await.unwrap_err();
        assert!(err.is_rate_limited());
    }
}
