use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::{LLMConfig, LLMProvider};
use crate::strategies::KNOWN_STRATEGIES;

/// Configuration for the transcript resolver
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Outbound HTTP settings shared by every strategy
    pub http: HttpConfig,

    /// YouTube endpoints and language preferences
    pub youtube: YouTubeConfig,

    /// Which strategies run, and in what order
    pub strategies: StrategiesConfig,

    /// Backoff for rate-limited strategies
    pub retry: RetryConfig,

    /// Mirror and proxy transcript services
    pub mirrors: MirrorConfig,

    /// Credentials for the official Data API
    pub auth: AuthConfig,

    /// Result caching
    pub cache: CacheConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// LLM settings for blog generation
    pub llm: LLMConfig,

    /// Blog generation settings
    pub blog: BlogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Optional outbound proxy URL
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// Base URL for the watch page and timed-text endpoint
    pub base_url: String,

    /// Base URL for the Data API
    pub api_base_url: String,

    /// Language requested when the caller does not name one
    pub default_language: String,

    /// Language preferred when the requested one has no track
    pub fallback_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategiesConfig {
    /// Strategy names in priority order
    pub order: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per strategy, including the first
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound on a single backoff delay in milliseconds
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Invidious-style instances exposing `/api/v1/captions/{id}`
    pub invidious_instances: Vec<String>,

    /// How many shuffled instances to try per resolution
    pub max_instances_per_attempt: usize,

    /// URL templates returning transcript JSON directly.
    /// `{video_id}` and `{language}` are substituted.
    pub direct_endpoints: Vec<String>,

    /// RapidAPI key for the hosted transcript endpoint
    pub rapidapi_key: Option<String>,

    /// RapidAPI transcript endpoint
    pub rapidapi_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth bearer token for the Data API captions endpoints
    pub oauth_token: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable result caching
    pub enabled: bool,

    /// Where cached results live
    pub backend: CacheBackend,

    /// Directory for the file backend
    pub dir: PathBuf,

    /// Time-to-live in hours
    pub ttl_hours: u64,

    /// Also cache `Unavailable` results
    pub cache_unavailable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Resolution deadline per request; expiry cancels the in-flight work
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    /// Transcript text beyond this many characters is cut before prompting
    pub max_transcript_chars: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            proxy: None,
        }
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            api_base_url: "https://www.googleapis.com".to_string(),
            default_language: "en".to_string(),
            fallback_language: "en".to_string(),
        }
    }
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            order: KNOWN_STRATEGIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            invidious_instances: [
                "https://invidious.snopyta.org",
                "https://yewtu.be",
                "https://vid.puffyan.us",
                "https://invidious.kavin.rocks",
                "https://invidious.namazso.eu",
                "https://inv.riverside.rocks",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_instances_per_attempt: 3,
            direct_endpoints: vec![
                "https://gotranscript.com/api/show-video-cc/{video_id}".to_string(),
                "https://yt.lemnoslife.com/subtitles?video_id={video_id}&language={language}".to_string(),
                "https://ytsub.herokuapp.com/api/transcript?id={video_id}&lang={language}".to_string(),
            ],
            rapidapi_key: None,
            rapidapi_url: "https://youtube-transcript-api.p.rapidapi.com/retrieve".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            dir: PathBuf::from("./cache/transcripts"),
            ttl_hours: 24,
            cache_unavailable: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_seconds: 60,
        }
    }
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            max_transcript_chars: 30_000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

impl Config {
    /// Load configuration from the first readable config file, falling back
    /// to defaults. Environment overrides are applied on top either way.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "transcript-resolver.toml",
            "config/transcript-resolver.toml",
            "~/.config/transcript-resolver/config.toml",
            "/etc/transcript-resolver/config.toml",
        ];

        for path in &config_paths {
            let path = expand_home(path);
            if let Ok(config_str) = std::fs::read_to_string(&path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        config.apply_env_overrides();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from an explicit file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("YOUTUBE_OAUTH_TOKEN") {
            self.auth.oauth_token = Some(token).filter(|t| !t.is_empty());
        }

        if let Ok(key) = std::env::var("RAPIDAPI_KEY") {
            self.mirrors.rapidapi_key = Some(key).filter(|k| !k.is_empty());
        }

        match self.llm.provider {
            LLMProvider::Gemini => {
                if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                    self.llm.api_key = Some(key);
                }
            }
            LLMProvider::OpenAI => {
                if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                    self.llm.api_key = Some(key);
                }
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port.parse().unwrap_or(self.server.port);
        }

        if let Ok(language) = std::env::var("TRANSCRIPT_RESOLVER_LANGUAGE") {
            self.youtube.default_language = language;
        }

        if let Ok(dir) = std::env::var("TRANSCRIPT_RESOLVER_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }

        if let Ok(proxy) = std::env::var("TRANSCRIPT_RESOLVER_PROXY") {
            self.http.proxy = Some(proxy).filter(|p| !p.is_empty());
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be greater than 0"));
        }

        if self.http.timeout_seconds == 0 {
            return Err(anyhow!("http.timeout_seconds must be greater than 0"));
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(anyhow!("server.request_timeout_seconds must be greater than 0"));
        }

        if self.strategies.order.is_empty() {
            return Err(anyhow!("strategies.order must name at least one strategy"));
        }

        if let Some(unknown) = self
            .strategies
            .order
            .iter()
            .find(|name| !KNOWN_STRATEGIES.contains(&name.as_str()))
        {
            return Err(anyhow!(
                "Unknown strategy '{}' (expected one of: {})",
                unknown,
                KNOWN_STRATEGIES.join(", ")
            ));
        }

        if self.youtube.default_language.trim().is_empty() {
            return Err(anyhow!("youtube.default_language must not be empty"));
        }

        if let Some(proxy) = &self.http.proxy {
            url::Url::parse(proxy).map_err(|e| anyhow!("Invalid proxy URL '{}': {}", proxy, e))?;
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Transcript Resolver Configuration:\n\
            - Strategies: {}\n\
            - Default Language: {} (fallback {})\n\
            - HTTP Timeout: {}s\n\
            - Retry: {} attempts, {}ms base delay\n\
            - Data API Credential: {}\n\
            - Mirrors: {} instances, {} direct endpoints, RapidAPI {}\n\
            - Cache: {} ({:?}, {}h TTL)",
            self.strategies.order.join(" → "),
            self.youtube.default_language,
            self.youtube.fallback_language,
            self.http.timeout_seconds,
            self.retry.max_attempts,
            self.retry.base_delay_ms,
            if self.auth.oauth_token.is_some() { "present" } else { "absent" },
            self.mirrors.invidious_instances.len(),
            self.mirrors.direct_endpoints.len(),
            if self.mirrors.rapidapi_key.is_some() { "enabled" } else { "disabled" },
            if self.cache.enabled { "enabled" } else { "disabled" },
            self.cache.backend,
            self.cache.ttl_hours,
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.config.youtube.default_language = language.to_string();
        self
    }

    pub fn with_strategy_order(mut self, order: &[&str]) -> Self {
        self.config.strategies.order = order.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_youtube_base_url(mut self, url: &str) -> Self {
        self.config.youtube.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_base_url(mut self, url: &str) -> Self {
        self.config.youtube.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_oauth_token(mut self, token: &str) -> Self {
        self.config.auth.oauth_token = Some(token.to_string());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.http.timeout_seconds = seconds;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.config.retry.max_attempts = max_attempts;
        self.config.retry.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_invidious_instances(mut self, instances: Vec<String>) -> Self {
        self.config.mirrors.invidious_instances = instances;
        self
    }

    pub fn with_direct_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.config.mirrors.direct_endpoints = endpoints;
        self
    }

    pub fn with_rapidapi_key(mut self, key: &str) -> Self {
        self.config.mirrors.rapidapi_key = Some(key.to_string());
        self
    }

    pub fn with_cache_backend(mut self, backend: CacheBackend) -> Self {
        self.config.cache.backend = backend;
        self
    }

    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.config.cache.dir = dir;
        self
    }

    pub fn enable_caching(mut self, enable: bool) -> Self {
        self.config.cache.enabled = enable;
        self
    }

    pub fn cache_unavailable(mut self, enable: bool) -> Self {
        self.config.cache.cache_unavailable = enable;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
