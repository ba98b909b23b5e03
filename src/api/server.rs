//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::handlers;
use super::models::{LanguageQuery, TranscriptRequest};
use crate::blog::BlogGenerator;
use crate::config::Config;
use crate::resolver::TranscriptResolver;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<TranscriptResolver>,
    pub config: Arc<Config>,
    /// `None` when no LLM key is configured
    pub blog: Option<Arc<BlogGenerator>>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(resolver: Arc<TranscriptResolver>, config: Arc<Config>) -> Self {
        let request_timeout = Duration::from_secs(config.server.request_timeout_seconds);
        Self {
            resolver,
            config,
            blog: None,
            request_timeout,
        }
    }

    pub fn with_blog(mut self, generator: Arc<BlogGenerator>) -> Self {
        self.blog = Some(generator);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolver plus, when the LLM settings allow it, a blog generator
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let resolver = Arc::new(TranscriptResolver::from_config(&config)?);
        let state = Self::new(resolver, config.clone());

        match BlogGenerator::from_config(&config) {
            Ok(generator) => Ok(state.with_blog(Arc::new(generator))),
            Err(e) => {
                warn!("⚠️ Blog endpoint disabled: {}", e);
                Ok(state)
            }
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Configure CORS to allow browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        // Health check endpoints (both paths for compatibility)
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))

        .route("/transcript", post(transcript_handler))
        .route("/api/transcript/:id", get(transcript_by_id_handler))
        .route("/api/blog", post(blog_handler))

        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Configure and start the HTTP server
pub async fn start_http_server(state: AppState, host: &str, port: u16) -> Result<()> {
    info!("🚀 Starting HTTP server on port {}", port);
    info!("🔧 Strategies: {}", state.resolver.strategy_names().join(" → "));

    let app = build_router(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!("🌐 API server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(handlers::health_check()))
}

async fn transcript_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TranscriptRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    handlers::get_transcript(&state, request.url.as_deref(), request.language.as_deref()).await
}

async fn transcript_by_id_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LanguageQuery>,
) -> impl IntoResponse {
    handlers::get_transcript(&state, Some(id.as_str()), query.language.as_deref()).await
}

async fn blog_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TranscriptRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    handlers::generate_blog(&state, request.url.as_deref(), request.language.as_deref()).await
}
