//! API request handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use tracing::{error, info, warn};

use super::models::{ApiError, BlogResponse, TranscriptResponse};
use super::server::AppState;
use crate::error::ResolveError;
use crate::transcript::TranscriptResult;

/// Handle health check requests
pub fn health_check() -> Value {
    serde_json::json!({ "status": "ok" })
}

/// Resolve `input` for the transcript endpoints
pub async fn get_transcript(state: &AppState, input: Option<&str>, language: Option<&str>) -> Response {
    match resolve_for_request(state, input, language).await {
        Ok(result) => (StatusCode::OK, Json(TranscriptResponse::from(result))).into_response(),
        Err(response) => response,
    }
}

/// Resolve `input`, then turn the transcript into a blog post
pub async fn generate_blog(state: &AppState, input: Option<&str>, language: Option<&str>) -> Response {
    let Some(generator) = state.blog.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(
                "Blog generation not configured",
                "Set an LLM API key to enable blog generation",
            )),
        )
            .into_response();
    };

    let result = match resolve_for_request(state, input, language).await {
        Ok(result) => result,
        Err(response) => return response,
    };

    if !result.is_available() {
        return (StatusCode::OK, Json(TranscriptResponse::from(result))).into_response();
    }

    match generator.generate(&result).await {
        Ok(post) => (StatusCode::OK, Json(BlogResponse { success: true, post })).into_response(),
        Err(e) => {
            error!("❌ Blog generation failed for {}: {}", result.video_id(), e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiError::new("Blog generation failed", e.to_string())),
            )
                .into_response()
        }
    }
}

/// Common front half of every resolving endpoint: input validation plus a
/// deadline. The resolution future is owned by this call, so expiry or a
/// dropped connection abandons the in-flight strategy with it.
async fn resolve_for_request(
    state: &AppState,
    input: Option<&str>,
    language: Option<&str>,
) -> Result<TranscriptResult, Response> {
    let input = match input.map(str::trim) {
        Some(input) if !input.is_empty() => input,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ApiError::new("Missing URL", "Please provide a YouTube video URL")),
            )
                .into_response())
        }
    };
    let language = language.unwrap_or_default();

    let outcome = tokio::time::timeout(state.request_timeout, state.resolver.resolve(input, language))
        .await
        .unwrap_or(Err(ResolveError::Cancelled));

    match outcome {
        Ok(result) => {
            info!(
                "📤 {} for {}",
                if result.is_available() { "Transcript served" } else { "No transcript" },
                result.video_id()
            );
            Ok(result)
        }
        Err(ResolveError::IdentifierNotFound(_)) => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "Invalid video identifier",
                format!("Could not find a YouTube video ID in '{}'", input),
            )),
        )
            .into_response()),
        Err(ResolveError::Cancelled) => {
            warn!("⏰ Resolution of {} exceeded {:?}", input, state.request_timeout);
            Err((
                StatusCode::GATEWAY_TIMEOUT,
                Json(ApiError::new(
                    "Timed out",
                    format!("No result within {} seconds", state.request_timeout.as_secs()),
                )),
            )
                .into_response())
        }
    }
}
