//! API data models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::blog::BlogPost;
use crate::transcript::{TranscriptResult, TranscriptSegment};
use crate::video_id::VideoId;

/// Body of `POST /transcript` and `POST /api/blog`
#[derive(Debug, Default, Deserialize)]
pub struct TranscriptRequest {
    pub url: Option<String>,
    pub language: Option<String>,
}

/// Query string of `GET /api/transcript/:id`
#[derive(Debug, Default, Deserialize)]
pub struct LanguageQuery {
    pub language: Option<String>,
}

/// Error response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: Some(message.into()),
        }
    }
}

/// Transcript lookup response. `success` is false when every strategy
/// failed, in which case `diagnostics` explains why per strategy.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub success: bool,
    pub video_id: VideoId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_auto_generated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub transcript: Vec<TranscriptSegment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<BTreeMap<String, String>>,
}

impl From<TranscriptResult> for TranscriptResponse {
    fn from(result: TranscriptResult) -> Self {
        match result {
            TranscriptResult::Available {
                video_id,
                segments,
                language,
                is_auto_generated,
                source,
            } => Self {
                success: true,
                video_id,
                language: Some(language),
                is_auto_generated: Some(is_auto_generated),
                source: Some(source),
                transcript: segments,
                error: None,
                diagnostics: None,
            },
            TranscriptResult::Unavailable {
                video_id,
                reason,
                diagnostics,
            } => Self {
                success: false,
                video_id,
                language: None,
                is_auto_generated: None,
                source: None,
                transcript: Vec::new(),
                error: Some(reason),
                diagnostics: Some(diagnostics),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlogResponse {
    pub success: bool,
    pub post: BlogPost,
}
