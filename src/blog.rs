/// Blog post generation from a resolved transcript
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::llm::{create_llm, ChatMessage, LLMError, LLM};
use crate::transcript::TranscriptResult;
use crate::video_id::VideoId;

#[derive(thiserror::Error, Debug)]
pub enum BlogError {
    #[error("No transcript available for {video_id}: {reason}")]
    TranscriptUnavailable { video_id: VideoId, reason: String },

    #[error(transparent)]
    Llm(#[from] LLMError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub video_id: VideoId,
    pub title: String,
    /// Markdown body as returned by the model
    pub content: String,
    pub language: String,
    /// Whether the transcript was cut to fit the prompt budget
    pub transcript_truncated: bool,
    pub tokens_used: Option<u32>,
    pub generated_at: DateTime<Utc>,
}

pub struct BlogGenerator {
    llm: Box<dyn LLM>,
    max_transcript_chars: usize,
}

impl BlogGenerator {
    pub fn new(llm: Box<dyn LLM>, max_transcript_chars: usize) -> Self {
        Self {
            llm,
            max_transcript_chars,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, LLMError> {
        Ok(Self::new(create_llm(&config.llm)?, config.blog.max_transcript_chars))
    }

    pub async fn generate(&self, transcript: &TranscriptResult) -> Result<BlogPost, BlogError> {
        let (video_id, language) = match transcript {
            TranscriptResult::Available { video_id, language, .. } => (video_id, language),
            TranscriptResult::Unavailable { video_id, reason, .. } => {
                return Err(BlogError::TranscriptUnavailable {
                    video_id: video_id.clone(),
                    reason: reason.clone(),
                })
            }
        };

        let (text, truncated) = truncate_text(&transcript.plain_text(), self.max_transcript_chars);
        info!(
            "📝 Generating blog post for {} from {} characters of transcript{}",
            video_id,
            text.chars().count(),
            if truncated { " (truncated)" } else { "" }
        );

        let response = self.llm.chat(build_prompt(&text, language)).await?;
        let content = response.content.trim().to_string();

        Ok(BlogPost {
            video_id: video_id.clone(),
            title: extract_title(&content).unwrap_or_else(|| format!("Notes on video {}", video_id)),
            content,
            language: language.clone(),
            transcript_truncated: truncated,
            tokens_used: response.tokens_used,
            generated_at: Utc::now(),
        })
    }
}

pub fn build_prompt(transcript_text: &str, language: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You turn video transcripts into well-structured blog posts written in Markdown. \
             Start with a single '# ' title line, then an introduction, sections with '## ' headings \
             and a short conclusion. Write in the transcript's language ({}). Do not invent facts \
             that are not in the transcript.",
            language
        )),
        ChatMessage::user(format!("Transcript:\n\n{}", transcript_text)),
    ]
}

/// Cut `text` to at most `max_chars` characters, preferring a word boundary
pub fn truncate_text(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some((byte_index, _)) => {
            let head = &text[..byte_index];
            let cut = head.rfind(char::is_whitespace).filter(|&i| i > 0).unwrap_or(head.len());
            (head[..cut].trim_end().to_string(), true)
        }
    }
}

fn extract_title(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}
