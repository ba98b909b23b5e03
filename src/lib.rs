//! YouTube Transcript Resolver
//!
//! Fetches a video's transcript through whichever of several unreliable
//! channels still works (timed-text endpoints, the watch page, the Data API,
//! third-party mirrors), normalizes every payload into one segment model and
//! optionally turns the result into a blog post.

pub mod blog;
pub mod cache;
pub mod config;
pub mod error;
pub mod language;
pub mod llm;
pub mod normalize;
pub mod resolver;
pub mod retry;
pub mod strategies;
pub mod transcript;
pub mod video_id;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::blog::{BlogGenerator, BlogPost};
pub use crate::cache::{CacheKey, FileCache, MemoryCache, TranscriptCache};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{NormalizeError, ResolveError, StrategyError};
pub use crate::llm::{LLMConfig, LLMProvider};
pub use crate::normalize::{normalize, RawPayload};
pub use crate::resolver::TranscriptResolver;
pub use crate::retry::RetryPolicy;
pub use crate::strategies::{StrategyPayload, TranscriptStrategy};
pub use crate::transcript::{TranscriptResult, TranscriptSegment};
pub use crate::video_id::{parse_video_id, VideoId};
