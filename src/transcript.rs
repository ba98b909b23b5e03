/// Canonical transcript types shared by every strategy
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::StrategyError;
use crate::video_id::VideoId;

/// Reason attached to every exhausted resolution
pub const NO_STRATEGY_REASON: &str = "no strategy produced a transcript";

/// One timed span of transcript text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Caption text
    pub text: String,
    /// Start offset in seconds
    pub start: f64,
    /// Duration in seconds
    pub duration: f64,
}

impl TranscriptSegment {
    /// Create a segment, clamping negative or non-finite timings to zero
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start: non_negative(start),
            duration: non_negative(duration),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Outcome of one resolution run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranscriptResult {
    Available {
        video_id: VideoId,
        segments: Vec<TranscriptSegment>,
        language: String,
        is_auto_generated: bool,
        /// Name of the strategy that produced the transcript
        source: String,
    },
    Unavailable {
        video_id: VideoId,
        reason: String,
        /// Strategy name to failure detail
        diagnostics: BTreeMap<String, String>,
    },
}

impl TranscriptResult {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    pub fn video_id(&self) -> &VideoId {
        match self {
            Self::Available { video_id, .. } | Self::Unavailable { video_id, .. } => video_id,
        }
    }

    /// Segments, empty when unavailable
    pub fn segments(&self) -> &[TranscriptSegment] {
        match self {
            Self::Available { segments, .. } => segments,
            Self::Unavailable { .. } => &[],
        }
    }

    /// Plain text with segments joined by single spaces
    pub fn plain_text(&self) -> String {
        self.segments()
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// End of the last segment
    pub fn total_duration(&self) -> Duration {
        let end = self
            .segments()
            .iter()
            .map(TranscriptSegment::end)
            .fold(0.0_f64, f64::max);
        Duration::from_secs_f64(end)
    }

    /// Render as SubRip text
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments().iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                format_srt_timestamp(segment.start),
                format_srt_timestamp(segment.end()),
                segment.text.trim()
            ));
        }
        out
    }
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_srt_timestamp(seconds: f64) -> String {
    let total_millis = (non_negative(seconds) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// What happened when one strategy was tried
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success { segment_count: usize },
    Failure(StrategyError),
    Skipped(String),
}

/// Transient record of a single strategy attempt within one resolution run
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyAttempt {
    pub strategy: String,
    pub outcome: AttemptOutcome,
    pub attempts: u32,
}

impl StrategyAttempt {
    /// Detail string stored in the diagnostics map
    pub fn detail(&self) -> String {
        match &self.outcome {
            AttemptOutcome::Success { segment_count } => {
                format!("succeeded with {} segments", segment_count)
            }
            AttemptOutcome::Failure(err) if self.attempts > 1 => {
                format!("[{}] {} (after {} attempts)", err.kind(), err, self.attempts)
            }
            AttemptOutcome::Failure(err) => format!("[{}] {}", err.kind(), err),
            AttemptOutcome::Skipped(reason) => format!("skipped: {}", reason),
        }
    }
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.detail())
    }
}

/// Build the diagnostics map from accumulated attempts
pub fn diagnostics_from(attempts: &[StrategyAttempt]) -> BTreeMap<String, String> {
    attempts
        .iter()
        .map(|a| (a.strategy.clone(), a.detail()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> VideoId {
        "dQw4w9WgXcQ".parse().unwrap()
    }

    fn available() -> TranscriptResult {
        TranscriptResult::Available {
            video_id: id(),
            segments: vec![
                TranscriptSegment::new("Hello", 0.0, 1.5),
                TranscriptSegment::new("  world ", 1.5, 2.0),
            ],
            language: "en".to_string(),
            is_auto_generated: false,
            source: "timedtext".to_string(),
        }
    }

    #[test]
    fn test_segment_clamps_negative_timings() {
        let segment = TranscriptSegment::new("x", -3.0, f64::NAN);
        assert_eq!(segment.start, 0.0);
        assert_eq!(segment.duration, 0.0);
    }

    #[test]
    fn test_plain_text_and_duration() {
        let result = available();
        assert_eq!(result.plain_text(), "Hello world");
        assert_eq!(result.total_duration(), Duration::from_secs_f64(3.5));
    }

    #[test]
    fn test_srt_rendering() {
        let srt = available().to_srt();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,500\nHello\n\n"));
        assert!(srt.contains("2\n00:00:01,500 --> 00:00:03,500\nworld\n"));
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_srt_timestamp(3661.0), "01:01:01,000");
        assert_eq!(format_srt_timestamp(1.5), "00:00:01,500");
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
    }

    #[test]
    fn test_unavailable_is_not_a_segment_list() {
        let result = TranscriptResult::Unavailable {
            video_id: id(),
            reason: NO_STRATEGY_REASON.to_string(),
            diagnostics: BTreeMap::new(),
        };
        assert!(!result.is_available());
        assert!(result.segments().is_empty());
        assert_eq!(result.plain_text(), "");
    }

    #[test]
    fn test_serialization_is_tagged() {
        let json = serde_json::to_value(available()).unwrap();
        assert_eq!(json["status"], "available");
        assert_eq!(json["video_id"], "dQw4w9WgXcQ");
        assert_eq!(json["segments"][0]["text"], "Hello");
    }

    #[test]
    fn test_attempt_detail() {
        let attempt = StrategyAttempt {
            strategy: "timedtext".to_string(),
            outcome: AttemptOutcome::Failure(StrategyError::RateLimited("HTTP 429".into())),
            attempts: 3,
        };
        assert_eq!(attempt.detail(), "[transport] Rate limited: HTTP 429 (after 3 attempts)");

        let skipped = StrategyAttempt {
            strategy: "data_api".to_string(),
            outcome: AttemptOutcome::Skipped("no OAuth credential".into()),
            attempts: 0,
        };
        assert_eq!(skipped.to_string(), "data_api: skipped: no OAuth credential");
    }
}
