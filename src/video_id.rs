/// YouTube video identifier parsing
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::ResolveError;

/// Length of every YouTube video identifier
pub const VIDEO_ID_LEN: usize = 11;

/// An 11-character YouTube video identifier drawn from `[A-Za-z0-9_-]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch-page URL for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for VideoId {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_video_id(s).ok_or_else(|| ResolveError::IdentifierNotFound(s.to_string()))
    }
}

impl TryFrom<String> for VideoId {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_bare_id(&value) {
            Ok(Self(value))
        } else {
            Err(ResolveError::IdentifierNotFound(value))
        }
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

fn bare_id_regex() -> &'static Regex {
    static BARE_ID: OnceLock<Regex> = OnceLock::new();
    BARE_ID.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("Failed to compile video id regex"))
}

/// URL shapes in the order they are tried
fn url_shape_regexes() -> &'static [Regex] {
    static SHAPES: OnceLock<Vec<Regex>> = OnceLock::new();
    SHAPES.get_or_init(|| {
        [
            r"watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"youtu\.be/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"/embed/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"/v/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"/u/[^/?#]+/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
            r"/shorts/([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Failed to compile URL shape regex"))
        .collect()
    })
}

fn is_bare_id(input: &str) -> bool {
    bare_id_regex().is_match(input)
}

/// Extract a video identifier from a bare ID or any supported URL shape.
///
/// Pure and deterministic: no I/O, no allocation beyond the returned ID.
pub fn parse_video_id(input: &str) -> Option<VideoId> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if is_bare_id(input) {
        return Some(VideoId(input.to_string()));
    }

    url_shape_regexes()
        .iter()
        .find_map(|re| re.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| VideoId(m.as_str().to_string()))
}
