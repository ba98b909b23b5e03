/// Segment normalization
///
/// Every acquisition strategy hands back a provider-specific payload. This
/// module turns each shape into the canonical ordered list of
/// [`TranscriptSegment`]s. Source order is preserved; nothing is re-sorted.

pub mod json3;
pub mod proxy;
pub mod srt;
pub mod timedtext;

use regex::Regex;
use std::sync::OnceLock;

use crate::error::NormalizeError;
use crate::transcript::TranscriptSegment;

pub use json3::parse_json3;
pub use proxy::parse_proxy_json;
pub use srt::{parse_srt, parse_webvtt};
pub use timedtext::{parse_timedtext_xml, parse_track_list, TimedTextTrack};

/// Raw payload as received from a strategy
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    /// `<transcript><text start dur>..</text></transcript>` (or srv3 `<p t d>`)
    TimedTextXml(String),
    /// `{"events": [{"tStartMs", "dDurationMs", "segs": [{"utf8"}]}]}`
    Json3(String),
    /// SubRip blocks
    Srt(String),
    /// WebVTT cues
    WebVtt(String),
    /// Third-party transcript JSON
    ProxyJson(String),
}

impl RawPayload {
    /// Guess the payload shape from the body of a response whose format is not known up front
    pub fn detect(body: impl Into<String>) -> Self {
        let body = body.into();
        let head = body.trim_start_matches('\u{FEFF}').trim_start();
        if head.starts_with("WEBVTT") {
            Self::WebVtt(body)
        } else if head.starts_with('<') {
            Self::TimedTextXml(body)
        } else if head.starts_with('{') && head.contains("\"events\"") {
            Self::Json3(body)
        } else if head.starts_with('{') || head.starts_with('[') {
            Self::ProxyJson(body)
        } else {
            Self::Srt(body)
        }
    }

    pub fn format_name(&self) -> &'static str {
        match self {
            Self::TimedTextXml(_) => "timedtext-xml",
            Self::Json3(_) => "json3",
            Self::Srt(_) => "srt",
            Self::WebVtt(_) => "webvtt",
            Self::ProxyJson(_) => "proxy-json",
        }
    }
}

/// Normalize a raw payload into ordered segments.
///
/// Zero extractable segments is an error ([`NormalizeError::Empty`]), never an
/// empty success.
pub fn normalize(raw: &RawPayload) -> Result<Vec<TranscriptSegment>, NormalizeError> {
    let segments = match raw {
        RawPayload::TimedTextXml(body) => parse_timedtext_xml(body)?,
        RawPayload::Json3(body) => parse_json3(body)?,
        RawPayload::Srt(body) => parse_srt(body)?,
        RawPayload::WebVtt(body) => parse_webvtt(body)?,
        RawPayload::ProxyJson(body) => parse_proxy_json(body)?,
    };

    if segments.is_empty() {
        return Err(NormalizeError::Empty);
    }
    Ok(segments)
}

pub(crate) fn html_tag_regex() -> &'static Regex {
    static HTML_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    HTML_TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]*>").expect("Failed to compile HTML tag regex"))
}

/// Caption styling tags that only show up once entities are decoded
/// (`&lt;font color="#E5E5E5"&gt;`, `<c.yellow>`). Anything else between
/// angle brackets is caption text.
fn formatting_tag_regex() -> &'static Regex {
    static FORMATTING_TAG_REGEX: OnceLock<Regex> = OnceLock::new();
    FORMATTING_TAG_REGEX.get_or_init(|| {
        Regex::new(
            r#"</?(?:font|b|i|u|c|v|ruby|rt|span)(?:\.[\w.-]+)?(?:\s+[A-Za-z-]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+))*\s*>"#,
        )
        .expect("Failed to compile formatting tag regex")
    })
}

/// Strip literal markup, decode entities (twice for double-escaped
/// payloads), drop decoded styling tags and collapse whitespace.
///
/// Expects text that is still entity-escaped: markup is removed before
/// decoding so that `&lt;3` survives as `<3`.
pub(crate) fn clean_text(text: &str) -> String {
    let stripped = html_tag_regex().replace_all(text, "");
    let once = html_escape::decode_html_entities(&stripped);
    let decoded = if once.contains('&') {
        html_escape::decode_html_entities(&once).into_owned()
    } else {
        once.into_owned()
    };
    let plain = formatting_tag_regex().replace_all(&decoded, "");
    plain.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_formats() {
        assert_eq!(RawPayload::detect("WEBVTT\n\n").format_name(), "webvtt");
        assert_eq!(RawPayload::detect("<?xml version=\"1.0\"?><transcript/>").format_name(), "timedtext-xml");
        assert_eq!(RawPayload::detect("{\"events\": []}").format_name(), "json3");
        assert_eq!(RawPayload::detect("[{\"text\": \"hi\"}]").format_name(), "proxy-json");
        assert_eq!(RawPayload::detect("1\n00:00:01,000 --> 00:00:02,000\nhi").format_name(), "srt");
    }

    #[test]
    fn test_empty_payload_is_an_error() {
        let raw = RawPayload::TimedTextXml("<transcript></transcript>".to_string());
        assert_eq!(normalize(&raw), Err(NormalizeError::Empty));

        let raw = RawPayload::ProxyJson("[]".to_string());
        assert_eq!(normalize(&raw), Err(NormalizeError::Empty));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  it&#39;s <b>bold</b>\n text "), "it's bold text");
        assert_eq!(clean_text("a &amp; b"), "a & b");
    }

    #[test]
    fn test_escaped_angle_brackets_are_text() {
        assert_eq!(clean_text("x &lt;3 you &gt; y"), "x <3 you > y");
        assert_eq!(clean_text("a &lt;i love it&gt; b"), "a <i love it> b");
    }

    #[test]
    fn test_escaped_styling_tags_removed() {
        assert_eq!(
            clean_text("&lt;font color=\"#E5E5E5\"&gt;hello&lt;/font&gt; world"),
            "hello world"
        );
        assert_eq!(clean_text("<c.yellow>bright</c> text"), "bright text");
    }
}
