/// JSON3 caption payloads (`&fmt=json3` on a caption track URL)
use serde::Deserialize;

use crate::error::NormalizeError;
use crate::transcript::TranscriptSegment;

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: f64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: f64,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse a JSON3 document. Events without `segs` (window and style events)
/// are skipped; the `utf8` pieces of each remaining event are concatenated.
pub fn parse_json3(body: &str) -> Result<Vec<TranscriptSegment>, NormalizeError> {
    let document: Json3Document = serde_json::from_str(body)
        .map_err(|e| NormalizeError::Malformed(format!("invalid JSON3 document: {}", e)))?;

    let segments = document
        .events
        .into_iter()
        .filter_map(|event| {
            let segs = event.segs?;
            let text: String = segs.iter().map(|seg| seg.utf8.as_str()).collect();
            let text = text.replace('\n', " ");
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment::new(
                text,
                event.start_ms / 1000.0,
                event.duration_ms / 1000.0,
            ))
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_without_segs_are_skipped() {
        let body = r#"{
            "wireMagic": "pb3",
            "events": [
                {"tStartMs": 0, "dDurationMs": 500000, "id": 1, "wpWinPosId": 1},
                {"tStartMs": 1200, "dDurationMs": 3400, "wWinId": 1,
                 "segs": [{"utf8": "Hello "}, {"utf8": "world", "tOffsetMs": 400}]}
            ]
        }"#;
        let segments = parse_json3(body).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Hello world");
        assert_eq!(segments[0].start, 1.2);
        assert_eq!(segments[0].duration, 3.4);
    }

    #[test]
    fn test_newline_only_events_dropped() {
        let body = r#"{"events": [
            {"tStartMs": 0, "dDurationMs": 10, "segs": [{"utf8": "\n"}]},
            {"tStartMs": 10, "segs": [{"utf8": "line one\nline two"}]}
        ]}"#;
        let segments = parse_json3(body).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "line one line two");
        assert_eq!(segments[0].duration, 0.0);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_json3("{not json"), Err(NormalizeError::Malformed(_))));
    }
}
