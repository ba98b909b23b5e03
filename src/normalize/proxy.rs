/// Third-party transcript JSON
///
/// Proxy services disagree on envelope and field names. The envelope may be a
/// bare array or an object wrapping the array; item fields are mapped from the
/// common aliases below. Absent numeric fields default to zero.
use serde_json::Value;

use crate::error::NormalizeError;
use crate::transcript::TranscriptSegment;

const ENVELOPE_KEYS: &[&str] = &["items", "transcript", "captions", "subtitles", "segments", "data"];
const TEXT_KEYS: &[&str] = &["text", "caption", "utf8", "content"];
const START_KEYS: &[&str] = &["start", "startTime", "start_time", "offset"];
const DURATION_KEYS: &[&str] = &["duration", "dur"];

pub fn parse_proxy_json(body: &str) -> Result<Vec<TranscriptSegment>, NormalizeError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| NormalizeError::Malformed(format!("invalid transcript JSON: {}", e)))?;

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("service reported failure");
        return Err(NormalizeError::Malformed(message.to_string()));
    }

    let items = locate_items(&value, 2)
        .ok_or_else(|| NormalizeError::Malformed("no transcript item array in response".to_string()))?;

    Ok(items.iter().filter_map(item_to_segment).collect())
}

fn locate_items(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) if depth > 0 => ENVELOPE_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|inner| locate_items(inner, depth - 1)),
        _ => None,
    }
}

fn first_of<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| item.get(*key))
}

fn as_seconds(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn item_to_segment(item: &Value) -> Option<TranscriptSegment> {
    let text = first_of(item, TEXT_KEYS)?.as_str()?;
    let text = super::clean_text(text);
    if text.is_empty() {
        return None;
    }

    let start = as_seconds(first_of(item, START_KEYS)).unwrap_or(0.0);
    let duration = as_seconds(first_of(item, DURATION_KEYS))
        .or_else(|| as_seconds(item.get("end")).map(|end| end - start))
        .unwrap_or(0.0);

    Some(TranscriptSegment::new(text, start, duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_array() {
        let body = r#"[{"text": "one", "start": 0.5, "dur": 1.5}, {"text": "two", "start": "2.0", "duration": "1"}]"#;
        let segments = parse_proxy_json(body).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].duration, 1.5);
        assert_eq!(segments[1].start, 2.0);
        assert_eq!(segments[1].duration, 1.0);
    }

    #[test]
    fn test_items_envelope_with_caption_aliases() {
        let body = r#"{"success": true, "items": [{"caption": "it&#39;s", "startTime": 3, "duration": 2}]}"#;
        let segments = parse_proxy_json(body).unwrap();
        assert_eq!(segments[0].text, "it's");
        assert_eq!(segments[0].start, 3.0);
    }

    #[test]
    fn test_escaped_angle_brackets_kept_as_text() {
        let body = r#"[{"text": "x &lt;3 you &gt; y", "start": 0, "dur": 1}]"#;
        let segments = parse_proxy_json(body).unwrap();
        assert_eq!(segments[0].text, "x <3 you > y");
    }

    #[test]
    fn test_missing_numbers_default_to_zero() {
        let body = r#"{"transcript": [{"text": "no timing"}]}"#;
        let segments = parse_proxy_json(body).unwrap();
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].duration, 0.0);
    }

    #[test]
    fn test_nested_envelope_and_end_field() {
        let body = r#"{"data": {"segments": [{"text": "x", "start": 1, "end": 4}]}}"#;
        let segments = parse_proxy_json(body).unwrap();
        assert_eq!(segments[0].duration, 3.0);
    }

    #[test]
    fn test_service_failure() {
        let body = r#"{"success": false, "message": "video not found"}"#;
        assert_eq!(
            parse_proxy_json(body),
            Err(NormalizeError::Malformed("video not found".to_string()))
        );
    }

    #[test]
    fn test_no_array() {
        assert!(matches!(
            parse_proxy_json(r#"{"hello": "world"}"#),
            Err(NormalizeError::Malformed(_))
        ));
    }
}
