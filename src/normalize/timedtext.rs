/// Timed-text XML parsing (transcript bodies and the `type=list` track listing)
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use super::clean_text;
use crate::error::NormalizeError;
use crate::language::CaptionTrack;
use crate::transcript::TranscriptSegment;

/// A caption track advertised by the timed-text track listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedTextTrack {
    pub lang_code: String,
    pub name: String,
    pub kind: Option<String>,
    pub is_default: bool,
}

impl CaptionTrack for TimedTextTrack {
    fn language_code(&self) -> &str {
        &self.lang_code
    }

    fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Timing units differ between the legacy and srv3 dialects
#[derive(Clone, Copy)]
enum Dialect {
    /// `<text start="1.5" dur="2.0">` in seconds
    Legacy,
    /// `<p t="1500" d="2000">` in milliseconds
    Srv3,
}

struct OpenCue {
    start: f64,
    duration: f64,
    text: String,
    depth: usize,
}

fn attr_f64(element: &BytesStart<'_>, key: &[u8]) -> Option<f64> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| String::from_utf8_lossy(&attr.value).trim().parse::<f64>().ok())
}

fn attr_string(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}

fn open_cue(element: &BytesStart<'_>) -> Option<OpenCue> {
    let dialect = match element.name().as_ref() {
        b"text" => Dialect::Legacy,
        b"p" => Dialect::Srv3,
        _ => return None,
    };
    let (start, duration) = match dialect {
        Dialect::Legacy => (
            attr_f64(element, b"start").unwrap_or(0.0),
            attr_f64(element, b"dur").unwrap_or(0.0),
        ),
        Dialect::Srv3 => (
            attr_f64(element, b"t").unwrap_or(0.0) / 1000.0,
            attr_f64(element, b"d").unwrap_or(0.0) / 1000.0,
        ),
    };
    Some(OpenCue {
        start,
        duration,
        text: String::new(),
        depth: 0,
    })
}

/// Parse a timed-text transcript. Missing `start`/`dur` default to zero;
/// entity-escaped content (including double escaping) is decoded.
pub fn parse_timedtext_xml(xml: &str) -> Result<Vec<TranscriptSegment>, NormalizeError> {
    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current: Option<OpenCue> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match current.as_mut() {
                Some(cue) => cue.depth += 1,
                None => current = open_cue(&e),
            },
            Ok(Event::Text(e)) => {
                // Kept escaped; clean_text strips markup before decoding
                if let Some(cue) = current.as_mut() {
                    cue.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(cue) = current.as_mut() {
                    cue.text.push_str(&html_escape::encode_text(&String::from_utf8_lossy(&e)));
                }
            }
            Ok(Event::End(_)) => {
                let closed = match current.as_mut() {
                    Some(cue) if cue.depth > 0 => {
                        cue.depth -= 1;
                        false
                    }
                    Some(_) => true,
                    None => false,
                };
                if closed {
                    if let Some(cue) = current.take() {
                        let text = clean_text(&cue.text);
                        if !text.is_empty() {
                            segments.push(TranscriptSegment::new(text, cue.start, cue.duration));
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(NormalizeError::Malformed(format!(
                    "timed-text XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(segments)
}

/// Parse the `type=list` track listing
pub fn parse_track_list(xml: &str) -> Result<Vec<TimedTextTrack>, NormalizeError> {
    let mut reader = Reader::from_str(xml);
    let mut tracks = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"track" => {
                let Some(lang_code) = attr_string(&e, b"lang_code") else {
                    continue;
                };
                tracks.push(TimedTextTrack {
                    lang_code,
                    name: attr_string(&e, b"name")
                        .filter(|n| !n.is_empty())
                        .or_else(|| attr_string(&e, b"lang_original"))
                        .unwrap_or_default(),
                    kind: attr_string(&e, b"kind").filter(|k| !k.is_empty()),
                    is_default: attr_string(&e, b"lang_default").as_deref() == Some("true"),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(NormalizeError::Malformed(format!(
                    "track list XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(tracks)
}
