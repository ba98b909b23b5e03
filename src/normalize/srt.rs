/// SubRip and WebVTT cue parsing
use std::time::Duration;

use super::clean_text;
use crate::error::NormalizeError;
use crate::transcript::TranscriptSegment;

/// Parse SubRip text. Blocks are separated by blank lines, multi-line cue
/// text is joined with a space, and blocks without a timing line are skipped.
pub fn parse_srt(body: &str) -> Result<Vec<TranscriptSegment>, NormalizeError> {
    Ok(parse_cues(body, false))
}

/// Parse WebVTT. The header and NOTE/STYLE/REGION blocks carry no timing line
/// and fall out naturally; cue settings after the end timestamp are ignored.
pub fn parse_webvtt(body: &str) -> Result<Vec<TranscriptSegment>, NormalizeError> {
    let head = body.trim_start_matches('\u{FEFF}').trim_start();
    if !head.starts_with("WEBVTT") {
        return Err(NormalizeError::Malformed("missing WEBVTT header".to_string()));
    }
    Ok(parse_cues(head, true))
}

fn parse_cues(body: &str, collapse_repeats: bool) -> Vec<TranscriptSegment> {
    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");
    let mut segments: Vec<TranscriptSegment> = Vec::new();

    for block in split_blocks(&normalized) {
        let Some(timing_index) = block.iter().position(|line| line.contains("-->")) else {
            continue;
        };
        let Some((start, end)) = parse_timing_line(block[timing_index]) else {
            tracing::debug!("Skipping cue with unreadable timing: {}", block[timing_index]);
            continue;
        };

        let text = clean_text(&block[timing_index + 1..].join(" "));
        if text.is_empty() {
            continue;
        }
        // Rolling auto-captions repeat the previous line verbatim
        if collapse_repeats && segments.last().map(|s| s.text == text).unwrap_or(false) {
            continue;
        }

        let start_secs = start.as_secs_f64();
        let duration = end.saturating_sub(start).as_secs_f64();
        segments.push(TranscriptSegment::new(text, start_secs, duration));
    }

    segments
}

fn split_blocks(body: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn parse_timing_line(line: &str) -> Option<(Duration, Duration)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    let start = parse_single_timestamp(start.trim()).ok()?;
    let end = parse_single_timestamp(end).ok()?;
    Some((start, end))
}

/// Parse a single timestamp (HH:MM:SS,mmm, HH:MM:SS.mmm or MM:SS.mmm)
pub fn parse_single_timestamp(timestamp: &str) -> Result<Duration, NormalizeError> {
    let invalid = || NormalizeError::Malformed(format!("Invalid timestamp: {}", timestamp));

    let (clock, fraction) = match timestamp.rsplit_once([',', '.']) {
        Some((clock, fraction)) => (clock, fraction),
        None => (timestamp, "0"),
    };

    let hms_parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match hms_parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return Err(invalid()),
    };

    let hours: u64 = hours.trim().parse().map_err(|_| invalid())?;
    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: u64 = seconds.parse().map_err(|_| invalid())?;

    // Fractions shorter than three digits are tenths or hundredths
    let digits: String = fraction.chars().take(3).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let milliseconds: u64 = format!("{:0<3}", digits).parse().map_err(|_| invalid())?;

    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|s| s.checked_add(seconds))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(milliseconds))
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}
