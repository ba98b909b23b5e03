/// Caption track language preference
///
/// Every strategy that sees a list of tracks picks one with the same rules:
///
/// 1. exact language code, manual before auto-generated
/// 2. same primary subtag (`en` matches `en-US`), manual first
/// 3. the fallback language, manual first
/// 4. the first manual track
/// 5. the first track
pub trait CaptionTrack {
    fn language_code(&self) -> &str;
    fn is_auto_generated(&self) -> bool;
}

fn primary_subtag(code: &str) -> String {
    code.split(['-', '_'])
        .next()
        .unwrap_or(code)
        .to_ascii_lowercase()
}

fn pick<'a, T, F>(tracks: &'a [T], matches: F) -> Option<&'a T>
where
    T: CaptionTrack,
    F: Fn(&T) -> bool,
{
    tracks
        .iter()
        .filter(|t| matches(t))
        .find(|t| !t.is_auto_generated())
        .or_else(|| tracks.iter().find(|t| matches(t)))
}

/// Choose the best track for `language`, or `None` if the list is empty
pub fn select_track<'a, T: CaptionTrack>(
    tracks: &'a [T],
    language: &str,
    fallback_language: &str,
) -> Option<&'a T> {
    if tracks.is_empty() {
        return None;
    }

    let wanted = language.trim();
    let wanted_primary = primary_subtag(wanted);
    let fallback = fallback_language.trim();

    pick(tracks, |t| t.language_code().eq_ignore_ascii_case(wanted))
        .or_else(|| pick(tracks, |t| primary_subtag(t.language_code()) == wanted_primary))
        .or_else(|| pick(tracks, |t| t.language_code().eq_ignore_ascii_case(fallback)))
        .or_else(|| tracks.iter().find(|t| !t.is_auto_generated()))
        .or_else(|| tracks.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Track(&'static str, bool);

    impl CaptionTrack for Track {
        fn language_code(&self) -> &str {
            self.0
        }
        fn is_auto_generated(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn test_exact_match_prefers_manual() {
        let tracks = [Track("en", true), Track("de", false), Track("en", false)];
        assert_eq!(select_track(&tracks, "en", "en"), Some(&Track("en", false)));
    }

    #[test]
    fn test_exact_asr_beats_other_language() {
        let tracks = [Track("de", false), Track("fr", true)];
        assert_eq!(select_track(&tracks, "fr", "en"), Some(&Track("fr", true)));
    }

    #[test]
    fn test_region_prefix_match() {
        let tracks = [Track("de", false), Track("en-GB", false)];
        assert_eq!(select_track(&tracks, "en", "en"), Some(&Track("en-GB", false)));
        assert_eq!(select_track(&tracks, "de-AT", "en"), Some(&Track("de", false)));
    }

    #[test]
    fn test_fallback_language_then_first_manual() {
        let tracks = [Track("ja", true), Track("en", true), Track("ko", false)];
        assert_eq!(select_track(&tracks, "fr", "en"), Some(&Track("en", true)));
        assert_eq!(select_track(&tracks, "fr", "pt"), Some(&Track("ko", false)));
    }

    #[test]
    fn test_first_track_when_all_auto() {
        let tracks = [Track("ja", true), Track("ko", true)];
        assert_eq!(select_track(&tracks, "fr", "pt"), Some(&Track("ja", true)));
        let empty: [Track; 0] = [];
        assert_eq!(select_track(&empty, "en", "en"), None);
    }
}
