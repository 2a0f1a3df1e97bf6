// Keyword matching backend
//
// The no-network fallback: extract keywords from the request, score every
// track by weighted field matches, return the best scorers. Deterministic
// apart from nothing at all; ties keep library order.

use std::collections::BTreeSet;

use log::{debug, info};

use crate::ai::error::GenerateError;
use crate::ai::StreamSink;
use crate::library::Track;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "songs", "music", "tracks",
    "playlist",
];

// Field weights. Artist is the strongest signal a request carries.
const ARTIST_WEIGHT: f64 = 5.0;
const GENRE_WEIGHT: f64 = 4.0;
const ALBUM_WEIGHT: f64 = 2.0;
const TITLE_WEIGHT: f64 = 2.0;
const YEAR_WEIGHT: f64 = 3.0;

pub struct KeywordBackend {
    max_results: usize,
    min_score: f64,
}

impl Default for KeywordBackend {
    fn default() -> Self {
        Self {
            max_results: 50,
            min_score: 0.0,
        }
    }
}

struct TrackScore {
    index: usize,
    score: f64,
    reason: String,
}

impl KeywordBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_max_results(&mut self, max_results: usize) {
        self.max_results = max_results;
    }

    pub fn set_min_score(&mut self, min_score: f64) {
        self.min_score = min_score;
    }

    pub fn name(&self) -> String {
        "Keyword Matching".to_string()
    }

    /// The keyword backend has no external dependencies to check.
    pub fn validate(&self) -> Result<(), GenerateError> {
        Ok(())
    }

    pub async fn generate(
        &self,
        user_request: &str,
        library: &[Track],
        mut sink: Option<&mut dyn StreamSink>,
        verbose: bool,
    ) -> Result<Vec<usize>, GenerateError> {
        if library.is_empty() {
            return Err(GenerateError::EmptyLibrary);
        }

        info!("keyword backend: generating playlist for prompt: '{user_request}'");
        info!("library size: {} tracks", library.len());

        let keywords = extract_keywords(user_request);
        if keywords.is_empty() {
            return Err(GenerateError::EmptyKeywordSet);
        }
        debug!(
            "keywords: {}",
            keywords.iter().cloned().collect::<Vec<_>>().join(", ")
        );

        let mut scored: Vec<TrackScore> = Vec::new();
        for (index, track) in library.iter().enumerate() {
            let (score, reason) = score_track(track, &keywords);
            if score > self.min_score {
                scored.push(TrackScore {
                    index,
                    score,
                    reason,
                });
            }
        }

        if scored.is_empty() {
            return Err(GenerateError::NoKeywordMatches);
        }

        // Stable sort: equal scores keep their library order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.max_results);

        if verbose {
            for (rank, ts) in scored.iter().take(10).enumerate() {
                let track = &library[ts.index];
                info!(
                    "  {}. {} - {} (score: {}) [{}]",
                    rank + 1,
                    track.artist.as_deref().unwrap_or("Unknown"),
                    track.display_title(),
                    ts.score,
                    ts.reason
                );
            }
        }

        let playlist: Vec<usize> = scored.iter().map(|ts| ts.index).collect();

        // No token stream here; report the selection once.
        if let Some(sink) = sink.as_deref_mut() {
            let text = serde_json::to_string(&playlist).unwrap_or_default();
            sink.push(&text, true);
        }

        info!("generated playlist with {} tracks", playlist.len());
        Ok(playlist)
    }
}

/// Lowercase the text and replace everything that is not alphanumeric
/// with spaces, so "synth-pop!" tokenizes the same as "synth pop".
fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect()
}

fn extract_keywords(text: &str) -> BTreeSet<String> {
    normalize_text(text)
        .split_whitespace()
        .filter(|word| word.len() >= 2 && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

fn score_track(track: &Track, keywords: &BTreeSet<String>) -> (f64, String) {
    let artist = normalize_text(track.artist.as_deref().unwrap_or(""));
    let title = normalize_text(track.title.as_deref().unwrap_or(""));
    let album = normalize_text(track.album.as_deref().unwrap_or(""));
    let genre = normalize_text(track.genre.as_deref().unwrap_or(""));

    let mut score = 0.0;
    let mut matches: Vec<String> = Vec::new();

    for keyword in keywords {
        if artist.contains(keyword.as_str()) {
            score += ARTIST_WEIGHT;
            matches.push(format!("artist:{keyword}"));
        }
        if genre.contains(keyword.as_str()) {
            score += GENRE_WEIGHT;
            matches.push(format!("genre:{keyword}"));
        }
        if album.contains(keyword.as_str()) {
            score += ALBUM_WEIGHT;
            matches.push(format!("album:{keyword}"));
        }
        if title.contains(keyword.as_str()) {
            score += TITLE_WEIGHT;
            matches.push(format!("title:{keyword}"));
        }
        if matches_year(keyword, track.year) {
            score += YEAR_WEIGHT;
            matches.push(format!("year:{keyword}"));
        }
    }

    let mut reason = String::new();
    if !matches.is_empty() {
        reason.push_str("Matched: ");
        reason.push_str(&matches[..matches.len().min(3)].join(", "));
        if matches.len() > 3 {
            reason.push_str("...");
        }
    }

    (score, reason)
}

/// Year keywords come in three shapes: an exact year ("1977"), a decade
/// shorthand ("80s" covers 1980-1989 in any century), and era words.
fn matches_year(keyword: &str, year: Option<i32>) -> bool {
    let Some(year) = year else { return false };
    let year_str = year.to_string();

    if keyword == year_str {
        return true;
    }

    let bytes = keyword.as_bytes();
    if bytes.len() == 3 && bytes[1] == b'0' && bytes[2] == b's' {
        // "80s": compare the decade digit.
        if year_str.len() >= 3 && year_str.as_bytes()[2] == bytes[0] {
            return true;
        }
    }

    match keyword {
        "recent" | "new" | "modern" => year >= 2015,
        "classic" | "old" | "vintage" => year <= 1990,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::testing::track;

    fn scenario_library() -> Vec<Track> {
        vec![
            track(Some("Bowie"), Some("Heroes"), None, None, Some(1977)),
            track(Some("Beatles"), Some("Let It Be"), None, None, Some(1970)),
            track(Some("Daft Punk"), Some("One More Time"), None, None, Some(2000)),
        ]
    }

    #[test]
    fn keywords_are_normalized_and_filtered() {
        let kws = extract_keywords("Give me some CLASSIC rock songs, please!");
        assert!(kws.contains("classic"));
        assert!(kws.contains("rock"));
        assert!(kws.contains("give"));
        // Stop words and single characters are dropped.
        assert!(!kws.contains("me"));
        assert!(!kws.contains("songs"));
        assert!(!kws.contains("a"));
    }

    #[test]
    fn punctuation_splits_into_tokens() {
        let kws = extract_keywords("synth-pop/new-wave");
        assert!(kws.contains("synth"));
        assert!(kws.contains("pop"));
        assert!(kws.contains("wave"));
    }

    #[test]
    fn field_weights_follow_artist_genre_year_album_title_order() {
        let t = track(Some("Orbital"), Some("Halcyon"), Some("Orbital 2"), Some("Techno"), Some(1993));
        let (artist_score, _) = score_track(&t, &["orbital".to_string()].into_iter().collect());
        // "orbital" hits both artist and album.
        assert_eq!(artist_score, ARTIST_WEIGHT + ALBUM_WEIGHT);

        let (genre_score, _) = score_track(&t, &["techno".to_string()].into_iter().collect());
        assert_eq!(genre_score, GENRE_WEIGHT);

        let (year_score, reason) = score_track(&t, &["1993".to_string()].into_iter().collect());
        assert_eq!(year_score, YEAR_WEIGHT);
        assert!(reason.contains("year:1993"));
    }

    #[test]
    fn year_matching_recognizes_decades_and_eras() {
        assert!(matches_year("1985", Some(1985)));
        assert!(!matches_year("1985", Some(1986)));
        assert!(matches_year("80s", Some(1983)));
        assert!(!matches_year("80s", Some(1990)));
        assert!(matches_year("00s", Some(2005)));
        assert!(matches_year("recent", Some(2020)));
        assert!(!matches_year("recent", Some(2010)));
        assert!(matches_year("classic", Some(1975)));
        assert!(!matches_year("classic", Some(1995)));
        assert!(!matches_year("classic", None));
    }

    #[test]
    fn adding_a_matching_keyword_never_lowers_a_score() {
        let t = track(Some("Daft Punk"), Some("One More Time"), Some("Discovery"), Some("House"), Some(2000));
        let base: BTreeSet<String> = ["house".to_string()].into_iter().collect();
        let (base_score, _) = score_track(&t, &base);

        let mut extended = base.clone();
        extended.insert("daft".to_string());
        let (extended_score, _) = score_track(&t, &extended);
        assert!(extended_score >= base_score);
    }

    #[tokio::test]
    async fn classic_scenario_selects_only_pre_1990_tracks_in_order() {
        let library = scenario_library();
        let backend = KeywordBackend::new();
        let playlist = backend
            .generate("give me something classic", &library, None, false)
            .await
            .unwrap();
        // Both score the same era match; tie keeps library order.
        assert_eq!(playlist, vec![0, 1]);
    }

    #[tokio::test]
    async fn stop_word_only_prompt_is_an_empty_keyword_set() {
        let library = scenario_library();
        let backend = KeywordBackend::new();
        let err = backend
            .generate("the songs music playlist a an", &library, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::EmptyKeywordSet));
    }

    #[tokio::test]
    async fn unmatched_keywords_fail_with_no_matches() {
        let library = scenario_library();
        let backend = KeywordBackend::new();
        let err = backend
            .generate("norwegian black metal", &library, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::NoKeywordMatches));
    }

    #[tokio::test]
    async fn results_are_truncated_to_max_results() {
        let library: Vec<Track> = (0..80)
            .map(|i| track(Some("Daft Punk"), Some(&format!("Track {i}")), None, Some("House"), Some(2001)))
            .collect();
        let mut backend = KeywordBackend::new();
        backend.set_max_results(10);
        let playlist = backend
            .generate("daft punk house", &library, None, false)
            .await
            .unwrap();
        assert_eq!(playlist.len(), 10);
        // Identical scores throughout, so the first ten indices survive.
        assert_eq!(playlist, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn higher_scores_sort_first() {
        let library = vec![
            track(Some("Various"), Some("House Mix"), None, None, None),
            track(Some("Daft Punk"), Some("One More Time"), None, Some("House"), Some(2000)),
        ];
        let backend = KeywordBackend::new();
        let playlist = backend
            .generate("daft punk house", &library, None, false)
            .await
            .unwrap();
        // Track 1 matches artist twice plus genre; track 0 only title.
        assert_eq!(playlist[0], 1);
    }

    #[tokio::test]
    async fn empty_library_fails_immediately() {
        let backend = KeywordBackend::new();
        let err = backend.generate("anything", &[], None, false).await.unwrap_err();
        assert!(matches!(err, GenerateError::EmptyLibrary));
    }

    #[tokio::test]
    async fn selection_is_reported_through_the_sink() {
        let library = scenario_library();
        let backend = KeywordBackend::new();
        let mut streamed = Vec::new();
        let mut sink = |chunk: &str, is_final: bool| {
            streamed.push((chunk.to_string(), is_final));
        };
        backend
            .generate("classic", &library, Some(&mut sink), false)
            .await
            .unwrap();
        assert_eq!(streamed.len(), 1);
        assert!(streamed[0].1);
        assert_eq!(streamed[0].0, "[0,1]");
    }
}
