// Prompt construction and response parsing
//
// Renders an enumerated view of the library into a text prompt and maps
// the row numbers a model answers with back to absolute library indices.
// Large libraries are randomly down-sampled before rendering, so the
// mapping returned by build_prompt is the only valid way to translate a
// model's numbers into real tracks.

use std::collections::HashSet;
use std::fmt::Write as _;

use rand::seq::SliceRandom;

use crate::ai::error::GenerateError;
use crate::library::Track;

/// Controls how much of the library is rendered into a prompt and which
/// metadata fields accompany each row. A plain configuration value, passed
/// explicitly wherever it is needed.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub max_tracks_in_prompt: usize,
    pub include_artist: bool,
    pub include_album: bool,
    pub include_genre: bool,
    pub include_year: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_tracks_in_prompt: 1500,
            include_artist: true,
            include_album: true,
            include_genre: true,
            include_year: true,
        }
    }
}

/// Build the curation prompt for `user_request` over `library`.
///
/// Returns the prompt text and the sampled indices: entry `i` of the
/// returned vector is the absolute library index shown as row `i + 1`.
/// When the library fits under `max_tracks_in_prompt` every index is
/// included in order; otherwise a uniform random subset is drawn without
/// replacement and sorted ascending, so row order stays monotonic even
/// though selection was random.
pub fn build_prompt(
    user_request: &str,
    library: &[Track],
    config: &PromptConfig,
) -> (String, Vec<usize>) {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a music playlist curator. Based on the user's request, \
         select songs from the provided library that best match their description.\n\n",
    );
    let _ = writeln!(prompt, "User's request: \"{user_request}\"\n");

    let sampled = sample_indices(library.len(), config.max_tracks_in_prompt);
    if sampled.len() < library.len() {
        let _ = writeln!(
            prompt,
            "Note: Your library has {} tracks. Showing a random sample of {}.\n",
            library.len(),
            sampled.len()
        );
    }

    prompt.push_str("Available songs in library:\n");
    for (row, &idx) in sampled.iter().enumerate() {
        let track = &library[idx];
        let _ = write!(prompt, "{}. {}", row + 1, track.display_title());
        if config.include_artist {
            if let Some(artist) = &track.artist {
                let _ = write!(prompt, " - {artist}");
            }
        }
        if config.include_album {
            if let Some(album) = &track.album {
                let _ = write!(prompt, " ({album})");
            }
        }
        if config.include_genre {
            if let Some(genre) = &track.genre {
                let _ = write!(prompt, " [{genre}]");
            }
        }
        if config.include_year {
            if let Some(year) = track.year {
                let _ = write!(prompt, " {{{year}}}");
            }
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "\nRespond with ONLY a JSON array of song numbers that match the user's request. \
         Select 10-30 songs that best fit the description. \
         Example response: [1, 5, 12, 23, 45]\n",
    );

    (prompt, sampled)
}

fn sample_indices(library_len: usize, max_tracks: usize) -> Vec<usize> {
    if library_len <= max_tracks {
        return (0..library_len).collect();
    }
    let mut all: Vec<usize> = (0..library_len).collect();
    all.shuffle(&mut rand::thread_rng());
    all.truncate(max_tracks);
    all.sort_unstable();
    all
}

/// Parse a model reply into absolute library indices via the sampled-row
/// mapping produced by [`build_prompt`].
///
/// The reply may wrap the array in prose; everything between the first
/// `[` and the last `]` is parsed as JSON. Each integer is a 1-based row
/// number; out-of-range, non-integer and duplicate entries are dropped
/// silently. A reply with no parseable array fails with
/// [`GenerateError::NoParseableArray`]; an array that filters down to
/// nothing fails with [`GenerateError::EmptyFinalSelection`].
pub fn parse_row_numbers(
    response_text: &str,
    sampled_indices: &[usize],
) -> Result<Vec<usize>, GenerateError> {
    let values = extract_json_array(response_text)?;

    let mut seen = HashSet::new();
    let mut playlist = Vec::new();
    for value in values {
        let Some(row) = value.as_i64() else { continue };
        if row < 1 || row as usize > sampled_indices.len() {
            continue;
        }
        let original = sampled_indices[row as usize - 1];
        if seen.insert(original) {
            playlist.push(original);
        }
    }

    if playlist.is_empty() {
        return Err(GenerateError::EmptyFinalSelection);
    }
    Ok(playlist)
}

/// Parse a model reply whose numbers are already 0-based absolute library
/// indices (the tool-calling path, which never samples the library).
pub fn parse_absolute_indices(
    response_text: &str,
    library_len: usize,
) -> Result<Vec<usize>, GenerateError> {
    let values = extract_json_array(response_text)?;

    let mut seen = HashSet::new();
    let mut playlist = Vec::new();
    for value in values {
        let Some(idx) = value.as_i64() else { continue };
        if idx < 0 || idx as usize >= library_len {
            continue;
        }
        let idx = idx as usize;
        if seen.insert(idx) {
            playlist.push(idx);
        }
    }

    if playlist.is_empty() {
        return Err(GenerateError::EmptyFinalSelection);
    }
    Ok(playlist)
}

fn extract_json_array(response_text: &str) -> Result<Vec<serde_json::Value>, GenerateError> {
    let start = response_text.find('[');
    let end = response_text.rfind(']');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(GenerateError::NoParseableArray);
    };
    if start >= end {
        return Err(GenerateError::NoParseableArray);
    }

    let slice = &response_text[start..=end];
    match serde_json::from_str::<serde_json::Value>(slice) {
        Ok(serde_json::Value::Array(values)) => Ok(values),
        Ok(_) | Err(_) => Err(GenerateError::NoParseableArray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::testing::track;

    fn library(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| {
                track(
                    Some("Artist"),
                    Some(&format!("Song {i}")),
                    Some("Album"),
                    Some("Rock"),
                    Some(1990 + (i % 30) as i32),
                )
            })
            .collect()
    }

    #[test]
    fn small_library_keeps_every_index_in_order() {
        let lib = library(10);
        let config = PromptConfig {
            max_tracks_in_prompt: 100,
            ..PromptConfig::default()
        };
        let (prompt, sampled) = build_prompt("anything upbeat", &lib, &config);
        assert_eq!(sampled, (0..10).collect::<Vec<_>>());
        assert!(!prompt.contains("random sample"));
    }

    #[test]
    fn large_library_samples_sorted_unique_valid_indices() {
        let lib = library(500);
        let config = PromptConfig {
            max_tracks_in_prompt: 50,
            ..PromptConfig::default()
        };
        let (prompt, sampled) = build_prompt("anything", &lib, &config);
        assert_eq!(sampled.len(), 50);
        assert!(sampled.windows(2).all(|w| w[0] < w[1]));
        assert!(sampled.iter().all(|&i| i < lib.len()));
        assert!(prompt.contains("random sample of 50"));
    }

    #[test]
    fn rows_render_fields_in_fixed_order() {
        let lib = vec![track(
            Some("David Bowie"),
            Some("Heroes"),
            Some("Heroes"),
            Some("Rock"),
            Some(1977),
        )];
        let (prompt, _) = build_prompt("classic rock", &lib, &PromptConfig::default());
        assert!(prompt.contains("1. Heroes - David Bowie (Heroes) [Rock] {1977}"));
    }

    #[test]
    fn disabled_fields_are_omitted() {
        let lib = vec![track(
            Some("David Bowie"),
            Some("Heroes"),
            Some("Heroes"),
            Some("Rock"),
            Some(1977),
        )];
        let config = PromptConfig {
            include_album: false,
            include_year: false,
            ..PromptConfig::default()
        };
        let (prompt, _) = build_prompt("classic rock", &lib, &config);
        assert!(prompt.contains("1. Heroes - David Bowie [Rock]\n"));
    }

    #[test]
    fn parse_maps_rows_through_sampled_indices_in_reply_order() {
        let sampled = vec![3, 7, 12, 40];
        let reply = "Here you go!\n\n[2, 4, 1]\n\nEnjoy the set.";
        assert_eq!(parse_row_numbers(reply, &sampled).unwrap(), vec![7, 40, 3]);
    }

    #[test]
    fn parse_drops_out_of_range_duplicates_and_non_integers() {
        let sampled = vec![3, 7, 12];
        let reply = r#"[0, 1, 1, "two", 2, 99, -4, 2.5]"#;
        assert_eq!(parse_row_numbers(reply, &sampled).unwrap(), vec![3, 7]);
    }

    #[test]
    fn parse_without_array_is_no_parseable_array() {
        let err = parse_row_numbers("no numbers here, sorry", &[1, 2]).unwrap_err();
        assert!(matches!(err, GenerateError::NoParseableArray));
        let err = parse_row_numbers("broken [1, 2", &[1, 2]).unwrap_err();
        assert!(matches!(err, GenerateError::NoParseableArray));
    }

    #[test]
    fn parse_with_zero_survivors_is_empty_selection() {
        let err = parse_row_numbers("[99, 100]", &[1, 2]).unwrap_err();
        assert!(matches!(err, GenerateError::EmptyFinalSelection));
        let err = parse_row_numbers("[]", &[1, 2]).unwrap_err();
        assert!(matches!(err, GenerateError::EmptyFinalSelection));
    }

    #[test]
    fn absolute_parse_bounds_checks_against_library() {
        let reply = "Final answer: [0, 5, 5, 11, 3]";
        assert_eq!(parse_absolute_indices(reply, 10).unwrap(), vec![0, 5, 3]);
    }
}
