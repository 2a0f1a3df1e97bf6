// Track model for the music library
//
// The engine never scans or decodes audio itself. A caller supplies an
// ordered slice of Track records (from a tag scanner, a cache file, a
// cloud listing) and gets back indices into that same slice. Indices are
// only meaningful while the slice is unchanged.

use serde::{Deserialize, Serialize};

/// Descriptive metadata for a single audio item plus its location.
///
/// `file_path` is the unique identifier and may point outside the local
/// filesystem (e.g. a `dropbox://` reference). All tag fields are optional
/// because real libraries are full of half-tagged files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub file_path: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration_ms: i64,
    /// Last modification time (unix seconds), used by callers for cache
    /// invalidation. The engine itself never interprets it.
    #[serde(default)]
    pub modified_at: i64,
}

impl Track {
    /// The name shown to a model or a user: the tag title when present,
    /// the file name otherwise.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.file_name)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Track;

    /// Build a track with the fields most tests care about.
    pub(crate) fn track(
        artist: Option<&str>,
        title: Option<&str>,
        album: Option<&str>,
        genre: Option<&str>,
        year: Option<i32>,
    ) -> Track {
        let file_name = format!("{}.mp3", title.unwrap_or("untitled"));
        Track {
            file_path: format!("/music/{file_name}"),
            file_name,
            title: title.map(str::to_string),
            artist: artist.map(str::to_string),
            album: album.map(str::to_string),
            genre: genre.map(str::to_string),
            year,
            duration_ms: 180_000,
            modified_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::track;
    use super::*;

    #[test]
    fn display_title_prefers_tag_title() {
        let t = track(Some("Bowie"), Some("Heroes"), None, None, Some(1977));
        assert_eq!(t.display_title(), "Heroes");
    }

    #[test]
    fn display_title_falls_back_to_file_name() {
        let t = Track {
            file_path: "/music/07 - unknown.flac".to_string(),
            file_name: "07 - unknown.flac".to_string(),
            title: None,
            artist: None,
            album: None,
            genre: None,
            year: None,
            duration_ms: 0,
            modified_at: 0,
        };
        assert_eq!(t.display_title(), "07 - unknown.flac");
    }

    #[test]
    fn serialization_skips_absent_fields() {
        let t = track(None, Some("Instrumental"), None, None, None);
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains("Instrumental"));
        assert!(!json.contains("artist"));
        assert!(!json.contains("genre"));
    }
}
