// Library search engine
//
// Read-only filtered lookups over a borrowed track slice. This is the
// "tool" surface exposed to function-calling models: every search returns
// at most `max_results` indices but always reports the true number of
// matches across the whole library, so a model can tell when it should
// narrow its query.

use std::collections::BTreeSet;

use crate::library::Track;

/// Result of one search operation.
///
/// Invariant: `indices.len() <= total_matches` and
/// `indices.len() <= max_results` of the originating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Matching indices into the original library, capped at `max_results`.
    pub indices: Vec<usize>,
    /// Total number of matches in the library, regardless of the cap.
    pub total_matches: usize,
}

pub struct LibrarySearch<'a> {
    library: &'a [Track],
}

impl<'a> LibrarySearch<'a> {
    pub fn new(library: &'a [Track]) -> Self {
        Self { library }
    }

    pub fn library_len(&self) -> usize {
        self.library.len()
    }

    /// Case-insensitive substring search over the artist field.
    ///
    /// Tracks without an artist never match. An empty query matches every
    /// track that has the field at all; this is intentional and lets a
    /// model enumerate "anything with an artist tag".
    pub fn search_by_artist(&self, query: &str, max_results: usize) -> SearchResult {
        self.search_text(query, max_results, |t| t.artist.as_deref())
    }

    /// Case-insensitive substring search over the genre field.
    pub fn search_by_genre(&self, query: &str, max_results: usize) -> SearchResult {
        self.search_text(query, max_results, |t| t.genre.as_deref())
    }

    /// Case-insensitive substring search over the album field.
    pub fn search_by_album(&self, query: &str, max_results: usize) -> SearchResult {
        self.search_text(query, max_results, |t| t.album.as_deref())
    }

    /// Case-insensitive substring search over the title field.
    pub fn search_by_title(&self, query: &str, max_results: usize) -> SearchResult {
        self.search_text(query, max_results, |t| t.title.as_deref())
    }

    /// Tracks whose year lies in `[start_year, end_year]` (inclusive).
    /// Tracks without a year never match.
    pub fn search_by_year_range(
        &self,
        start_year: i32,
        end_year: i32,
        max_results: usize,
    ) -> SearchResult {
        self.scan(max_results, |t| {
            t.year.is_some_and(|y| y >= start_year && y <= end_year)
        })
    }

    /// Distinct non-empty artist values, in lexical order.
    pub fn unique_artists(&self) -> Vec<String> {
        self.unique_values(|t| t.artist.as_deref())
    }

    /// Distinct non-empty genre values, in lexical order.
    pub fn unique_genres(&self) -> Vec<String> {
        self.unique_values(|t| t.genre.as_deref())
    }

    /// Distinct non-empty album values, in lexical order.
    pub fn unique_albums(&self) -> Vec<String> {
        self.unique_values(|t| t.album.as_deref())
    }

    /// Indices present in both results. Keeps `a`'s order. The combined
    /// `total_matches` is the size of the intersection itself, not a fresh
    /// library count.
    pub fn intersect_results(a: &SearchResult, b: &SearchResult) -> SearchResult {
        let b_set: BTreeSet<usize> = b.indices.iter().copied().collect();
        let indices: Vec<usize> = a
            .indices
            .iter()
            .copied()
            .filter(|idx| b_set.contains(idx))
            .collect();
        let total_matches = indices.len();
        SearchResult {
            indices,
            total_matches,
        }
    }

    /// Indices present in either result, ascending and deduplicated.
    pub fn union_results(a: &SearchResult, b: &SearchResult) -> SearchResult {
        let combined: BTreeSet<usize> = a
            .indices
            .iter()
            .chain(b.indices.iter())
            .copied()
            .collect();
        let indices: Vec<usize> = combined.into_iter().collect();
        let total_matches = indices.len();
        SearchResult {
            indices,
            total_matches,
        }
    }

    fn search_text(
        &self,
        query: &str,
        max_results: usize,
        field: impl Fn(&Track) -> Option<&str>,
    ) -> SearchResult {
        let needle = query.to_lowercase();
        self.scan(max_results, |t| {
            field(t).is_some_and(|value| value.to_lowercase().contains(&needle))
        })
    }

    fn scan(&self, max_results: usize, matches: impl Fn(&Track) -> bool) -> SearchResult {
        let mut indices = Vec::new();
        let mut total_matches = 0;
        // One pass: keep counting after the cap so total_matches stays honest.
        for (i, track) in self.library.iter().enumerate() {
            if matches(track) {
                total_matches += 1;
                if indices.len() < max_results {
                    indices.push(i);
                }
            }
        }
        SearchResult {
            indices,
            total_matches,
        }
    }

    fn unique_values(&self, field: impl Fn(&Track) -> Option<&str>) -> Vec<String> {
        let mut unique = BTreeSet::new();
        for track in self.library {
            if let Some(value) = field(track) {
                if !value.is_empty() {
                    unique.insert(value.to_string());
                }
            }
        }
        unique.into_iter().collect()
    }
}
