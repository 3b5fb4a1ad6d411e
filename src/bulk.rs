//! Free-text bulk song input.
//!
//! The input is split into entries on newlines and commas. Each entry is then
//! split into song and artist by the first delimiter of [`DELIMITERS`] that
//! occurs in it, at that delimiter's first occurrence:
//!
//! 1. [`Delimiter::By`]: the word `by` standing alone between whitespace
//!    (case-sensitive), so `Abbey Road` is not split but `Stand by Me` is.
//! 2. [`Delimiter::Dash`]: any `-`.
//!
//! There is no quoting or escaping. Entries with a blank song are dropped.

use crate::types::SongEntry;
use regex::Regex;
use std::sync::LazyLock;

static BY_WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)by(?:\s|$)").expect("Invalid delimiter regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    By,
    Dash,
}

/// Delimiters in precedence order.
pub const DELIMITERS: [Delimiter; 2] = [Delimiter::By, Delimiter::Dash];

impl Delimiter {
    /// Byte range of the first occurrence in `entry`, including any
    /// whitespace the delimiter consumes.
    fn find(self, entry: &str) -> Option<(usize, usize)> {
        match self {
            Delimiter::By => BY_WORD_REGEX.find(entry).map(|m| (m.start(), m.end())),
            Delimiter::Dash => entry.find('-').map(|i| (i, i + 1)),
        }
    }
}

/// Splits raw bulk text into unparsed entries.
pub fn split_entries(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', ','])
}

/// Parses one entry into a song, or `None` when the song part is blank.
pub fn parse_entry(entry: &str) -> Option<SongEntry> {
    let split = DELIMITERS
        .iter()
        .find_map(|delimiter| delimiter.find(entry));

    match split {
        Some((start, end)) => SongEntry::new(&entry[..start], &entry[end..]),
        None => SongEntry::new(entry, ""),
    }
}

pub fn parse_bulk(text: &str) -> Vec<SongEntry> {
    split_entries(text).filter_map(parse_entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(song: &str, artist: &str) -> SongEntry {
        SongEntry {
            song: song.to_string(),
            artist: artist.to_string(),
        }
    }

    #[test]
    fn by_separates_song_and_artist() {
        assert_eq!(
            parse_entry("Imagine by John Lennon"),
            Some(entry("Imagine", "John Lennon"))
        );
    }

    #[test]
    fn dash_separates_song_and_artist() {
        assert_eq!(
            parse_entry("Yesterday - The Beatles"),
            Some(entry("Yesterday", "The Beatles"))
        );
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert_eq!(parse_entry("   "), None);
        assert!(parse_bulk("   ").is_empty());
    }

    #[test]
    fn entry_without_delimiter_has_empty_artist() {
        assert_eq!(parse_entry("  Imagine "), Some(entry("Imagine", "")));
    }

    #[test]
    fn by_takes_precedence_over_dash() {
        assert_eq!(
            parse_entry("Empire State of Mind by Jay-Z"),
            Some(entry("Empire State of Mind", "Jay-Z"))
        );
    }

    #[test]
    fn by_inside_a_word_is_not_a_delimiter() {
        assert_eq!(
            parse_entry("Abbey Road - The Beatles"),
            Some(entry("Abbey Road", "The Beatles"))
        );
        assert_eq!(parse_entry("Baby"), Some(entry("Baby", "")));
    }

    #[test]
    fn by_is_case_sensitive() {
        assert_eq!(
            parse_entry("Stand By Me - Ben E. King"),
            Some(entry("Stand By Me", "Ben E. King"))
        );
    }

    #[test]
    fn split_happens_at_first_occurrence() {
        assert_eq!(parse_entry("A - B - C"), Some(entry("A", "B - C")));
    }

    #[test]
    fn blank_song_is_dropped_even_with_artist() {
        assert_eq!(parse_entry(" - The Beatles"), None);
        assert_eq!(parse_entry("by Queen"), None);
    }

    #[test]
    fn bulk_splits_on_newlines_and_commas() {
        let text = "Imagine by John Lennon\nYesterday - The Beatles, Hallelujah\n\n  ,";
        assert_eq!(
            parse_bulk(text),
            vec![
                entry("Imagine", "John Lennon"),
                entry("Yesterday", "The Beatles"),
                entry("Hallelujah", ""),
            ]
        );
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        assert_eq!(
            parse_bulk("Jolene - Dolly Parton\r\nHurt\r\n"),
            vec![entry("Jolene", "Dolly Parton"), entry("Hurt", "")]
        );
    }

    #[test]
    fn every_non_blank_entry_is_kept_in_order() {
        let text = "one,, two - x,\n ,three by y, - z";
        let kept: Vec<String> = parse_bulk(text).into_iter().map(|e| e.song).collect();
        assert_eq!(kept, vec!["one", "two", "three"]);
    }
}
