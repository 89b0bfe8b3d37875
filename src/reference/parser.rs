//! Reference parsing and overlap detection

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::books::{book_key, canonical_book};

/// Verse end used for whole-chapter references
pub const WHOLE_CHAPTER_END: u32 = u32::MAX;

/// A contiguous verse range within one chapter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    /// Canonical book name
    pub book: String,
    pub chapter: u32,
    pub verse_start: u32,
    /// Inclusive
    pub verse_end: u32,
}

impl Range {
    pub fn is_whole_chapter(&self) -> bool {
        self.verse_start == 1 && self.verse_end == WHOLE_CHAPTER_END
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_chapter() {
            write!(f, "{} {}", self.book, self.chapter)
        } else if self.verse_start == self.verse_end {
            write!(f, "{} {}:{}", self.book, self.chapter, self.verse_start)
        } else {
            write!(
                f,
                "{} {}:{}-{}",
                self.book, self.chapter, self.verse_start, self.verse_end
            )
        }
    }
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?P<book>(?:[1-3]\s*)?[^\d\s][^\d:]*?)\.?\s*(?P<chapter>\d{1,3})(?:\s*[:.]\s*(?P<start>\d{1,3})(?:\s*[-–—]\s*(?P<end>\d{1,3}))?)?\s*$",
        )
        .expect("Invalid reference regex")
    })
}

/// Parse a reference such as "John 3:16", "Rom 8:28-30" or "Psalm 23".
///
/// Returns `None` for anything that is not a well-formed single-chapter
/// reference: missing chapter, zero chapter or verse, reversed span.
pub fn parse(reference: &str) -> Option<Range> {
    let caps = reference_regex().captures(reference)?;

    let book_raw = caps.name("book")?.as_str().trim();
    if book_raw.is_empty() || !book_raw.chars().any(|c| c.is_alphabetic()) {
        return None;
    }

    let chapter: u32 = caps.name("chapter")?.as_str().parse().ok()?;
    if chapter == 0 {
        return None;
    }

    let (verse_start, verse_end) = match caps.name("start") {
        None => (1, WHOLE_CHAPTER_END),
        Some(start) => {
            let start: u32 = start.as_str().parse().ok()?;
            let end: u32 = match caps.name("end") {
                Some(end) => end.as_str().parse().ok()?,
                None => start,
            };
            if start == 0 || end < start {
                return None;
            }
            (start, end)
        }
    };

    Some(Range {
        book: canonical_book(book_raw),
        chapter,
        verse_start,
        verse_end,
    })
}

/// True iff both ranges sit in the same book and chapter and share at
/// least one verse. Touching endpoints count as overlap.
pub fn overlaps(a: &Range, b: &Range) -> bool {
    book_key(&a.book) == book_key(&b.book)
        && a.chapter == b.chapter
        && a.verse_start <= b.verse_end
        && b.verse_start <= a.verse_end
}

/// Overlap check on raw reference strings; unparseable input never overlaps
pub fn references_overlap(a: &str, b: &str) -> bool {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => overlaps(&a, &b),
        _ => false,
    }
}
