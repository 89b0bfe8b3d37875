//! Passage references
//!
//! Parses human-written references ("John 3:16", "1 Cor. 13:4-7",
//! "Psalm 23") into a structured [`Range`] and answers whether two
//! references cover any of the same verses.

mod books;
pub mod parser;

pub use books::canonical_book;
pub use parser::{overlaps, parse, references_overlap, Range, WHOLE_CHAPTER_END};
