//! Externally visible item content
//!
//! Bodies shown in the task host are renderings of the state record:
//! - plain layout (daily, weekly): full text + identifier token
//! - masked layout (monthly, mastered): masked text, buffer lines,
//!   separator, full text, identifier token

pub mod identity;
pub mod layout;

use sha2::{Digest, Sha256};

pub use identity::{append_identifier, encode_identifier, extract_identifier, strip_identifier};
pub use layout::{canonical_body, extract_full_text, masked_body, plain_body, BUFFER_MARKER, FULL_TEXT_SEPARATOR};

/// SHA-256 hash of canonical text
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Join provider paragraphs into canonical text, one blank line apart
pub fn join_paragraphs(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// True if the title or body carries the manual override marker
pub fn has_manual_override(title: &str, body: &str, marker: &str) -> bool {
    let marker = marker.trim().to_lowercase();
    if marker.is_empty() {
        return false;
    }
    title.to_lowercase().contains(&marker) || body.to_lowercase().contains(&marker)
}
