//! Stable identifier token embedded at the end of an item body.
//!
//! Format: the body, two blank lines, then `[sm-id:<uuid>]`.

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

const TOKEN_PREFIX: &str = "[sm-id:";
const TOKEN_SUFFIX: &str = "]";
/// Blank-line run between the body and the token
pub const TOKEN_GAP: &str = "\n\n\n";

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[sm-id:([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\]")
            .expect("Invalid identifier regex")
    })
}

fn token_with_gap_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[ \t]*(?:\r?\n[ \t]*)*\[sm-id:[0-9a-fA-F-]{36}\][ \t]*")
            .expect("Invalid identifier regex")
    })
}

pub fn encode_identifier(id: Uuid) -> String {
    format!("{}{}{}", TOKEN_PREFIX, id, TOKEN_SUFFIX)
}

/// The last well-formed identifier token in `body`, if any
pub fn extract_identifier(body: &str) -> Option<Uuid> {
    token_regex()
        .captures_iter(body)
        .filter_map(|caps| Uuid::parse_str(caps.get(1)?.as_str()).ok())
        .last()
}

/// `body` with every identifier token (and the blank lines before it) removed
pub fn strip_identifier(body: &str) -> String {
    token_with_gap_regex().replace_all(body, "").trim_end().to_string()
}

/// Append `id` to `body` without touching the existing text beyond
/// trailing whitespace. Idempotent for an already-tagged body.
pub fn append_identifier(body: &str, id: Uuid) -> String {
    let text = strip_identifier(body);
    if text.is_empty() {
        encode_identifier(id)
    } else {
        format!("{}{}{}", text, TOKEN_GAP, encode_identifier(id))
    }
}
