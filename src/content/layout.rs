//! Body layouts and full-text recovery

use uuid::Uuid;

use super::identity::{append_identifier, strip_identifier};
use crate::config::CadenceConfig;
use crate::state::ItemRecord;
use crate::visibility;

/// Filler line pushing the full text below the fold
pub const BUFFER_MARKER: &str = "·";
/// Line separating the masked text from the untouched full text
pub const FULL_TEXT_SEPARATOR: &str = "―――――― full text ――――――";

/// Plain layout: full text followed by the identifier token
pub fn plain_body(text: &str, id: Uuid) -> String {
    append_identifier(text.trim(), id)
}

/// Masked layout:
/// ```text
/// <masked text>
/// ·               (buffer_lines times)
/// ―――――― full text ――――――
/// <full text>
///
///
/// [sm-id:<uuid>]
/// ```
pub fn masked_body(masked: &str, full: &str, id: Uuid, buffer_lines: usize) -> String {
    let mut body = String::with_capacity(masked.len() + full.len() + buffer_lines * 4 + 64);
    body.push_str(masked.trim_end());
    body.push('\n');
    for _ in 0..buffer_lines {
        body.push_str(BUFFER_MARKER);
        body.push('\n');
    }
    body.push_str(FULL_TEXT_SEPARATOR);
    body.push('\n');
    body.push_str(full.trim());
    append_identifier(&body, id)
}

/// Recover the unmodified full text from a rendered body.
///
/// For the masked layout this is everything after the last separator,
/// minus the identifier token and any buffer lines; for a plain body it
/// is the body minus the token. Returns `None` when nothing is left.
pub fn extract_full_text(body: &str) -> Option<String> {
    let text = strip_identifier(body);

    let full = match text.rfind(FULL_TEXT_SEPARATOR) {
        Some(idx) => {
            let mut tail = &text[idx + FULL_TEXT_SEPARATOR.len()..];
            tail = tail
                .strip_prefix("\r\n")
                .or_else(|| tail.strip_prefix('\n'))
                .unwrap_or(tail);
            loop {
                let trimmed = tail.trim_start_matches([' ', '\t']);
                match trimmed.strip_prefix(BUFFER_MARKER) {
                    Some(rest) if rest.starts_with('\n') || rest.is_empty() => {
                        tail = rest.strip_prefix('\n').unwrap_or(rest);
                    }
                    _ => break,
                }
            }
            tail.trim_end().to_string()
        }
        None => text.trim().to_string(),
    };

    if full.is_empty() {
        None
    } else {
        Some(full)
    }
}

/// Target body for a record in its current stage.
///
/// `None` until the record has both a stable id and canonical text.
pub fn canonical_body(record: &ItemRecord, config: &CadenceConfig) -> Option<String> {
    let id = record.stable_id?;
    if !record.has_canonical_text() {
        return None;
    }

    if !record.stage.is_obfuscated() {
        return Some(plain_body(&record.canonical_text, id));
    }

    let ratio = visibility::ratio_for_record(record, config);
    let seed = visibility::derive_seed(id, record.obf_salt, record.stage_count());
    let masked = visibility::render(&record.canonical_text, ratio, seed, &config.visibility);
    Some(masked_body(
        &masked,
        &record.canonical_text,
        id,
        config.visibility.buffer_lines,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisibilityConfig;
    use crate::content::extract_identifier;
    use crate::state::Stage;

    const TEXT: &str = "For God so loved the world, that he gave his only begotten Son,\nthat whosoever believeth in him should not perish.\n\nBut have everlasting life.";

    #[test]
    fn test_masked_layout_round_trips_full_text() {
        let id = Uuid::new_v4();
        let options = VisibilityConfig::default();
        for (ratio, seed) in [(1.0, 1), (0.5, 7), (0.0, 99), (0.2, 12345)] {
            let masked = visibility::render(TEXT, ratio, seed, &options);
            let body = masked_body(&masked, TEXT, id, options.buffer_lines);
            assert_eq!(extract_full_text(&body).as_deref(), Some(TEXT));
            assert_eq!(extract_identifier(&body), Some(id));
        }
    }

    #[test]
    fn test_extract_uses_last_separator() {
        let id = Uuid::new_v4();
        let inner = masked_body("old masked", "old text", id, 2);
        let outer = masked_body(&inner, TEXT, id, 3);
        assert_eq!(extract_full_text(&outer).as_deref(), Some(TEXT));
    }

    #[test]
    fn test_extract_plain_body() {
        let id = Uuid::new_v4();
        let body = plain_body(TEXT, id);
        assert_eq!(extract_full_text(&body).as_deref(), Some(TEXT));
        assert_eq!(extract_full_text(""), None);
        assert_eq!(extract_full_text(&crate::content::encode_identifier(id)), None);
    }

    #[test]
    fn test_extract_tolerates_buffer_lines_after_separator() {
        let body = format!("masked\n{}\n·\n·\n{}", FULL_TEXT_SEPARATOR, TEXT);
        assert_eq!(extract_full_text(&body).as_deref(), Some(TEXT));
    }

    #[test]
    fn test_canonical_body_by_stage() {
        let config = CadenceConfig::default();
        let mut record = ItemRecord::new("John 3:16", 0);
        assert_eq!(canonical_body(&record, &config), None);

        record.stable_id = Some(Uuid::new_v4());
        assert_eq!(canonical_body(&record, &config), None);

        record.canonical_text = TEXT.to_string();
        let plain = canonical_body(&record, &config).unwrap();
        assert!(!plain.contains(FULL_TEXT_SEPARATOR));

        record.stage = Stage::Monthly;
        record.monthly_count = 12;
        record.obf_salt = Some(42);
        let masked = canonical_body(&record, &config).unwrap();
        assert!(masked.contains(FULL_TEXT_SEPARATOR));
        assert_eq!(extract_full_text(&masked).as_deref(), Some(TEXT));
        assert_eq!(canonical_body(&record, &config).unwrap(), masked);
    }
}
