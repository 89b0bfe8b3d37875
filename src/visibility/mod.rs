//! Progressive text visibility
//!
//! As an item advances through the monthly stage, a growing share of its
//! words is masked. Which words get masked is a pure function of the text,
//! the ratio and a seed, so rebuilding the same item at the same progress
//! reproduces the same body byte for byte.

use rand::rngs::StdRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{CadenceConfig, VisibilityConfig};
use crate::state::{ItemRecord, Stage};

/// Fraction of eligible words left visible after `progress` reviews out of
/// `total`, interpolated linearly over `schedule` spread evenly across
/// `[0, total - 1]`.
///
/// An empty schedule is fully visible; a one-point schedule is constant.
pub fn visible_ratio(progress: u32, total: u32, schedule: &[f64]) -> f64 {
    let ratio = match schedule {
        [] => 1.0,
        [only] => *only,
        _ => {
            if total <= 1 {
                schedule[0]
            } else {
                let last_step = (total - 1) as f64;
                let t = progress.min(total - 1) as f64 / last_step;
                let position = t * (schedule.len() - 1) as f64;
                let lower = position.floor() as usize;
                let upper = (lower + 1).min(schedule.len() - 1);
                let frac = position - lower as f64;
                schedule[lower] + (schedule[upper] - schedule[lower]) * frac
            }
        }
    };

    if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Visibility ratio for a record in its current stage
pub fn ratio_for_record(record: &ItemRecord, config: &CadenceConfig) -> f64 {
    let schedule = &config.visibility.schedule;
    match record.stage {
        Stage::Monthly => visible_ratio(record.monthly_count, config.monthly_limit, schedule),
        Stage::Mastered => schedule.last().copied().map_or(1.0, |r| r.clamp(0.0, 1.0)),
        _ => 1.0,
    }
}

/// Seed for a render: stable per (item, salt, progress count)
pub fn derive_seed(stable_id: Uuid, salt: Option<u64>, progress: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(stable_id.as_bytes());
    hasher.update(salt.unwrap_or(0).to_le_bytes());
    hasher.update(progress.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Char-index spans `[start, end)` of alphabetic runs at least
/// `min_len` letters long
pub fn eligible_spans(text: &str, min_len: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut count = 0;

    for (i, c) in text.chars().enumerate() {
        count = i + 1;
        if c.is_alphabetic() {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            if i - start >= min_len.max(1) {
                spans.push((start, i));
            }
        }
    }
    if let Some(start) = run_start {
        if count - start >= min_len.max(1) {
            spans.push((start, count));
        }
    }

    spans
}

/// Mask `round((1 - ratio) * eligible)` words of `text`, chosen by a
/// seeded sample. Only letters are replaced; every other character and
/// the total character count are preserved.
pub fn render(text: &str, ratio: f64, seed: u64, options: &VisibilityConfig) -> String {
    let spans = eligible_spans(text, options.min_word_len);
    let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 1.0 };
    let hide = (((1.0 - ratio) * spans.len() as f64).round() as usize).min(spans.len());
    if hide == 0 {
        return text.to_string();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut chosen: Vec<(usize, usize)> = rand::seq::index::sample(&mut rng, spans.len(), hide)
        .into_iter()
        .map(|i| spans[i])
        .collect();
    chosen.sort_unstable();

    let mut out = String::with_capacity(text.len());
    let mut next = chosen.iter().peekable();
    for (i, c) in text.chars().enumerate() {
        while let Some(&&(_, end)) = next.peek() {
            if i >= end {
                next.next();
            } else {
                break;
            }
        }
        let masked = matches!(next.peek(), Some(&&(start, end)) if i >= start && i < end);
        out.push(if masked { options.mask_char } else { c });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: [f64; 5] = [1.0, 0.75, 0.5, 0.35, 0.2];
    const TEXT: &str = "For God so loved the world, that he gave his only begotten Son, that whosoever believeth in him should not perish, but have everlasting life.";

    #[test]
    fn test_ratio_endpoints_and_degenerate_schedules() {
        assert_eq!(visible_ratio(0, 24, &SCHEDULE), 1.0);
        assert!((visible_ratio(23, 24, &SCHEDULE) - 0.2).abs() < 1e-9);
        assert!((visible_ratio(100, 24, &SCHEDULE) - 0.2).abs() < 1e-9);
        assert_eq!(visible_ratio(5, 24, &[]), 1.0);
        assert_eq!(visible_ratio(5, 24, &[0.4]), 0.4);
        assert_eq!(visible_ratio(5, 1, &SCHEDULE), 1.0);
    }

    #[test]
    fn test_monthly_eleven_of_twenty_four() {
        let ratio = visible_ratio(11, 24, &SCHEDULE);
        assert!(ratio > 0.5 && ratio < 0.75, "ratio was {}", ratio);
    }

    #[test]
    fn test_ratio_non_increasing_for_non_increasing_schedule() {
        for total in [2, 5, 24, 37] {
            let mut previous = f64::INFINITY;
            for progress in 0..total + 3 {
                let ratio = visible_ratio(progress, total, &SCHEDULE);
                assert!(ratio <= previous, "total {} progress {}", total, progress);
                previous = ratio;
            }
        }
    }

    #[test]
    fn test_eligible_spans() {
        assert_eq!(eligible_spans("a bc def, ghij", 3), vec![(5, 8), (10, 14)]);
        assert_eq!(eligible_spans("word", 3), vec![(0, 4)]);
        assert!(eligible_spans("1 2 3 -- !!", 1).is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let options = VisibilityConfig::default();
        let a = render(TEXT, 0.4, 77, &options);
        let b = render(TEXT, 0.4, 77, &options);
        assert_eq!(a, b);
        assert_ne!(a, TEXT);
    }

    #[test]
    fn test_render_preserves_shape() {
        let options = VisibilityConfig::default();
        for ratio in [0.0, 0.2, 0.5, 0.9, 1.0] {
            let out = render(TEXT, ratio, 3, &options);
            assert_eq!(out.chars().count(), TEXT.chars().count());
            for (a, b) in TEXT.chars().zip(out.chars()) {
                if !a.is_alphabetic() {
                    assert_eq!(a, b);
                } else {
                    assert!(a == b || b == options.mask_char);
                }
            }
        }
    }

    #[test]
    fn test_render_masks_expected_word_count() {
        let options = VisibilityConfig::default();
        let eligible = eligible_spans(TEXT, options.min_word_len).len();
        let out = render(TEXT, 0.5, 11, &options);
        let masked_words = out
            .split(|c: char| !(c.is_alphabetic() || c == options.mask_char))
            .filter(|w| !w.is_empty() && w.chars().all(|c| c == options.mask_char))
            .count();
        assert_eq!(masked_words, (eligible as f64 * 0.5).round() as usize);
        assert_eq!(render(TEXT, 1.0, 11, &options), TEXT);
    }

    #[test]
    fn test_short_words_never_masked() {
        let options = VisibilityConfig::default();
        let out = render("so he is in it", 0.0, 5, &options);
        assert_eq!(out, "so he is in it");
    }

    #[test]
    fn test_seed_changes_with_progress_and_salt() {
        let id = Uuid::new_v4();
        assert_eq!(derive_seed(id, Some(1), 3), derive_seed(id, Some(1), 3));
        assert_ne!(derive_seed(id, Some(1), 3), derive_seed(id, Some(1), 4));
        assert_ne!(derive_seed(id, Some(1), 3), derive_seed(id, Some(2), 3));
    }
}
