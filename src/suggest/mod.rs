//! Reference suggestions for an empty backlog

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;

use crate::config::SuggestionEntry;
use crate::reference::references_overlap;
use crate::state::title_key;

/// Source of new references to memorize
pub trait Suggester {
    /// A reference that does not collide with any of `exclusions`
    fn suggest(&self, topic: Option<&str>, exclusions: &[String]) -> Option<String>;
}

/// Whether enough time has passed since the last accepted suggestion.
/// `min_days = None` disables suggestions entirely.
pub fn suggestion_allowed(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    min_days: Option<u32>,
) -> bool {
    match (min_days, last) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(days), Some(last)) => now - last >= Duration::days(days as i64),
    }
}

/// Picks at random from a fixed list of candidates
pub struct PoolSuggester {
    pool: Vec<SuggestionEntry>,
}

impl PoolSuggester {
    pub fn new(pool: Vec<SuggestionEntry>) -> Self {
        Self { pool }
    }

    fn candidates(&self, topic: Option<&str>, exclusions: &[String]) -> Vec<&SuggestionEntry> {
        let topic = topic.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        self.pool
            .iter()
            .filter(|entry| match &topic {
                Some(topic) => entry.topics.iter().any(|t| t.trim().to_lowercase() == *topic),
                None => true,
            })
            .filter(|entry| {
                let key = title_key(&entry.reference);
                !exclusions.iter().any(|excluded| {
                    title_key(excluded) == key || references_overlap(excluded, &entry.reference)
                })
            })
            .collect()
    }
}

impl Suggester for PoolSuggester {
    fn suggest(&self, topic: Option<&str>, exclusions: &[String]) -> Option<String> {
        let candidates = self.candidates(topic, exclusions);
        let choice = candidates.choose(&mut rand::thread_rng())?;
        log::info!(
            "Suggesting '{}' ({} candidates)",
            choice.reference,
            candidates.len()
        );
        Some(choice.reference.clone())
    }
}
