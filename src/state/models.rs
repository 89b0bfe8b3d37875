//! Per-item progress records

use std::fmt;

use chrono::{DateTime, Datelike, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::text_hash;

/// Cadence stage of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Backlog,
    Daily,
    Weekly,
    Monthly,
    Mastered,
}

impl Default for Stage {
    fn default() -> Self {
        Self::Daily
    }
}

impl Stage {
    /// Stages whose collections are reconciled and advanced
    pub const ACTIVE: [Stage; 4] = [Stage::Daily, Stage::Weekly, Stage::Monthly, Stage::Mastered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Backlog => "backlog",
            Stage::Daily => "daily",
            Stage::Weekly => "weekly",
            Stage::Monthly => "monthly",
            Stage::Mastered => "mastered",
        }
    }

    /// Stages that show the masked layout instead of plain text
    pub fn is_obfuscated(&self) -> bool {
        matches!(self, Stage::Monthly | Stage::Mastered)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized lookup key for a title: trimmed, lowercased, dashes unified
pub fn title_key(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .replace(['–', '—'], "-")
}

/// Monday = 0 … Sunday = 6
pub fn weekday_index<D: Datelike>(date: &D) -> u32 {
    date.weekday().num_days_from_monday()
}

fn default_anchor_weekday() -> u32 {
    weekday_index(&Local::now())
}

/// Progress state for one memorization item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Current display title, mirrored from the host
    pub title: String,
    /// Minted once, embedded in the item's body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_id: Option<Uuid>,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub daily_count: u32,
    #[serde(default)]
    pub weekly_count: u32,
    #[serde(default)]
    pub monthly_count: u32,
    #[serde(default)]
    pub mastered_count: u32,
    /// Fixed on first entry into daily
    #[serde(default = "default_anchor_weekday")]
    pub anchor_weekday: u32,
    #[serde(default)]
    pub canonical_text: String,
    #[serde(default)]
    pub canonical_text_hash: String,
    /// Rolled on monthly-stage advances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obf_salt: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ItemRecord {
    pub fn new(title: &str, anchor_weekday: u32) -> Self {
        let now = Utc::now();
        Self {
            title: title.trim().to_string(),
            stable_id: None,
            stage: Stage::Daily,
            daily_count: 0,
            weekly_count: 0,
            monthly_count: 0,
            mastered_count: 0,
            anchor_weekday: anchor_weekday % 7,
            canonical_text: String::new(),
            canonical_text_hash: String::new(),
            obf_salt: None,
            next_due: None,
            last_reviewed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> String {
        title_key(&self.title)
    }

    /// Review count within the current stage
    pub fn stage_count(&self) -> u32 {
        match self.stage {
            Stage::Backlog => 0,
            Stage::Daily => self.daily_count,
            Stage::Weekly => self.weekly_count,
            Stage::Monthly => self.monthly_count,
            Stage::Mastered => self.mastered_count,
        }
    }

    pub fn has_canonical_text(&self) -> bool {
        !self.canonical_text.trim().is_empty()
    }
}

/// Shallow field merge applied to an existing record.
///
/// `None` leaves a field untouched. The anchor weekday is not part of the
/// update: it is set once at creation and never rewritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub title: Option<String>,
    pub stable_id: Option<Uuid>,
    pub stage: Option<Stage>,
    pub daily_count: Option<u32>,
    pub weekly_count: Option<u32>,
    pub monthly_count: Option<u32>,
    pub mastered_count: Option<u32>,
    /// Stored trimmed; the hash is recomputed alongside
    pub canonical_text: Option<String>,
    pub obf_salt: Option<u64>,
    pub next_due: Option<NaiveDateTime>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl RecordUpdate {
    pub fn canonical_text(text: impl Into<String>) -> Self {
        Self {
            canonical_text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into `record`. A stable id that is already set is kept.
    pub fn apply(self, record: &mut ItemRecord) {
        if let Some(title) = self.title {
            record.title = title.trim().to_string();
        }
        if let Some(id) = self.stable_id {
            match record.stable_id {
                None => record.stable_id = Some(id),
                Some(existing) if existing != id => {
                    log::warn!(
                        "Refusing to replace stable id {} with {} on '{}'",
                        existing,
                        id,
                        record.title
                    );
                }
                Some(_) => {}
            }
        }
        if let Some(stage) = self.stage {
            record.stage = stage;
        }
        if let Some(count) = self.daily_count {
            record.daily_count = count;
        }
        if let Some(count) = self.weekly_count {
            record.weekly_count = count;
        }
        if let Some(count) = self.monthly_count {
            record.monthly_count = count;
        }
        if let Some(count) = self.mastered_count {
            record.mastered_count = count;
        }
        if let Some(text) = self.canonical_text {
            let text = text.trim().to_string();
            record.canonical_text_hash = text_hash(&text);
            record.canonical_text = text;
        }
        if let Some(salt) = self.obf_salt {
            record.obf_salt = Some(salt);
        }
        if let Some(due) = self.next_due {
            record.next_due = Some(due);
        }
        if let Some(at) = self.last_reviewed_at {
            record.last_reviewed_at = Some(at);
        }
        record.updated_at = Utc::now();
    }
}

/// Store-wide bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_suggestion_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_key_normalization() {
        assert_eq!(title_key("  John 3:15–17 "), "john 3:15-17");
        assert_eq!(title_key("JOHN 3:15—17"), "john 3:15-17");
        assert_eq!(title_key("John 3:16"), title_key("john 3:16"));
    }

    #[test]
    fn test_update_merges_without_clobbering() {
        let mut record = ItemRecord::new("John 3:16", 2);
        record.weekly_count = 3;

        RecordUpdate {
            daily_count: Some(4),
            ..Default::default()
        }
        .apply(&mut record);

        assert_eq!(record.daily_count, 4);
        assert_eq!(record.weekly_count, 3);
        assert_eq!(record.anchor_weekday, 2);
    }

    #[test]
    fn test_stable_id_is_write_once() {
        let mut record = ItemRecord::new("John 3:16", 0);
        let first = Uuid::new_v4();
        RecordUpdate {
            stable_id: Some(first),
            ..Default::default()
        }
        .apply(&mut record);
        RecordUpdate {
            stable_id: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .apply(&mut record);

        assert_eq!(record.stable_id, Some(first));
    }

    #[test]
    fn test_canonical_text_updates_hash() {
        let mut record = ItemRecord::new("John 3:16", 0);
        RecordUpdate::canonical_text("  For God so loved the world.\n").apply(&mut record);
        assert_eq!(record.canonical_text, "For God so loved the world.");
        assert_eq!(record.canonical_text_hash, text_hash("For God so loved the world."));
    }

    #[test]
    fn test_partial_record_deserializes_with_defaults() {
        let record: ItemRecord =
            serde_json::from_str(r#"{"title": "John 3:16", "stage": "weekly", "anchor_weekday": 4}"#)
                .unwrap();
        assert_eq!(record.stage, Stage::Weekly);
        assert_eq!(record.daily_count, 0);
        assert_eq!(record.anchor_weekday, 4);
        assert!(record.stable_id.is_none());
    }

    #[test]
    fn test_stage_count_follows_stage() {
        let mut record = ItemRecord::new("John 3:16", 0);
        record.daily_count = 7;
        record.weekly_count = 2;
        record.stage = Stage::Weekly;
        assert_eq!(record.stage_count(), 2);
    }
}
