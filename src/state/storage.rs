//! Durable record store
//!
//! All records live in one JSON document:
//! ```text
//! state.json
//! {
//!   "verses":     { <title key>: ItemRecord },
//!   "meta":       { "last_suggestion_at": ... },
//!   "quarantine": { <title key>: <unparseable record> }
//! }
//! ```
//! Every operation is a full read-modify-write of the document, saved
//! atomically (write `.tmp`, then rename).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::models::*;
use crate::content::join_paragraphs;
use crate::resolver::TextSource;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Identity conflict on '{title}': {detail}")]
    Conflict { title: String, detail: String },
}

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    verses: BTreeMap<String, Value>,
    #[serde(default)]
    meta: StateMeta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    quarantine: BTreeMap<String, Value>,
}

/// Parsed view of the state document
#[derive(Debug, Default)]
struct Snapshot {
    records: BTreeMap<String, ItemRecord>,
    meta: StateMeta,
    quarantine: BTreeMap<String, Value>,
}

impl Snapshot {
    fn find_key_by_stable_id(&self, id: Uuid) -> Option<&String> {
        self.records
            .iter()
            .find(|(_, r)| r.stable_id == Some(id))
            .map(|(k, _)| k)
    }
}

/// Store for per-item progress records
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store backed by `path`, creating its directory if needed
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let document: StateDocument = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                let backup = self.path.with_extension("json.corrupt");
                log::error!(
                    "State file {} is unreadable ({}); moving it to {} and starting empty",
                    self.path.display(),
                    e,
                    backup.display()
                );
                fs::rename(&self.path, &backup)?;
                return Ok(Snapshot::default());
            }
        };

        let mut snapshot = Snapshot {
            records: BTreeMap::new(),
            meta: document.meta,
            quarantine: document.quarantine,
        };

        for (key, raw) in document.verses {
            match serde_json::from_value::<ItemRecord>(raw.clone()) {
                Ok(record) => {
                    snapshot.records.insert(key, record);
                }
                Err(e) => {
                    log::warn!("Quarantining unreadable record '{}': {}", key, e);
                    snapshot.quarantine.insert(key, raw);
                }
            }
        }

        Ok(snapshot)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut verses = BTreeMap::new();
        for (key, record) in &snapshot.records {
            verses.insert(key.clone(), serde_json::to_value(record)?);
        }
        let document = StateDocument {
            verses,
            meta: snapshot.meta.clone(),
            quarantine: snapshot.quarantine.clone(),
        };

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(&document)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Read-modify-write the whole document. Nothing is saved if `f` fails.
    fn modify<T>(&self, f: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut snapshot = self.load()?;
        let out = f(&mut snapshot)?;
        self.save(&snapshot)?;
        Ok(out)
    }

    // ===== Record Operations =====

    /// All records, ordered by key
    pub fn list(&self) -> Result<Vec<ItemRecord>> {
        Ok(self.load()?.records.into_values().collect())
    }

    pub fn get(&self, title: &str) -> Result<Option<ItemRecord>> {
        Ok(self.load()?.records.remove(&title_key(title)))
    }

    /// Return the record for `title`, creating it in the daily stage if
    /// absent. An existing record is returned unchanged.
    pub fn get_or_create(&self, title: &str, anchor_weekday: Option<u32>) -> Result<ItemRecord> {
        let key = title_key(title);
        if let Some(existing) = self.load()?.records.remove(&key) {
            return Ok(existing);
        }

        self.modify(|snapshot| {
            let anchor = anchor_weekday.unwrap_or_else(|| weekday_index(&Local::now()));
            let record = snapshot
                .records
                .entry(key)
                .or_insert_with(|| {
                    log::info!("Created record for '{}' (anchor weekday {})", title.trim(), anchor);
                    ItemRecord::new(title, anchor)
                })
                .clone();
            Ok(record)
        })
    }

    /// Merge `changes` into the record for `title`
    pub fn update(&self, title: &str, changes: RecordUpdate) -> Result<ItemRecord> {
        let key = title_key(title);
        self.modify(|snapshot| {
            let record = snapshot
                .records
                .get_mut(&key)
                .ok_or_else(|| StateError::NotFound(title.trim().to_string()))?;
            changes.apply(record);
            Ok(record.clone())
        })
    }

    pub fn find_by_stable_id(&self, id: Uuid) -> Result<Option<ItemRecord>> {
        let mut snapshot = self.load()?;
        let key = snapshot.find_key_by_stable_id(id).cloned();
        Ok(key.and_then(|k| snapshot.records.remove(&k)))
    }

    /// Attach `id` to the record for `title`.
    ///
    /// Fails with a conflict if the record already carries another id or
    /// another record already owns `id`.
    pub fn bind_stable_id(&self, title: &str, id: Uuid) -> Result<ItemRecord> {
        let key = title_key(title);
        self.modify(|snapshot| {
            if let Some(owner) = snapshot.find_key_by_stable_id(id) {
                if *owner != key {
                    return Err(StateError::Conflict {
                        title: title.trim().to_string(),
                        detail: format!("stable id {} already belongs to '{}'", id, owner),
                    });
                }
            }

            let record = snapshot
                .records
                .get_mut(&key)
                .ok_or_else(|| StateError::NotFound(title.trim().to_string()))?;
            match record.stable_id {
                Some(existing) if existing != id => Err(StateError::Conflict {
                    title: title.trim().to_string(),
                    detail: format!("record already bound to {}", existing),
                }),
                Some(_) => Ok(record.clone()),
                None => {
                    RecordUpdate {
                        stable_id: Some(id),
                        ..Default::default()
                    }
                    .apply(record);
                    log::info!("Bound '{}' to stable id {}", record.title, id);
                    Ok(record.clone())
                }
            }
        })
    }

    /// Move the record for `old_title` to the key of `new_title`.
    ///
    /// Refuses, leaving both records in place, when a different record
    /// already lives under the new key.
    pub fn rename(&self, old_title: &str, new_title: &str) -> Result<ItemRecord> {
        let old_key = title_key(old_title);
        let new_key = title_key(new_title);

        self.modify(|snapshot| {
            if old_key != new_key && snapshot.records.contains_key(&new_key) {
                return Err(StateError::Conflict {
                    title: new_title.trim().to_string(),
                    detail: format!("a record already exists under '{}'", new_key),
                });
            }

            let mut record = snapshot
                .records
                .remove(&old_key)
                .ok_or_else(|| StateError::NotFound(old_title.trim().to_string()))?;
            RecordUpdate {
                title: Some(new_title.to_string()),
                ..Default::default()
            }
            .apply(&mut record);
            snapshot.records.insert(new_key, record.clone());
            Ok(record)
        })
    }

    /// Canonical text for `title`, fetched and cached on first use.
    ///
    /// A cached value is returned as is. Otherwise `source` is consulted;
    /// the result is cached when a record exists. Returns `None` when no
    /// text is cached and the source has none.
    pub fn resolve_or_fetch(&self, title: &str, source: &dyn TextSource) -> Result<Option<String>> {
        if let Some(record) = self.get(title)? {
            if record.has_canonical_text() {
                return Ok(Some(record.canonical_text));
            }
        }
        self.refresh_canonical(title, source)
    }

    /// Fetch canonical text from `source` regardless of the cache and store it
    pub fn refresh_canonical(&self, title: &str, source: &dyn TextSource) -> Result<Option<String>> {
        let text = match source.resolve(title.trim()) {
            Some(paragraphs) => join_paragraphs(&paragraphs),
            None => return Ok(None),
        };
        if text.is_empty() {
            return Ok(None);
        }

        if self.get(title)?.is_some() {
            self.update(title, RecordUpdate::canonical_text(text.clone()))?;
        }
        Ok(Some(text))
    }

    // ===== Metadata =====

    pub fn meta(&self) -> Result<StateMeta> {
        Ok(self.load()?.meta)
    }

    pub fn set_last_suggestion_at(&self, at: DateTime<Utc>) -> Result<()> {
        self.modify(|snapshot| {
            snapshot.meta.last_suggestion_at = Some(at);
            Ok(())
        })
    }

    /// Keys of records that could not be parsed
    pub fn quarantined(&self) -> Result<Vec<String>> {
        Ok(self.load()?.quarantine.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::text_hash;
    use tempfile::TempDir;

    fn create_test_store() -> (StateStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = StateStore::new(temp_dir.path().join("state.json")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (store, _temp) = create_test_store();

        let first = store.get_or_create("John 3:16", Some(2)).unwrap();
        store
            .update("John 3:16", RecordUpdate { daily_count: Some(3), ..Default::default() })
            .unwrap();
        let second = store.get_or_create("  john 3:16 ", Some(5)).unwrap();

        assert_eq!(first.anchor_weekday, 2);
        assert_eq!(second.anchor_weekday, 2);
        assert_eq!(second.daily_count, 3);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_update_missing_record_is_not_found() {
        let (store, _temp) = create_test_store();
        let result = store.update("Nope 1:1", RecordUpdate::default());
        assert!(matches!(result, Err(StateError::NotFound(_))));
    }

    #[test]
    fn test_find_by_stable_id() {
        let (store, _temp) = create_test_store();
        store.get_or_create("John 3:16", Some(0)).unwrap();
        let id = Uuid::new_v4();
        store.bind_stable_id("John 3:16", id).unwrap();

        let found = store.find_by_stable_id(id).unwrap().unwrap();
        assert_eq!(found.title, "John 3:16");
        assert!(store.find_by_stable_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_bind_conflicts() {
        let (store, _temp) = create_test_store();
        store.get_or_create("John 3:16", Some(0)).unwrap();
        store.get_or_create("Romans 8:28", Some(0)).unwrap();
        let id = Uuid::new_v4();
        store.bind_stable_id("John 3:16", id).unwrap();

        // Same id, same record: no-op
        assert!(store.bind_stable_id("John 3:16", id).is_ok());
        // Id owned elsewhere
        assert!(matches!(
            store.bind_stable_id("Romans 8:28", id),
            Err(StateError::Conflict { .. })
        ));
        // Record already bound
        assert!(matches!(
            store.bind_stable_id("John 3:16", Uuid::new_v4()),
            Err(StateError::Conflict { .. })
        ));
    }

    #[test]
    fn test_rename_moves_key_and_keeps_progress() {
        let (store, _temp) = create_test_store();
        store.get_or_create("John 3:16", Some(3)).unwrap();
        store
            .update("John 3:16", RecordUpdate { weekly_count: Some(2), ..Default::default() })
            .unwrap();

        let renamed = store.rename("John 3:16", "John 3:16-17").unwrap();
        assert_eq!(renamed.title, "John 3:16-17");
        assert_eq!(renamed.weekly_count, 2);
        assert_eq!(renamed.anchor_weekday, 3);
        assert!(store.get("John 3:16").unwrap().is_none());
        assert!(store.get("john 3:16-17").unwrap().is_some());
    }

    #[test]
    fn test_rename_onto_existing_record_conflicts() {
        let (store, _temp) = create_test_store();
        store.get_or_create("John 3:16", Some(0)).unwrap();
        store.get_or_create("John 3:17", Some(0)).unwrap();

        let result = store.rename("John 3:16", "John 3:17");
        assert!(matches!(result, Err(StateError::Conflict { .. })));
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_resolve_or_fetch_caches() {
        let (store, _temp) = create_test_store();
        store.get_or_create("John 3:16", Some(0)).unwrap();

        let calls = std::cell::Cell::new(0);
        let source = |_: &str| {
            calls.set(calls.get() + 1);
            Some(vec!["For God so loved the world".to_string()])
        };

        let first = store.resolve_or_fetch("John 3:16", &source).unwrap();
        let second = store.resolve_or_fetch("John 3:16", &source).unwrap();

        assert_eq!(first.as_deref(), Some("For God so loved the world"));
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);

        let record = store.get("John 3:16").unwrap().unwrap();
        assert_eq!(record.canonical_text_hash, text_hash("For God so loved the world"));
    }

    #[test]
    fn test_resolve_or_fetch_failure_is_none() {
        let (store, _temp) = create_test_store();
        store.get_or_create("John 3:16", Some(0)).unwrap();
        let source = |_: &str| -> Option<Vec<String>> { None };
        assert_eq!(store.resolve_or_fetch("John 3:16", &source).unwrap(), None);
        assert!(!store.get("John 3:16").unwrap().unwrap().has_canonical_text());
    }

    #[test]
    fn test_unreadable_record_is_quarantined_not_dropped() {
        let (store, _temp) = create_test_store();
        fs::write(
            store.path(),
            r#"{"verses": {
                "john 3:16": {"title": "John 3:16", "stage": "daily", "anchor_weekday": 1},
                "broken": {"title": 42}
            }}"#,
        )
        .unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        store.get_or_create("Romans 8:28", Some(0)).unwrap();

        assert_eq!(store.quarantined().unwrap(), vec!["broken".to_string()]);
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"broken\""));
    }

    #[test]
    fn test_corrupt_document_starts_empty() {
        let (store, temp) = create_test_store();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.list().unwrap().is_empty());
        assert!(temp.path().join("state.json.corrupt").exists());
    }

    #[test]
    fn test_meta_round_trip() {
        let (store, _temp) = create_test_store();
        assert!(store.meta().unwrap().last_suggestion_at.is_none());
        let now = Utc::now();
        store.set_last_suggestion_at(now).unwrap();
        assert_eq!(store.meta().unwrap().last_suggestion_at, Some(now));
    }
}
