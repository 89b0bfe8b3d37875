//! File-backed task host
//!
//! Keeps every collection in one JSON document and implements the same
//! contract a remote task list would. Mutating trait calls are counted so
//! callers can check that a pass issued no redundant writes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{sanitize_body, HostError, HostItem, Result, TaskHost};
use crate::state::title_key;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredItem {
    id: String,
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HostDocument {
    #[serde(default)]
    collections: BTreeMap<String, Vec<StoredItem>>,
}

impl HostDocument {
    fn find_mut(&mut self, id: &str) -> Option<&mut StoredItem> {
        self.collections
            .values_mut()
            .flat_map(|items| items.iter_mut())
            .find(|item| item.id == id)
    }
}

/// Task list stored in a local JSON file
pub struct JsonTaskHost {
    path: PathBuf,
    writes: AtomicUsize,
}

impl JsonTaskHost {
    /// Open (or lazily create) the host file at `path`
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            writes: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of mutating [`TaskHost`] calls issued through this handle
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn load(&self) -> Result<HostDocument> {
        if !self.path.exists() {
            return Ok(HostDocument::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, document: &HostDocument) -> Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(document)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut HostDocument) -> Result<T>) -> Result<T> {
        let mut document = self.load()?;
        let out = f(&mut document)?;
        self.save(&document)?;
        Ok(out)
    }

    fn counted<T>(&self, f: impl FnOnce(&mut HostDocument) -> Result<T>) -> Result<T> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.modify(f)
    }

    // ===== User-side edits (not counted) =====

    /// Add an item the way a user would
    pub fn add_item(&self, collection: &str, title: &str, body: &str) -> Result<String> {
        self.modify(|doc| Ok(insert(doc, collection, title, body)))
    }

    /// Tick or untick an item
    pub fn set_completed(&self, id: &str, completed: bool) -> Result<()> {
        self.modify(|doc| {
            let item = doc
                .find_mut(id)
                .ok_or_else(|| HostError::NotFound(id.to_string()))?;
            item.completed = completed;
            Ok(())
        })
    }

    /// Retitle an item
    pub fn rename_item(&self, id: &str, title: &str) -> Result<()> {
        self.modify(|doc| {
            let item = doc
                .find_mut(id)
                .ok_or_else(|| HostError::NotFound(id.to_string()))?;
            item.title = title.to_string();
            Ok(())
        })
    }

    /// Collection holding `id`, if any
    pub fn collection_of(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .load()?
            .collections
            .into_iter()
            .find(|(_, items)| items.iter().any(|item| item.id == id))
            .map(|(name, _)| name))
    }
}

fn insert(doc: &mut HostDocument, collection: &str, title: &str, body: &str) -> String {
    let id = Uuid::new_v4().to_string();
    doc.collections
        .entry(collection.to_string())
        .or_default()
        .push(StoredItem {
            id: id.clone(),
            title: title.to_string(),
            body: body.to_string(),
            completed: false,
            due: None,
        });
    id
}

impl TaskHost for JsonTaskHost {
    fn list_items(&self, collection: &str) -> Result<Vec<HostItem>> {
        let document = self.load()?;
        Ok(document
            .collections
            .get(collection)
            .map(|items| {
                items
                    .iter()
                    .map(|item| HostItem {
                        id: item.id.clone(),
                        title: sanitize_body(&item.title),
                        body: sanitize_body(&item.body),
                        completed: item.completed,
                        due: item.due,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn create(&self, collection: &str, title: &str, body: &str) -> Result<String> {
        let id = self.counted(|doc| Ok(insert(doc, collection, title, body)))?;
        log::debug!("Created '{}' in {}", title, collection);
        Ok(id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.counted(|doc| {
            for items in doc.collections.values_mut() {
                if let Some(pos) = items.iter().position(|item| item.id == id) {
                    items.remove(pos);
                    return Ok(());
                }
            }
            Err(HostError::NotFound(id.to_string()))
        })
    }

    fn set_due(&self, collection: &str, title: &str, due: NaiveDateTime) -> Result<()> {
        let key = title_key(title);
        self.counted(|doc| {
            let item = doc
                .collections
                .get_mut(collection)
                .and_then(|items| items.iter_mut().find(|item| title_key(&item.title) == key))
                .ok_or_else(|| HostError::NotFound(format!("{} in {}", title, collection)))?;
            item.due = Some(due);
            Ok(())
        })
    }

    fn set_body(&self, id: &str, body: &str) -> Result<()> {
        self.counted(|doc| {
            let item = doc
                .find_mut(id)
                .ok_or_else(|| HostError::NotFound(id.to_string()))?;
            item.body = body.to_string();
            Ok(())
        })
    }

    fn get_raw_body(&self, id: &str) -> Result<String> {
        let mut document = self.load()?;
        document
            .find_mut(id)
            .map(|item| item.body.clone())
            .ok_or_else(|| HostError::NotFound(id.to_string()))
    }

    fn mark_incomplete(&self, id: &str) -> Result<()> {
        self.counted(|doc| {
            let item = doc
                .find_mut(id)
                .ok_or_else(|| HostError::NotFound(id.to_string()))?;
            item.completed = false;
            Ok(())
        })
    }
}
