//! Task host boundary
//!
//! Items live as tasks in per-stage collections of an external task list.
//! The scheduler only talks to the host through [`TaskHost`]; every call
//! that targets a vanished item fails with [`HostError::NotFound`], which
//! callers treat as recoverable.

mod json_host;

pub use json_host::JsonTaskHost;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HostError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, HostError>;

/// One task as reported by [`TaskHost::list_items`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostItem {
    pub id: String,
    pub title: String,
    /// Line breaks folded to spaces; use [`TaskHost::get_raw_body`] for
    /// the exact text
    pub body: String,
    pub completed: bool,
    pub due: Option<NaiveDateTime>,
}

/// Operations the scheduler needs from a task list
pub trait TaskHost {
    /// Items in `collection`; an unknown collection is empty
    fn list_items(&self, collection: &str) -> Result<Vec<HostItem>>;

    /// Create an item and return its host id
    fn create(&self, collection: &str, title: &str, body: &str) -> Result<String>;

    fn delete(&self, id: &str) -> Result<()>;

    /// Set the due date of the item in `collection` whose title matches
    fn set_due(&self, collection: &str, title: &str, due: NaiveDateTime) -> Result<()>;

    fn set_body(&self, id: &str, body: &str) -> Result<()>;

    /// Body with its original line breaks
    fn get_raw_body(&self, id: &str) -> Result<String>;

    fn mark_incomplete(&self, id: &str) -> Result<()>;
}

/// Fold CR/LF to single spaces, the way list bodies are reported
pub fn sanitize_body(body: &str) -> String {
    body.replace("\r\n", " ").replace(['\r', '\n'], " ")
}
