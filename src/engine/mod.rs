//! Scheduler run
//!
//! A tick runs three passes over the host collections:
//! 1. reconcile: bind identities, repair title drift, rebuild bodies
//! 2. advance: move completed items along the cadence
//! 3. intake: admit backlog items into daily
//!
//! A failure on one item is recorded in the [`TickReport`] and the pass
//! moves on to the next item.

mod advance;
mod intake;
mod notes;
mod reconcile;

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::config::CadenceConfig;
use crate::content::extract_identifier;
use crate::host::{HostError, HostItem, TaskHost};
use crate::resolver::TextSource;
use crate::state::{title_key, ItemRecord, Stage, StateError, StateStore};
use crate::suggest::Suggester;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// A completed review applied to an item
#[derive(Debug, Clone, Serialize)]
pub struct Advancement {
    pub title: String,
    pub from: Stage,
    pub to: Stage,
    pub due: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub title: String,
    pub error: String,
}

/// What a run did, item by item
#[derive(Debug, Default, Clone, Serialize)]
pub struct TickReport {
    pub advanced: Vec<Advancement>,
    pub renamed: Vec<Rename>,
    /// Items that got a stable id this run
    pub bound: Vec<String>,
    /// Items whose body was rewritten to the canonical layout
    pub rebuilt: Vec<String>,
    pub notes_filled: Vec<String>,
    pub skipped_manual: Vec<String>,
    pub admitted: Vec<String>,
    /// Re-added titles returned to the stage their record had reached
    pub restored: Vec<String>,
    pub duplicates_removed: Vec<String>,
    pub overlaps_skipped: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested: Option<String>,
    pub conflicts: Vec<String>,
    /// Items that disappeared from the host mid-run
    pub vanished: Vec<String>,
    pub stale: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.conflicts.is_empty()
    }

    /// File a per-item error under the right heading
    fn record_error(&mut self, title: &str, error: EngineError) {
        match &error {
            EngineError::Host(e) if e.is_not_found() => {
                log::warn!("'{}' vanished from the host: {}", title, e);
                self.vanished.push(title.to_string());
            }
            EngineError::State(StateError::Conflict { .. }) => {
                log::error!("Identity conflict needs attention: {}", error);
                self.conflicts.push(error.to_string());
            }
            _ => {
                log::error!("Failed to process '{}': {}", title, error);
                self.failures.push(ItemFailure {
                    title: title.to_string(),
                    error: error.to_string(),
                });
            }
        }
    }
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for a in &self.advanced {
            if a.from == a.to {
                writeln!(f, "reviewed   {} ({}), next {}", a.title, a.to, a.due)?;
            } else {
                writeln!(f, "promoted   {} {} -> {}, next {}", a.title, a.from, a.to, a.due)?;
            }
        }
        for r in &self.renamed {
            writeln!(f, "renamed    {} -> {}", r.from, r.to)?;
        }

        let sections: [(&str, &Vec<String>); 11] = [
            ("bound", &self.bound),
            ("rebuilt", &self.rebuilt),
            ("filled", &self.notes_filled),
            ("manual", &self.skipped_manual),
            ("admitted", &self.admitted),
            ("restored", &self.restored),
            ("duplicate", &self.duplicates_removed),
            ("overlap", &self.overlaps_skipped),
            ("conflict", &self.conflicts),
            ("vanished", &self.vanished),
            ("stale", &self.stale),
        ];
        for (label, titles) in sections {
            for title in titles {
                writeln!(f, "{:<10} {}", label, title)?;
            }
        }

        if let Some(suggested) = &self.suggested {
            writeln!(f, "suggested  {}", suggested)?;
        }
        for failure in &self.failures {
            writeln!(f, "failed     {}: {}", failure.title, failure.error)?;
        }
        Ok(())
    }
}

/// Drives one run against a host, a state store and a text source
pub struct Scheduler<'a> {
    host: &'a dyn TaskHost,
    store: &'a StateStore,
    text: &'a dyn TextSource,
    suggester: Option<&'a dyn Suggester>,
    config: &'a CadenceConfig,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        host: &'a dyn TaskHost,
        store: &'a StateStore,
        text: &'a dyn TextSource,
        config: &'a CadenceConfig,
    ) -> Self {
        Self {
            host,
            store,
            text,
            suggester: None,
            config,
        }
    }

    pub fn with_suggester(mut self, suggester: &'a dyn Suggester) -> Self {
        self.suggester = Some(suggester);
        self
    }

    /// Full run: reconcile, advance, intake, then report stale records.
    /// `now` is local wall-clock time.
    pub fn run_tick(&self, now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();
        log::info!("Tick at {}", now);

        self.reconcile(now, &mut report);
        self.advance(now, &mut report);
        self.intake(now, &mut report);

        match self.stale_records() {
            Ok(stale) => report.stale = stale.into_iter().map(|r| r.title).collect(),
            Err(e) => report.record_error("stale report", e),
        }

        log::info!(
            "Tick done: {} advanced, {} renamed, {} admitted, {} failures",
            report.advanced.len(),
            report.renamed.len(),
            report.admitted.len(),
            report.failures.len()
        );
        report
    }

    /// Records with no matching item in any collection, by title or by
    /// stable id. They are reported, never deleted.
    pub fn stale_records(&self) -> Result<Vec<ItemRecord>> {
        let mut keys = HashSet::new();
        let mut ids = HashSet::new();
        for stage in [Stage::Backlog, Stage::Daily, Stage::Weekly, Stage::Monthly, Stage::Mastered] {
            for item in self.host.list_items(self.config.collections.for_stage(stage))? {
                keys.insert(title_key(&item.title));
                if let Some(id) = extract_identifier(&item.body) {
                    ids.insert(id);
                }
            }
        }

        let stale: Vec<ItemRecord> = self
            .store
            .list()?
            .into_iter()
            .filter(|r| !keys.contains(&r.key()))
            .filter(|r| r.stable_id.map_or(true, |id| !ids.contains(&id)))
            .collect();
        for record in &stale {
            log::warn!("Stale record '{}' has no host item", record.title);
        }
        Ok(stale)
    }

    /// Items of every active collection, paired with their stage. A
    /// collection that cannot be listed is reported and skipped.
    fn active_items(&self, report: &mut TickReport) -> Vec<(Stage, String, HostItem)> {
        let mut out = Vec::new();
        for (stage, collection) in self.config.collections.active() {
            match self.host.list_items(collection) {
                Ok(items) => {
                    out.extend(items.into_iter().map(|i| (stage, collection.to_string(), i)))
                }
                Err(e) => report.record_error(collection, e.into()),
            }
        }
        out
    }

    fn is_manual(&self, item: &HostItem) -> bool {
        crate::content::has_manual_override(
            &item.title,
            &item.body,
            &self.config.manual_override_marker,
        )
    }
}
