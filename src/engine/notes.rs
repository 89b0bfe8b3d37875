//! Filling empty item bodies with canonical text

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::{Result, Scheduler, TickReport};
use crate::content::canonical_body;
use crate::host::HostItem;
use crate::state::{weekday_index, RecordUpdate, Stage};

impl<'a> Scheduler<'a> {
    /// Give every empty-bodied item in the active collections its text
    /// and a stable id. Items whose text cannot be found stay empty.
    pub fn fill_notes(&self, now: NaiveDateTime, report: &mut TickReport) {
        for (stage, _collection, item) in self.active_items(report) {
            if self.is_manual(&item) || !item.body.trim().is_empty() {
                continue;
            }
            if let Err(e) = self.fill_item(stage, &item, now, report) {
                report.record_error(&item.title, e);
            }
        }
    }

    /// Fill one empty item. Returns whether a body was written.
    ///
    /// The id is only persisted together with text, so an item with no
    /// resolvable text is left untouched.
    pub(super) fn fill_item(
        &self,
        stage: Stage,
        item: &HostItem,
        now: NaiveDateTime,
        report: &mut TickReport,
    ) -> Result<bool> {
        let Some(text) = self.store.resolve_or_fetch(&item.title, self.text)? else {
            log::debug!("No text for '{}' yet", item.title);
            return Ok(false);
        };

        let existed = self.store.get(&item.title)?.is_some();
        let mut record = self
            .store
            .get_or_create(&item.title, Some(weekday_index(&now.date())))?;

        let mut seed = RecordUpdate::default();
        if !existed {
            seed.stage = Some(stage);
        }
        if !record.has_canonical_text() {
            seed.canonical_text = Some(text);
        }
        if !seed.is_empty() {
            record = self.store.update(&record.title, seed)?;
        }

        let id = record.stable_id.unwrap_or_else(Uuid::new_v4);
        let mut rendered = record.clone();
        rendered.stable_id = Some(id);
        let Some(body) = canonical_body(&rendered, self.config) else {
            return Ok(false);
        };

        self.host.set_body(&item.id, &body)?;
        if record.stable_id.is_none() {
            self.store.bind_stable_id(&record.title, id)?;
        }

        log::info!("Filled notes for '{}'", item.title);
        report.notes_filled.push(item.title.clone());
        Ok(true)
    }
}
