//! Cadence pass over completed items
//!
//! Host writes come first and the state record is updated last. Marking
//! the item incomplete (or deleting it when it moves) consumes the review,
//! so a retried run can miss one review but never count one twice.

use chrono::{NaiveDateTime, Utc};

use super::{Advancement, Result, Scheduler, TickReport};
use crate::cadence::{self, ReviewOutcome};
use crate::content::{canonical_body, extract_identifier};
use crate::host::HostItem;
use crate::state::{title_key, weekday_index, ItemRecord, RecordUpdate, Stage};

impl<'a> Scheduler<'a> {
    /// Advance every completed item in the active collections
    pub fn advance(&self, now: NaiveDateTime, report: &mut TickReport) {
        for (stage, collection, item) in self.active_items(report) {
            if !item.completed {
                continue;
            }
            if self.is_manual(&item) {
                log::info!("Manual override on '{}', not advancing", item.title);
                if !report.skipped_manual.contains(&item.title) {
                    report.skipped_manual.push(item.title.clone());
                }
                continue;
            }
            match self.advance_item(stage, &collection, &item, now) {
                Ok(advancement) => report.advanced.push(advancement),
                Err(e) => report.record_error(&item.title, e),
            }
        }
    }

    /// Record for an item: by body token first, then by title. An item
    /// with neither gets a fresh record in its collection's stage.
    fn record_for(&self, stage: Stage, item: &HostItem, now: NaiveDateTime) -> Result<ItemRecord> {
        if let Some(id) = extract_identifier(&item.body) {
            if let Some(record) = self.store.find_by_stable_id(id)? {
                return Ok(record);
            }
        }
        if let Some(record) = self.store.get(&item.title)? {
            return Ok(record);
        }

        let record = self
            .store
            .get_or_create(&item.title, Some(weekday_index(&now.date())))?;
        if stage == record.stage {
            return Ok(record);
        }
        Ok(self.store.update(
            &record.title,
            RecordUpdate {
                stage: Some(stage),
                ..Default::default()
            },
        )?)
    }

    fn advance_item(
        &self,
        stage: Stage,
        collection: &str,
        item: &HostItem,
        now: NaiveDateTime,
    ) -> Result<Advancement> {
        let record = self.record_for(stage, item, now)?;
        if record.stage != stage {
            log::warn!(
                "'{}' sits in {} but its record says {}",
                item.title,
                collection,
                record.stage
            );
        }

        let mut outcome = cadence::advance(&record, now, self.config);
        if outcome.roll_salt {
            outcome.update.obf_salt = Some(rand::random::<u64>());
        }
        outcome.update.last_reviewed_at = Some(Utc::now());

        let mut next = record.clone();
        outcome.update.clone().apply(&mut next);
        let target = if outcome.rebuild_content || outcome.promoted() {
            canonical_body(&next, self.config)
        } else {
            None
        };

        let destination = self.config.collections.for_stage(outcome.to);
        if destination != collection {
            self.move_item(item, collection, destination, target, outcome.due)?;
        } else {
            if let Some(body) = target {
                if body != self.host.get_raw_body(&item.id)? {
                    self.host.set_body(&item.id, &body)?;
                }
            }
            self.host.set_due(collection, &item.title, outcome.due)?;
            self.host.mark_incomplete(&item.id)?;
        }

        let ReviewOutcome {
            from, to, due, update, ..
        } = outcome;
        self.store.update(&record.title, update)?;

        if from == to {
            log::info!("'{}' reviewed in {}, next due {}", item.title, to, due);
        } else {
            log::info!("'{}' promoted {} -> {}, next due {}", item.title, from, to, due);
        }
        Ok(Advancement {
            title: item.title.clone(),
            from,
            to,
            due,
        })
    }

    /// Copy an item into `destination` and delete the original.
    ///
    /// An item with the same title already in the destination is reused,
    /// so repeating a half-finished move does not duplicate it.
    pub(super) fn move_item(
        &self,
        item: &HostItem,
        source: &str,
        destination: &str,
        body: Option<String>,
        due: NaiveDateTime,
    ) -> Result<()> {
        let key = title_key(&item.title);
        let exists = self
            .host
            .list_items(destination)?
            .iter()
            .any(|other| title_key(&other.title) == key);

        if !exists {
            let body = match body {
                Some(body) => body,
                None => self.host.get_raw_body(&item.id)?,
            };
            self.host.create(destination, &item.title, &body)?;
        }
        self.host.delete(&item.id)?;
        self.host.set_due(destination, &item.title, due)?;
        log::info!("Moved '{}' from {} to {}", item.title, source, destination);
        Ok(())
    }
}
