//! Backlog intake
//!
//! Exact duplicates of active items are deleted from the backlog. Items
//! whose reference overlaps an active item stay in the backlog and are
//! reported. Up to `max_new_per_run` of the rest move into daily, except
//! titles whose record already progressed further, which return to their
//! record's stage.

use chrono::{NaiveDateTime, Utc};
use uuid::Uuid;

use super::{Result, Scheduler, TickReport};
use crate::cadence::dates::next_morning;
use crate::content::{canonical_body, extract_full_text, extract_identifier, join_paragraphs};
use crate::host::HostItem;
use crate::reference::references_overlap;
use crate::state::{title_key, weekday_index, RecordUpdate, Stage};
use crate::suggest::suggestion_allowed;

impl<'a> Scheduler<'a> {
    pub fn intake(&self, now: NaiveDateTime, report: &mut TickReport) {
        let mut active: Vec<String> = self
            .active_items(report)
            .into_iter()
            .map(|(_, _, item)| item.title)
            .collect();
        let backlog_name = &self.config.collections.backlog;
        let backlog = match self.host.list_items(backlog_name) {
            Ok(items) => items,
            Err(e) => {
                report.record_error(backlog_name, e.into());
                return;
            }
        };

        let mut pending = Vec::new();
        for item in backlog {
            if self.is_manual(&item) {
                report.skipped_manual.push(item.title.clone());
                continue;
            }
            let key = title_key(&item.title);
            if active.iter().any(|t| title_key(t) == key) {
                match self.host.delete(&item.id) {
                    Ok(()) => {
                        log::info!("Removed duplicate '{}' from backlog", item.title);
                        report.duplicates_removed.push(item.title.clone());
                    }
                    Err(e) => report.record_error(&item.title, e.into()),
                }
                continue;
            }
            pending.push(item);
        }

        let limit = self.config.intake.max_new_per_run;
        let mut admitted = 0;
        for item in &pending {
            if admitted >= limit {
                break;
            }
            if let Some(other) = active.iter().find(|t| references_overlap(t, &item.title)) {
                log::info!("'{}' overlaps active '{}', keeping it in backlog", item.title, other);
                report.overlaps_skipped.push(item.title.clone());
                continue;
            }
            match self.admit(item, now) {
                Ok(stage) => {
                    if stage == Stage::Daily {
                        report.admitted.push(item.title.clone());
                    } else {
                        report.restored.push(item.title.clone());
                    }
                    active.push(item.title.clone());
                    admitted += 1;
                }
                Err(e) => report.record_error(&item.title, e),
            }
        }

        if pending.is_empty() {
            if let Err(e) = self.maybe_suggest(&active, report) {
                report.record_error("suggestion", e);
            }
        }
    }

    /// Move one backlog item into daily and start its record.
    ///
    /// A title whose record already got past daily (its item was deleted
    /// and later re-added) goes back to the record's own stage with its
    /// progress kept. Returns the stage the item landed in.
    fn admit(&self, item: &HostItem, now: NaiveDateTime) -> Result<Stage> {
        let today = now.date();
        let raw = self.host.get_raw_body(&item.id)?;
        let record = self
            .store
            .get_or_create(&item.title, Some(weekday_index(&today)))?;

        let id = record
            .stable_id
            .or_else(|| extract_identifier(&raw))
            .unwrap_or_else(Uuid::new_v4);
        let text = extract_full_text(&raw)
            .or_else(|| record.has_canonical_text().then(|| record.canonical_text.clone()))
            .or_else(|| {
                self.text
                    .resolve(&item.title)
                    .map(|p| join_paragraphs(&p))
                    .filter(|t| !t.is_empty())
            });

        let restoring = matches!(record.stage, Stage::Weekly | Stage::Monthly | Stage::Mastered);
        let first_review = next_morning(today, self.config.morning());
        let due = if restoring {
            record
                .next_due
                .filter(|due| *due > now)
                .unwrap_or(first_review)
        } else {
            first_review
        };

        let mut update = RecordUpdate {
            canonical_text: text.clone(),
            next_due: Some(due),
            ..Default::default()
        };
        if record.stage == Stage::Backlog {
            update.stage = Some(Stage::Daily);
            update.daily_count = Some(0);
        }

        let mut next = record.clone();
        update.clone().apply(&mut next);
        if text.is_some() {
            next.stable_id = Some(id);
        }
        let body = canonical_body(&next, self.config).unwrap_or_else(|| raw.clone());

        let backlog = &self.config.collections.backlog;
        let destination = self.config.collections.for_stage(next.stage);
        self.move_item(item, backlog, destination, Some(body), due)?;

        self.store.update(&record.title, update)?;
        if text.is_some() && record.stable_id.is_none() {
            self.store.bind_stable_id(&record.title, id)?;
        }

        if restoring {
            log::info!(
                "Restored '{}' into {} with its progress, next review {}",
                item.title,
                next.stage,
                due
            );
        } else {
            log::info!("Admitted '{}' into daily, first review {}", item.title, due);
        }
        Ok(next.stage)
    }

    /// Ask the suggester for a new backlog item when the gate allows
    fn maybe_suggest(&self, active: &[String], report: &mut TickReport) -> Result<()> {
        let Some(suggester) = self.suggester else {
            return Ok(());
        };
        let now = Utc::now();
        let meta = self.store.meta()?;
        if !suggestion_allowed(meta.last_suggestion_at, now, self.config.intake.suggest_min_days) {
            log::debug!("Suggestion gate closed");
            return Ok(());
        }

        let mut exclusions: Vec<String> = active.to_vec();
        exclusions.extend(self.store.list()?.into_iter().map(|r| r.title));

        let topic = self.config.intake.suggestion_topic.as_deref();
        let Some(reference) = suggester.suggest(topic, &exclusions) else {
            log::info!("No suggestion available");
            return Ok(());
        };

        self.host
            .create(&self.config.collections.backlog, &reference, "")?;
        self.store.set_last_suggestion_at(now)?;
        log::info!("Added suggestion '{}' to backlog", reference);
        report.suggested = Some(reference);
        Ok(())
    }
}
