//! Identity reconciliation
//!
//! For every item in an active collection:
//! - a manual override marker skips the item entirely
//! - a body token bound to a record repairs title drift and rebuilds the
//!   body from the record
//! - a body token with no record seeds a record from the body (cold start)
//! - a body without a token gets one, minted or reused from the record

use std::collections::HashSet;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::{Rename, Result, Scheduler, TickReport};
use crate::content::{
    append_identifier, canonical_body, extract_full_text, extract_identifier, join_paragraphs,
};
use crate::host::HostItem;
use crate::state::{title_key, weekday_index, ItemRecord, RecordUpdate, Stage, StateError};

impl<'a> Scheduler<'a> {
    /// Reconcile every item in the active collections
    pub fn reconcile(&self, now: NaiveDateTime, report: &mut TickReport) {
        let mut seen = HashSet::new();
        for (stage, _collection, item) in self.active_items(report) {
            if self.is_manual(&item) {
                log::info!("Manual override on '{}', leaving it alone", item.title);
                report.skipped_manual.push(item.title.clone());
                continue;
            }
            if let Err(e) = self.reconcile_item(stage, &item, now, &mut seen, report) {
                report.record_error(&item.title, e);
            }
        }
    }

    fn reconcile_item(
        &self,
        stage: Stage,
        item: &HostItem,
        now: NaiveDateTime,
        seen: &mut HashSet<Uuid>,
        report: &mut TickReport,
    ) -> Result<()> {
        let raw = self.host.get_raw_body(&item.id)?;

        match extract_identifier(&raw) {
            Some(id) => {
                if !seen.insert(id) {
                    return Err(StateError::Conflict {
                        title: item.title.clone(),
                        detail: format!("stable id {} appears on more than one item", id),
                    }
                    .into());
                }
                match self.store.find_by_stable_id(id)? {
                    Some(record) => self.repair_bound(record, item, &raw, report),
                    None => self.cold_start(stage, id, item, &raw, now, report),
                }
            }
            None if raw.trim().is_empty() => {
                self.fill_item(stage, item, now, report)?;
                Ok(())
            }
            None => self.attach_identifier(stage, item, &raw, now, seen, report),
        }
    }

    /// Bring a bound record in line with its item, then rebuild the body
    fn repair_bound(
        &self,
        mut record: ItemRecord,
        item: &HostItem,
        raw: &str,
        report: &mut TickReport,
    ) -> Result<()> {
        if record.key() != title_key(&item.title) {
            match self.repair_drift(&record, item)? {
                Some(renamed) => {
                    report.renamed.push(Rename {
                        from: record.title.clone(),
                        to: renamed.title.clone(),
                    });
                    record = renamed;
                }
                None => return Ok(()),
            }
        } else if record.title != item.title.trim() {
            record = self.store.update(
                &record.title,
                RecordUpdate {
                    title: Some(item.title.clone()),
                    ..Default::default()
                },
            )?;
        }

        if !record.has_canonical_text() {
            if let Some(text) = extract_full_text(raw) {
                record = self
                    .store
                    .update(&record.title, RecordUpdate::canonical_text(text))?;
            }
        }

        self.rebuild_body(&record, item, raw, report)
    }

    /// Move a record to the item's new title with text for that title.
    ///
    /// Returns `None`, leaving everything as it was, when the new text
    /// cannot be fetched. The fetch happens first so a lookup failure is
    /// retried next run instead of leaving a renamed record with old text.
    fn repair_drift(&self, record: &ItemRecord, item: &HostItem) -> Result<Option<ItemRecord>> {
        if let Some(other) = self.store.get(&item.title)? {
            if other.stable_id != record.stable_id {
                return Err(StateError::Conflict {
                    title: item.title.clone(),
                    detail: format!(
                        "cannot move '{}' onto existing record '{}'",
                        record.title, other.title
                    ),
                }
                .into());
            }
        }

        let text = match self.text.resolve(&item.title) {
            Some(paragraphs) => join_paragraphs(&paragraphs),
            None => String::new(),
        };
        if text.is_empty() {
            log::warn!(
                "Title of '{}' changed to '{}' but no text was found; retrying next run",
                record.title,
                item.title
            );
            return Ok(None);
        }

        self.store.rename(&record.title, &item.title)?;
        let renamed = self
            .store
            .update(&item.title, RecordUpdate::canonical_text(text))?;
        log::info!("Renamed '{}' -> '{}'", record.title, renamed.title);
        Ok(Some(renamed))
    }

    /// Write the record's canonical body if it differs from the current one
    pub(super) fn rebuild_body(
        &self,
        record: &ItemRecord,
        item: &HostItem,
        raw: &str,
        report: &mut TickReport,
    ) -> Result<()> {
        let Some(target) = canonical_body(record, self.config) else {
            return Ok(());
        };
        if target == raw {
            return Ok(());
        }

        self.host.set_body(&item.id, &target)?;
        log::info!("Rebuilt body of '{}' ({})", item.title, record.stage);
        report.rebuilt.push(item.title.clone());
        Ok(())
    }

    /// The body carries an id nothing knows about: seed a record from it
    fn cold_start(
        &self,
        stage: Stage,
        id: Uuid,
        item: &HostItem,
        raw: &str,
        now: NaiveDateTime,
        report: &mut TickReport,
    ) -> Result<()> {
        let existed = self.store.get(&item.title)?.is_some();
        let record = self
            .store
            .get_or_create(&item.title, Some(weekday_index(&now.date())))?;
        self.store.bind_stable_id(&record.title, id)?;

        let mut seed = RecordUpdate::default();
        if !existed {
            seed.stage = Some(stage);
        }
        if !record.has_canonical_text() {
            seed.canonical_text = extract_full_text(raw);
        }
        if !seed.is_empty() {
            self.store.update(&record.title, seed)?;
        }

        log::info!("Bound '{}' to existing id {} from its body", item.title, id);
        report.bound.push(item.title.clone());
        Ok(())
    }

    /// Non-empty body without a token: append one, keeping the text as is
    fn attach_identifier(
        &self,
        stage: Stage,
        item: &HostItem,
        raw: &str,
        now: NaiveDateTime,
        seen: &mut HashSet<Uuid>,
        report: &mut TickReport,
    ) -> Result<()> {
        let existing = self.store.get(&item.title)?;
        let bound = existing.as_ref().and_then(|r| r.stable_id);
        if let Some(id) = bound.filter(|id| seen.contains(id)) {
            return Err(StateError::Conflict {
                title: item.title.clone(),
                detail: format!("record already bound to {} by another item", id),
            }
            .into());
        }
        let id = bound.unwrap_or_else(Uuid::new_v4);
        seen.insert(id);

        self.host
            .set_body(&item.id, &append_identifier(raw.trim(), id))?;

        let record = match existing {
            Some(record) => record,
            None => {
                let record = self
                    .store
                    .get_or_create(&item.title, Some(weekday_index(&now.date())))?;
                self.store.update(
                    &record.title,
                    RecordUpdate {
                        stage: Some(stage),
                        ..Default::default()
                    },
                )?
            }
        };
        if record.stable_id.is_none() {
            self.store.bind_stable_id(&record.title, id)?;
        }
        if !record.has_canonical_text() {
            if let Some(text) = extract_full_text(raw) {
                self.store
                    .update(&record.title, RecordUpdate::canonical_text(text))?;
            }
        }

        log::info!("Attached id {} to '{}'", id, item.title);
        report.bound.push(item.title.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::content::{plain_body, FULL_TEXT_SEPARATOR};
    use crate::host::TaskHost;

    const J316: &str = "For God so loved the world, that he gave his only begotten Son.";
    const J317: &str = "For God sent not his Son into the world to condemn the world.";

    fn bound_item(fx: &Fixture, title: &str, text: &str) -> (String, Uuid) {
        let id = Uuid::new_v4();
        fx.store.get_or_create(title, Some(2)).unwrap();
        fx.store.bind_stable_id(title, id).unwrap();
        fx.store
            .update(title, RecordUpdate::canonical_text(text))
            .unwrap();
        let host_id = fx
            .host
            .add_item(&fx.daily(), title, &plain_body(text, id))
            .unwrap();
        (host_id, id)
    }

    #[test]
    fn test_title_change_rewrites_once_then_settles() {
        let fx = Fixture::new();
        let (host_id, id) = bound_item(&fx, "John 3:16", J316);
        fx.host.rename_item(&host_id, "John 3:17").unwrap();

        let source = texts(&[("John 3:16", J316), ("John 3:17", J317)]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);

        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);
        assert!(report.is_clean(), "{}", report);
        assert_eq!(report.renamed.len(), 1);
        assert_eq!(fx.host.write_count(), 1);

        assert!(fx.store.get("John 3:16").unwrap().is_none());
        let record = fx.store.get("John 3:17").unwrap().unwrap();
        assert_eq!(record.stable_id, Some(id));
        assert_eq!(record.canonical_text, J317);
        assert_eq!(record.anchor_weekday, 2);
        assert_eq!(fx.host.get_raw_body(&host_id).unwrap(), plain_body(J317, id));

        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);
        assert!(report.renamed.is_empty());
        assert!(report.rebuilt.is_empty());
        assert_eq!(fx.host.write_count(), 1);
    }

    #[test]
    fn test_drift_without_text_is_left_for_next_run() {
        let fx = Fixture::new();
        let (host_id, id) = bound_item(&fx, "John 3:16", J316);
        fx.host.rename_item(&host_id, "John 3:17").unwrap();

        let source = texts(&[]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);

        assert!(report.renamed.is_empty());
        assert_eq!(fx.host.write_count(), 0);
        assert_eq!(fx.host.get_raw_body(&host_id).unwrap(), plain_body(J316, id));
        assert!(fx.store.get("John 3:16").unwrap().is_some());
    }

    #[test]
    fn test_drift_onto_existing_record_is_a_conflict() {
        let fx = Fixture::new();
        let (host_id, _) = bound_item(&fx, "John 3:16", J316);
        fx.store.get_or_create("John 3:17", Some(0)).unwrap();
        fx.store.bind_stable_id("John 3:17", Uuid::new_v4()).unwrap();
        fx.host.rename_item(&host_id, "John 3:17").unwrap();

        let source = texts(&[("John 3:17", J317)]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);

        assert_eq!(report.conflicts.len(), 1);
        assert!(fx.store.get("John 3:16").unwrap().is_some());
        assert!(fx.store.get("John 3:17").unwrap().is_some());
        assert_eq!(fx.host.write_count(), 0);
    }

    #[test]
    fn test_manual_override_issues_no_writes() {
        let fx = Fixture::new();
        let (host_id, _) = bound_item(&fx, "John 3:16", J316);
        fx.host.rename_item(&host_id, "John 3:17 [manual]").unwrap();
        fx.host.add_item(&fx.daily(), "Psalm 1:1", "[MANUAL] my notes").unwrap();

        let source = texts(&[("John 3:17", J317)]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);

        assert_eq!(report.skipped_manual.len(), 2);
        assert_eq!(fx.host.write_count(), 0);
        assert!(fx.store.get("Psalm 1:1").unwrap().is_none());
    }

    #[test]
    fn test_authored_body_gets_identifier_appended() {
        let fx = Fixture::new();
        let body = "Blessed is the man\nthat walketh not in the counsel of the ungodly";
        let host_id = fx
            .host
            .add_item(&fx.config.collections.weekly, "Psalm 1:1", body)
            .unwrap();

        let source = texts(&[]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);

        let raw = fx.host.get_raw_body(&host_id).unwrap();
        assert!(raw.starts_with(body));
        let id = extract_identifier(&raw).unwrap();
        let record = fx.store.find_by_stable_id(id).unwrap().unwrap();
        assert_eq!(record.stage, Stage::Weekly);
        assert_eq!(record.canonical_text, body);

        // Settled: nothing more to write
        let writes = fx.host.write_count();
        scheduler.reconcile(now(), &mut TickReport::default());
        assert_eq!(fx.host.write_count(), writes);
    }

    #[test]
    fn test_lost_token_reuses_record_id() {
        let fx = Fixture::new();
        let (host_id, id) = bound_item(&fx, "John 3:16", J316);
        fx.host.set_body(&host_id, J316).unwrap();

        let source = texts(&[]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        scheduler.reconcile(now(), &mut TickReport::default());

        assert_eq!(
            extract_identifier(&fx.host.get_raw_body(&host_id).unwrap()),
            Some(id)
        );
    }

    #[test]
    fn test_empty_body_waits_for_text() {
        let fx = Fixture::new();
        let host_id = fx.host.add_item(&fx.daily(), "Jude 1:24", "").unwrap();

        let none = texts(&[]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &none, &fx.config);
        scheduler.reconcile(now(), &mut TickReport::default());
        assert_eq!(fx.host.get_raw_body(&host_id).unwrap(), "");
        assert_eq!(fx.host.write_count(), 0);

        let some = texts(&[("Jude 1:24", "Now unto him that is able to keep you from falling")]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &some, &fx.config);
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);
        assert_eq!(report.notes_filled, vec!["Jude 1:24".to_string()]);
        let raw = fx.host.get_raw_body(&host_id).unwrap();
        let id = extract_identifier(&raw).unwrap();
        assert_eq!(
            fx.store.get("Jude 1:24").unwrap().unwrap().stable_id,
            Some(id)
        );
    }

    #[test]
    fn test_cold_start_seeds_record_from_masked_body() {
        let fx = Fixture::new();
        let id = Uuid::new_v4();
        let body = crate::content::masked_body("For ___ so _____", J316, id, 3);
        fx.host
            .add_item(&fx.config.collections.monthly, "John 3:16", &body)
            .unwrap();

        let source = texts(&[]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);

        assert_eq!(report.bound, vec!["John 3:16".to_string()]);
        let record = fx.store.find_by_stable_id(id).unwrap().unwrap();
        assert_eq!(record.stage, Stage::Monthly);
        assert_eq!(record.canonical_text, J316);
        assert_eq!(fx.host.write_count(), 0);

        // Next pass renders the canonical masked layout
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);
        assert_eq!(report.rebuilt.len(), 1);
        let items = fx.host.list_items(&fx.config.collections.monthly).unwrap();
        let raw = fx.host.get_raw_body(&items[0].id).unwrap();
        assert!(raw.contains(FULL_TEXT_SEPARATOR));
        assert_eq!(extract_full_text(&raw).as_deref(), Some(J316));
    }

    #[test]
    fn test_duplicated_token_is_a_conflict() {
        let fx = Fixture::new();
        let (_, id) = bound_item(&fx, "John 3:16", J316);
        fx.host
            .add_item(&fx.config.collections.weekly, "John 3:16", &plain_body(J316, id))
            .unwrap();

        let source = texts(&[]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);
        assert_eq!(report.conflicts.len(), 1);
    }

    #[test]
    fn test_same_title_twice_without_token_writes_one_id() {
        let fx = Fixture::new();
        let first = fx.host.add_item(&fx.daily(), "Psalm 1:1", "Blessed is the man").unwrap();
        let second = fx
            .host
            .add_item(&fx.config.collections.weekly, "Psalm 1:1", "Blessed is the man")
            .unwrap();

        let source = texts(&[]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);

        assert_eq!(report.bound, vec!["Psalm 1:1".to_string()]);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(fx.host.write_count(), 1);
        let id = extract_identifier(&fx.host.get_raw_body(&first).unwrap());
        assert_eq!(id, fx.store.get("Psalm 1:1").unwrap().unwrap().stable_id);
        assert_eq!(fx.host.get_raw_body(&second).unwrap(), "Blessed is the man");

        // Still a conflict next run, and still no stray id written
        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(fx.host.write_count(), 1);
        assert!(extract_identifier(&fx.host.get_raw_body(&second).unwrap()).is_none());
    }

    #[test]
    fn test_leading_blank_lines_settle_in_one_write() {
        let fx = Fixture::new();
        let host_id = fx
            .host
            .add_item(&fx.config.collections.weekly, "Micah 6:8", "\n\n  He hath shewed thee, O man")
            .unwrap();

        let source = texts(&[]);
        let scheduler = Scheduler::new(&fx.host, &fx.store, &source, &fx.config);
        scheduler.reconcile(now(), &mut TickReport::default());
        assert_eq!(fx.host.write_count(), 1);

        let raw = fx.host.get_raw_body(&host_id).unwrap();
        let id = extract_identifier(&raw).unwrap();
        assert_eq!(raw, plain_body("He hath shewed thee, O man", id));

        let mut report = TickReport::default();
        scheduler.reconcile(now(), &mut report);
        assert!(report.rebuilt.is_empty());
        assert_eq!(fx.host.write_count(), 1);
    }
}
