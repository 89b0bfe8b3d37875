//! Stage transitions on a completed review
//!
//! daily → weekly → monthly → mastered, with the mastered stage looping
//! over expanding intervals. Each call either increments the current
//! stage's counter or promotes and resets the new stage's counter.

use chrono::NaiveDateTime;

use super::dates::{days_ahead, month_ahead_on_weekday, next_morning, next_weekday};
use crate::config::CadenceConfig;
use crate::state::{ItemRecord, RecordUpdate, Stage};

/// Result of applying one reviewed signal to a record
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub from: Stage,
    pub to: Stage,
    pub due: NaiveDateTime,
    /// Counter and stage changes; `next_due` is already set
    pub update: RecordUpdate,
    /// A fresh masking salt must be drawn before rebuilding
    pub roll_salt: bool,
    /// The visible body must be re-rendered
    pub rebuild_content: bool,
}

impl ReviewOutcome {
    pub fn promoted(&self) -> bool {
        self.from != self.to
    }
}

/// Interval for the `k`-th mastered review (1-based)
pub fn mastered_interval_days(k: u32, config: &CadenceConfig) -> u32 {
    k.checked_sub(1)
        .and_then(|i| config.mastered_intervals_days.get(i as usize))
        .copied()
        .unwrap_or(config.mastered_fallback_days)
}

/// Compute the outcome of a completed review at `now` (local wall clock)
pub fn advance(record: &ItemRecord, now: NaiveDateTime, config: &CadenceConfig) -> ReviewOutcome {
    let today = now.date();
    let morning = config.morning();
    let anchor = record.anchor_weekday;

    let mut update = RecordUpdate::default();
    let mut roll_salt = false;
    let mut rebuild_content = false;

    let (to, due) = match record.stage {
        Stage::Backlog | Stage::Daily => {
            let count = record.daily_count;
            if count + 1 < config.daily_limit {
                update.daily_count = Some(count + 1);
                (Stage::Daily, next_morning(today, morning))
            } else {
                update.daily_count = Some(config.daily_limit);
                update.weekly_count = Some(0);
                (Stage::Weekly, next_weekday(anchor, today, morning))
            }
        }
        Stage::Weekly => {
            let count = record.weekly_count;
            if count + 1 < config.weekly_limit {
                update.weekly_count = Some(count + 1);
                (Stage::Weekly, next_weekday(anchor, today, morning))
            } else {
                update.weekly_count = Some(config.weekly_limit);
                update.monthly_count = Some(0);
                roll_salt = true;
                rebuild_content = true;
                (Stage::Monthly, month_ahead_on_weekday(anchor, today, morning))
            }
        }
        Stage::Monthly => {
            let count = record.monthly_count + 1;
            update.monthly_count = Some(count);
            rebuild_content = true;
            if count >= config.monthly_limit {
                update.mastered_count = Some(0);
                (Stage::Mastered, days_ahead(today, mastered_interval_days(1, config), morning))
            } else {
                roll_salt = true;
                (Stage::Monthly, month_ahead_on_weekday(anchor, today, morning))
            }
        }
        Stage::Mastered => {
            let k = record.mastered_count + 1;
            update.mastered_count = Some(k);
            rebuild_content = true;
            (Stage::Mastered, days_ahead(today, mastered_interval_days(k, config), morning))
        }
    };

    if to != record.stage {
        update.stage = Some(to);
    }
    update.next_due = Some(due);

    ReviewOutcome {
        from: record.stage,
        to,
        due,
        update,
        roll_salt,
        rebuild_content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

    fn now() -> NaiveDateTime {
        // Sunday afternoon
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(19, 30, 0)
            .unwrap()
    }

    fn record(stage: Stage, anchor: u32) -> ItemRecord {
        let mut record = ItemRecord::new("John 3:16", anchor);
        record.stage = stage;
        record
    }

    fn counter(record: &ItemRecord, stage: Stage) -> u32 {
        match stage {
            Stage::Backlog => 0,
            Stage::Daily => record.daily_count,
            Stage::Weekly => record.weekly_count,
            Stage::Monthly => record.monthly_count,
            Stage::Mastered => record.mastered_count,
        }
    }

    #[test]
    fn test_daily_repeat_schedules_next_morning() {
        let config = CadenceConfig::default();
        let mut rec = record(Stage::Daily, 3);
        rec.daily_count = 2;

        let outcome = advance(&rec, now(), &config);
        assert_eq!(outcome.to, Stage::Daily);
        assert_eq!(outcome.update.daily_count, Some(3));
        assert_eq!(outcome.due.date(), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(outcome.due.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert!(!outcome.rebuild_content);
    }

    #[test]
    fn test_daily_six_of_seven_promotes_to_weekly_on_anchor() {
        let config = CadenceConfig::default();
        // Anchor Wednesday
        let mut rec = record(Stage::Daily, 2);
        rec.daily_count = 6;

        let outcome = advance(&rec, now(), &config);
        assert_eq!(outcome.to, Stage::Weekly);
        assert_eq!(outcome.update.stage, Some(Stage::Weekly));
        assert_eq!(outcome.update.weekly_count, Some(0));
        assert_eq!(outcome.due.weekday(), Weekday::Wed);
        assert_eq!(outcome.due.date(), NaiveDate::from_ymd_opt(2026, 10, 21).unwrap());
    }

    #[test]
    fn test_weekly_on_anchor_day_rolls_full_week() {
        let config = CadenceConfig::default();
        // Anchor Sunday, and now() is a Sunday
        let rec = record(Stage::Weekly, 6);
        let outcome = advance(&rec, now(), &config);
        assert_eq!(outcome.due.date(), NaiveDate::from_ymd_opt(2026, 10, 25).unwrap());
    }

    #[test]
    fn test_weekly_promotes_to_monthly_with_salt_and_rebuild() {
        let config = CadenceConfig::default();
        let mut rec = record(Stage::Weekly, 0);
        rec.weekly_count = 3;

        let outcome = advance(&rec, now(), &config);
        assert_eq!(outcome.to, Stage::Monthly);
        assert_eq!(outcome.update.monthly_count, Some(0));
        assert!(outcome.roll_salt);
        assert!(outcome.rebuild_content);
        // First Monday on/after 2026-11-18 is 2026-11-23
        assert_eq!(outcome.due.date(), NaiveDate::from_ymd_opt(2026, 11, 23).unwrap());
    }

    #[test]
    fn test_monthly_reaching_limit_masters() {
        let config = CadenceConfig::default();
        let mut rec = record(Stage::Monthly, 0);
        rec.monthly_count = config.monthly_limit - 1;

        let outcome = advance(&rec, now(), &config);
        assert_eq!(outcome.to, Stage::Mastered);
        assert_eq!(outcome.update.mastered_count, Some(0));
        assert_eq!(
            outcome.due.date(),
            now().date() + chrono::Duration::days(config.mastered_intervals_days[0] as i64)
        );
    }

    #[test]
    fn test_monthly_stay_rolls_salt_once() {
        let config = CadenceConfig::default();
        let mut rec = record(Stage::Monthly, 4);
        rec.monthly_count = 5;

        let outcome = advance(&rec, now(), &config);
        assert_eq!(outcome.to, Stage::Monthly);
        assert_eq!(outcome.update.monthly_count, Some(6));
        assert!(outcome.roll_salt);
        assert_eq!(outcome.due.weekday(), Weekday::Fri);
    }

    #[test]
    fn test_mastered_intervals_expand_then_fall_back() {
        let config = CadenceConfig::default();
        let mut rec = record(Stage::Mastered, 0);
        let mut gaps = Vec::new();
        for _ in 0..6 {
            let outcome = advance(&rec, now(), &config);
            assert_eq!(outcome.to, Stage::Mastered);
            gaps.push((outcome.due.date() - now().date()).num_days());
            outcome.update.apply(&mut rec);
        }
        assert_eq!(gaps, vec![60, 90, 120, 180, 365, 365]);
        assert_eq!(rec.mastered_count, 6);
    }

    #[test]
    fn test_anchor_and_single_counter_invariants_over_full_lifecycle() {
        let mut config = CadenceConfig::default();
        config.daily_limit = 3;
        config.weekly_limit = 2;
        config.monthly_limit = 3;

        let mut rec = record(Stage::Daily, 4);
        let mut clock = now();
        for _ in 0..20 {
            let before = rec.clone();
            let outcome = advance(&rec, clock, &config);
            outcome.update.clone().apply(&mut rec);

            if outcome.promoted() {
                assert_eq!(counter(&rec, outcome.to), 0);
                assert_eq!(outcome.to as u8, outcome.from as u8 + 1);
            } else {
                assert_eq!(counter(&rec, outcome.to), counter(&before, outcome.from) + 1);
            }
            assert_eq!(rec.anchor_weekday, 4);
            assert!(outcome.due > clock);
            clock = outcome.due;
        }
        assert_eq!(rec.stage, Stage::Mastered);
    }

    #[test]
    fn test_mastered_interval_indexing() {
        let config = CadenceConfig::default();
        assert_eq!(mastered_interval_days(0, &config), config.mastered_fallback_days);
        assert_eq!(mastered_interval_days(1, &config), 60);
        assert_eq!(mastered_interval_days(4, &config), 180);
        assert_eq!(mastered_interval_days(5, &config), 365);
    }
}
