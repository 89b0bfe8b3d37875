//! Due-date arithmetic. Every due date lands on the configured morning time.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};

/// Tomorrow at the morning time
pub fn next_morning(today: NaiveDate, morning: NaiveTime) -> NaiveDateTime {
    (today + Duration::days(1)).and_time(morning)
}

/// Next occurrence of `anchor_weekday` (Monday = 0) strictly after `today`.
/// If today is the anchor weekday the result is a full week out.
pub fn next_weekday(anchor_weekday: u32, today: NaiveDate, morning: NaiveTime) -> NaiveDateTime {
    let current = today.weekday().num_days_from_monday() as i64;
    let mut days_ahead = (anchor_weekday as i64 % 7 - current).rem_euclid(7);
    if days_ahead == 0 {
        days_ahead = 7;
    }
    (today + Duration::days(days_ahead)).and_time(morning)
}

/// First `anchor_weekday` on or after the same day next month. The month
/// step clamps to the target month's last day (Jan 31 → Feb 28/29).
pub fn month_ahead_on_weekday(
    anchor_weekday: u32,
    today: NaiveDate,
    morning: NaiveTime,
) -> NaiveDateTime {
    let base = today
        .checked_add_months(Months::new(1))
        .unwrap_or(today + Duration::days(30));
    let current = base.weekday().num_days_from_monday() as i64;
    let days_ahead = (anchor_weekday as i64 % 7 - current).rem_euclid(7);
    (base + Duration::days(days_ahead)).and_time(morning)
}

/// `days` after today
pub fn days_ahead(today: NaiveDate, days: u32, morning: NaiveTime) -> NaiveDateTime {
    (today + Duration::days(days as i64)).and_time(morning)
}
