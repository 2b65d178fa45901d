//! Age classification.
//!
//! Two deliberately different notions of "months": [`is_older_than`] uses a
//! fixed 30-day month for highlighting and staleness, [`months_between`]
//! counts calendar months for the numeric ages in reports. They disagree
//! near month boundaries.

use chrono::{DateTime, Datelike, Duration, Utc};

/// Repositories not updated for longer than this are stale.
pub const REPO_STALE_MONTHS: i64 = 12;

/// Branches not pushed for longer than this are stale.
pub const BRANCH_STALE_MONTHS: i64 = 6;

/// True if more than `months` × 30 days have passed since `timestamp`.
pub fn is_older_than(timestamp: DateTime<Utc>, months: i64) -> bool {
    is_older_than_at(timestamp, months, Utc::now())
}

/// [`is_older_than`] against an explicit clock.
pub fn is_older_than_at(timestamp: DateTime<Utc>, months: i64, now: DateTime<Utc>) -> bool {
    now - timestamp > Duration::hours(months * 30 * 24)
}

/// Whole calendar months from `start` to `end`.
///
/// One less when the day of month of `start` has not been reached in the
/// end month.
pub fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i32 {
    let years = end.year() - start.year();
    let months = end.month() as i32 - start.month() as i32;
    let mut total = years * 12 + months;

    if end.day() < start.day() {
        total -= 1;
    }

    total
}
