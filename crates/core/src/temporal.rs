//! Normalization of the temporal encodings used by CDC payloads.

use chrono::{Days, NaiveDate};

/// Integers above this bound in a `*_at` column are microseconds since epoch.
pub const MICROS_THRESHOLD: i64 = 100_000_000_000;

/// Integers below this bound in a `date` column are epoch-day offsets.
pub const EPOCH_DAY_BOUND: i64 = 100_000;

/// Normalize an event-time integer to milliseconds since the epoch.
pub fn to_epoch_millis(value: i64) -> i64 {
    if value > MICROS_THRESHOLD {
        value / 1000
    } else {
        value
    }
}

/// True when `column` carries an event-time instant (`*_at` convention).
pub fn is_instant_column(column: &str) -> bool {
    column.ends_with("_at")
}

/// True when `column` names a calendar date.
pub fn is_date_column(column: &str) -> bool {
    column.contains("date")
}

/// Render an epoch-day offset as an ISO `YYYY-MM-DD` string.
///
/// Returns `None` for offsets outside chrono's calendar range.
pub fn epoch_day_to_iso(days: i64) -> Option<String> {
    // NaiveDate::default() is 1970-01-01.
    let date = if days >= 0 {
        NaiveDate::default().checked_add_days(Days::new(days as u64))?
    } else {
        NaiveDate::default().checked_sub_days(Days::new(days.unsigned_abs()))?
    };
    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microseconds_collapse_to_milliseconds() {
        assert_eq!(to_epoch_millis(1_704_067_205_000_000), 1_704_067_205_000);
    }

    #[test]
    fn small_values_pass_through() {
        assert_eq!(to_epoch_millis(86_400), 86_400);
    }

    #[test]
    fn epoch_day_renders_iso_date() {
        assert_eq!(epoch_day_to_iso(19723).as_deref(), Some("2024-01-04"));
        assert_eq!(epoch_day_to_iso(0).as_deref(), Some("1970-01-01"));
        assert_eq!(epoch_day_to_iso(-1).as_deref(), Some("1969-12-31"));
    }

    #[test]
    fn column_name_conventions() {
        assert!(is_instant_column("updated_at"));
        assert!(!is_instant_column("sale_date"));
        assert!(is_date_column("sale_date"));
        assert!(!is_date_column("updated_at"));
    }
}
