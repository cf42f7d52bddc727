//! Expiry and duration formatting
//!
//! Turns an absolute expiry timestamp into display strings: a date, a time,
//! and a compact duration such as `1d 4h 20m`.

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDateTime, TimeDelta, Utc};
use std::fmt::{self, Write};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Magnitude of a time delta split into whole days, hours and minutes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationBreakdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl DurationBreakdown {
    /// Split the absolute value of `delta`. Seconds are dropped.
    pub fn from_delta(delta: TimeDelta) -> Self {
        let total = delta.num_seconds().saturating_abs();
        Self {
            days: total / SECONDS_PER_DAY,
            hours: (total % SECONDS_PER_DAY) / SECONDS_PER_HOUR,
            minutes: (total % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE,
        }
    }
}

/// `1d 4h 20m`, omitting zero-valued units; empty when every unit is zero.
impl fmt::Display for DurationBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = [(self.days, 'd'), (self.hours, 'h'), (self.minutes, 'm')];
        let mut first = true;
        for (value, unit) in units {
            if value == 0 {
                continue;
            }
            if !first {
                f.write_char(' ')?;
            }
            write!(f, "{}{}", value, unit)?;
            first = false;
        }
        Ok(())
    }
}

/// Display strings derived from an expiry timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedExpiry {
    pub date: String,
    pub time: String,
    pub expires_in: String,
}

/// Format `expiry` against the current instant.
///
/// When `reference_is_utc` is set "now" is taken in UTC, otherwise in local
/// time; `expiry` is compared as a wall-clock value in that frame.
pub fn format_expiry(
    expiry: NaiveDateTime,
    reference_is_utc: bool,
    date_pattern: &str,
    time_pattern: &str,
) -> FormattedExpiry {
    let now = if reference_is_utc {
        Utc::now().naive_utc()
    } else {
        Local::now().naive_local()
    };
    format_expiry_at(expiry, now, date_pattern, time_pattern)
}

/// Pure form of [`format_expiry`] with an explicit reference instant.
pub fn format_expiry_at(
    expiry: NaiveDateTime,
    now: NaiveDateTime,
    date_pattern: &str,
    time_pattern: &str,
) -> FormattedExpiry {
    FormattedExpiry {
        date: format_pattern(&expiry, date_pattern),
        time: format_pattern(&expiry, time_pattern),
        expires_in: DurationBreakdown::from_delta(expiry - now).to_string(),
    }
}

/// `"<date> <time>"` for display-only timestamps
pub fn format_datetime(ts: NaiveDateTime, date_pattern: &str, time_pattern: &str) -> String {
    format!(
        "{} {}",
        format_pattern(&ts, date_pattern),
        format_pattern(&ts, time_pattern)
    )
}

/// Apply a strftime pattern. Malformed patterns yield an empty string.
pub fn format_pattern(ts: &NaiveDateTime, pattern: &str) -> String {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        tracing::debug!(pattern, "Malformed datetime pattern");
        return String::new();
    }

    let mut out = String::new();
    // Specifiers that need an offset (e.g. %z) fail on naive timestamps
    if write!(out, "{}", ts.format_with_items(items.into_iter())).is_err() {
        tracing::debug!(pattern, "Datetime pattern not applicable to timestamp");
        return String::new();
    }
    out
}
