//! Calendar date helpers for IMAP search keys.
//!
//! IMAP date search keys (`SINCE`, `SENTSINCE`, ...) take dates in
//! `DD-Mon-YYYY` form, e.g. `01-Jan-2021`.

use chrono::{Local, NaiveDate, TimeDelta};

use crate::error::{Error, Result};

/// Format of the dates accepted by [`format_date`].
const ISO_DATE: &str = "%Y-%m-%d";

/// Format of an IMAP search date.
const IMAP_DATE: &str = "%d-%b-%Y";

/// Renders a date as an IMAP search date (`DD-Mon-YYYY`).
#[must_use]
pub fn imap_date(date: NaiveDate) -> String {
    date.format(IMAP_DATE).to_string()
}

/// Converts a `YYYY-MM-DD` date into `DD-Mon-YYYY`.
///
/// # Errors
///
/// Returns [`Error::Command`] if `date` is not a valid `YYYY-MM-DD` date.
pub fn format_date(date: &str) -> Result<String> {
    NaiveDate::parse_from_str(date.trim(), ISO_DATE)
        .map(imap_date)
        .map_err(|e| Error::Command(format!("Invalid date {date:?}: {e}")))
}

/// Returns `from` shifted by `days` (negative values go back in time).
///
/// # Errors
///
/// Returns [`Error::Command`] if the result is outside the supported range.
pub fn date_travel(from: NaiveDate, days: i64) -> Result<NaiveDate> {
    TimeDelta::try_days(days)
        .and_then(|delta| from.checked_add_signed(delta))
        .ok_or_else(|| Error::Command(format!("Date offset out of range: {days} days")))
}

/// Returns the `SENTSINCE` date for a window of `days` relative to `today`.
///
/// # Errors
///
/// Returns [`Error::Command`] if the result is outside the supported range.
pub fn sent_since_token(today: NaiveDate, days: i64) -> Result<String> {
    date_travel(today, days).map(imap_date)
}

/// Returns today's date in the local time zone.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2021-01-01").unwrap(), "01-Jan-2021");
        assert_eq!(format_date("2021-12-31").unwrap(), "31-Dec-2021");
        assert_eq!(format_date("1999-07-04").unwrap(), "04-Jul-1999");
    }

    #[test]
    fn test_format_date_rejects_garbage() {
        assert!(matches!(format_date("2021-13-01"), Err(Error::Command(_))));
        assert!(matches!(format_date("01-Jan-2021"), Err(Error::Command(_))));
        assert!(matches!(format_date(""), Err(Error::Command(_))));
    }

    #[test]
    fn test_date_travel_backwards() {
        assert_eq!(date_travel(date(2021, 1, 2), -2).unwrap(), date(2020, 12, 31));
        assert_eq!(date_travel(date(2024, 3, 1), -1).unwrap(), date(2024, 2, 29));
        assert_eq!(date_travel(date(2024, 3, 1), 0).unwrap(), date(2024, 3, 1));
    }

    #[test]
    fn test_date_travel_out_of_range() {
        assert!(date_travel(date(2021, 1, 1), i64::MIN).is_err());
        assert!(date_travel(NaiveDate::MIN, -1).is_err());
    }

    #[test]
    fn test_sent_since_token() {
        assert_eq!(sent_since_token(date(2021, 1, 3), -2).unwrap(), "01-Jan-2021");
    }
}
