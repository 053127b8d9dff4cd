//! Date-partitioned storage buckets.
//!
//! A bucket is the `YYYY/<Month YY>/<DDMon YY>` directory segment a run writes
//! into. It is derived from an instant interpreted in a fixed civil timezone,
//! so the host's local zone never leaks into the archive layout.

use std::path::PathBuf;

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// India Standard Time, UTC+05:30.
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

const MONTHS_LONG: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTHS_SHORT: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Folder labels for one civil day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Four-digit year, e.g. `2026`.
    pub year: String,
    /// Full month name and two-digit year, e.g. `December 26`.
    pub month_folder: String,
    /// Two-digit day, short month name and two-digit year, e.g. `12Dec 26`.
    pub day_folder: String,
}

impl TimeBucket {
    /// `year/month_folder/day_folder` as a relative path.
    pub fn relative_path(&self) -> PathBuf {
        [&self.year, &self.month_folder, &self.day_folder]
            .iter()
            .collect()
    }
}

/// Resolve the bucket for `now` as seen in `tz`.
///
/// Month names are fixed English tables rather than locale formatting.
pub fn resolve<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> TimeBucket {
    let local = now.with_timezone(tz);
    let year = local.year();
    let yy = year.rem_euclid(100);
    let month_idx = local.month0() as usize;

    TimeBucket {
        year: format!("{year:04}"),
        month_folder: format!("{} {yy:02}", MONTHS_LONG[month_idx]),
        day_folder: format!("{:02}{} {yy:02}", local.day(), MONTHS_SHORT[month_idx]),
    }
}

/// The default target zone.
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Parse a `+HH:MM` / `-HH:MM` / `Z` offset.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hh, mm) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hh.parse().ok()?;
    let minutes: i32 = mm.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
