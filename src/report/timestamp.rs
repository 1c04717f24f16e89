use chrono::{DateTime, Local, TimeZone};

/// Values above this are read as milliseconds since the epoch.
///
/// Second-scale values past roughly the year 2286 are misread as
/// milliseconds; current reports never get there.
const MILLIS_THRESHOLD: f64 = 1e10;

/// Canonical epoch seconds for a timestamp whose unit is unknown.
pub fn normalize_timestamp(ts: f64) -> i64 {
    let seconds = if ts > MILLIS_THRESHOLD { ts / 1000.0 } else { ts };

    #[allow(clippy::cast_possible_truncation)]
    {
        seconds as i64
    }
}

/// `DD.MM.YYYY (HH:MM)` in local time. Negative input renders as the epoch.
pub fn format_date(ts: i64) -> String {
    format_date_in(ts, &Local)
}

pub fn format_date_in<Tz>(ts: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let utc = DateTime::from_timestamp(ts.max(0), 0).unwrap_or(DateTime::UNIX_EPOCH);
    utc.with_timezone(tz).format("%d.%m.%Y (%H:%M)").to_string()
}
