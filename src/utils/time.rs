use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

/// Parses an IANA zone name, falling back to UTC.
pub fn parse_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(e) => {
            log::warn!("[Time] Unknown timezone '{}' ({}), using UTC", name, e);
            Tz::UTC
        }
    }
}

pub fn local_hour(ts: DateTime<Utc>, tz: Tz) -> u32 {
    ts.with_timezone(&tz).hour()
}

pub fn local_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// 0 = Sunday.
pub fn local_weekday(ts: DateTime<Utc>, tz: Tz) -> u32 {
    ts.with_timezone(&tz).weekday().num_days_from_sunday()
}

/// Calendar days from `now` to `due` in the given zone. Negative when overdue.
pub fn calendar_days_until(due: DateTime<Utc>, now: DateTime<Utc>, tz: Tz) -> i64 {
    (local_date(due, tz) - local_date(now, tz)).num_days()
}
