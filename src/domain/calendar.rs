use crate::domain::models::Weekday;
use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const DEFAULT_ZONE: Tz = chrono_tz::Asia::Seoul;
pub const WINDOW_DAYS: u64 = 7;

pub fn today_start(zone: Tz, now: DateTime<Utc>) -> DateTime<Tz> {
    let midnight = now.with_timezone(&zone).date_naive().and_time(NaiveTime::MIN);
    // Midnight always exists in a fixed-offset civil zone; the fallback only
    // matters for zones with a DST gap at 00:00.
    zone.from_local_datetime(&midnight)
        .earliest()
        .unwrap_or_else(|| now.with_timezone(&zone))
}

pub fn add_days(instant: DateTime<Tz>, n: u64) -> DateTime<Tz> {
    instant
        .checked_add_days(Days::new(n))
        .unwrap_or(instant + Duration::days(n as i64))
}

pub fn to_iso_date(instant: DateTime<Tz>) -> String {
    instant.format("%Y-%m-%d").to_string()
}

pub fn weekday_of(instant: DateTime<Tz>) -> Weekday {
    Weekday::from(instant.weekday())
}

pub fn projected_dates(weekday: Weekday, today: DateTime<Tz>) -> Vec<String> {
    let mut out = Vec::new();
    for offset in 1..=WINDOW_DAYS {
        let day = add_days(today, offset);
        if weekday_of(day) == weekday {
            out.push(to_iso_date(day));
        }
    }
    out
}

pub fn window_dates(today: DateTime<Tz>) -> Vec<(Weekday, String)> {
    (1..=WINDOW_DAYS)
        .map(|offset| {
            let day = add_days(today, offset);
            (weekday_of(day), to_iso_date(day))
        })
        .collect()
}
