use crate::error::{HoursError, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// The seven dates (Monday first) of the week containing `date`.
pub fn week_dates(date: NaiveDate) -> Vec<NaiveDate> {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (0..7).map(|offset| monday + Duration::days(offset)).collect()
}

/// Converts a local wall-clock time to UTC.
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times inside
/// a spring-forward gap are moved one hour later.
pub fn local_to_utc(local: NaiveDateTime) -> Result<DateTime<Utc>> {
    Local
        .from_local_datetime(&local)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| HoursError::InvalidWindow(format!("No local time exists for {local}")))
}

pub fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    local_to_utc(date.and_time(NaiveTime::MIN))
}

pub fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59)
        .ok_or_else(|| HoursError::InvalidWindow("23:59:59 is not a valid time".to_string()))?;
    local_to_utc(date.and_time(last_second))
}

/// Calendar date of `timestamp` in the user's local time zone.
pub fn local_date(timestamp: &DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses `today`, `yesterday` or `YYYY-MM-DD` relative to `today`.
pub fn parse_date_arg(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    match input.trim().to_lowercase().as_str() {
        "" | "today" => Ok(today),
        "yesterday" => today
            .pred_opt()
            .ok_or_else(|| HoursError::InvalidWindow(format!("No day before {today}"))),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| {
            HoursError::InvalidWindow(format!(
                "Invalid date '{input}'. Please use today, yesterday or YYYY-MM-DD"
            ))
        }),
    }
}
