use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

const MILLIS_PER_MINUTE: f64 = 60_000.;

/// Drops everything below a millisecond. Stored timestamps never carry more precision than that,
/// so truncating on creation keeps export and import lossless.
pub fn truncate_to_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

/// Converts milliseconds into minutes rounded to 2 decimal places.
pub fn millis_to_rounded_minutes(millis: i64) -> f64 {
    round_to_hundredths(millis as f64 / MILLIS_PER_MINUTE)
}

pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.).round() / 100.
}

/// Returns monday of the week `date` belongs to.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Local calendar date of an instant.
pub fn local_date<Tz: TimeZone>(time: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    time.with_timezone(tz).date_naive()
}
