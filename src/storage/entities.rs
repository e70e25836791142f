use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::time::{millis_to_rounded_minutes, truncate_to_millis};

/// One completed timed event. Records are never edited after creation, only deleted as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    /// When the event was logged. Records created by the session tracker carry the moment the
    /// session was stopped.
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    /// Duration in minutes.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Record {
    /// Creates a record with a fresh id. `active` is rounded to minutes with 2 decimal places and
    /// empty notes are dropped.
    pub fn new(start_time: DateTime<Utc>, active: Duration, notes: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time: truncate_to_millis(start_time),
            duration: millis_to_rounded_minutes(active.num_milliseconds()),
            notes: notes.filter(|v| !v.is_empty()),
        }
    }
}

/// Persisted state of a timer that is running or paused and hasn't been turned into a [Record]
/// yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    #[serde(with = "millis")]
    pub start_time: DateTime<Utc>,
    /// Milliseconds spent paused before the current pause.
    #[serde(rename = "accumulatedTime")]
    pub accumulated_paused_ms: i64,
    pub is_paused: bool,
    #[serde(with = "option_millis", default)]
    pub last_pause_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

impl ActiveSession {
    pub fn started_at(start_time: DateTime<Utc>, notes: String) -> Self {
        Self {
            start_time: truncate_to_millis(start_time),
            accumulated_paused_ms: 0,
            is_paused: false,
            last_pause_time: None,
            notes,
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.is_paused = true;
        self.last_pause_time = Some(truncate_to_millis(now));
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.last_pause_time.take() {
            self.accumulated_paused_ms += (now - paused_at).num_milliseconds();
        }
        self.is_paused = false;
    }

    /// Total paused time up to `now`, including the pause in progress.
    pub fn paused_ms_at(&self, now: DateTime<Utc>) -> i64 {
        let current_pause = match (self.is_paused, self.last_pause_time) {
            (true, Some(paused_at)) => (now - paused_at).num_milliseconds(),
            _ => 0,
        };
        self.accumulated_paused_ms + current_pause
    }

    /// Time spent not paused up to `now`. Stays constant while the session is paused. Not clamped,
    /// so inconsistent persisted state can make it negative.
    pub fn active_at(&self, now: DateTime<Utc>) -> Duration {
        Duration::milliseconds((now - self.start_time).num_milliseconds() - self.paused_ms_at(now))
    }
}

/// Timestamps of records. Written as RFC 3339 with milliseconds, read either from a date string
/// or from epoch milliseconds.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserializer, Serializer};

    use super::TimestampVisitor;

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

/// Timestamps of the active session, stored as epoch milliseconds.
mod millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserializer, Serializer};

    use super::TimestampVisitor;

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(time.timestamp_millis())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

mod option_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    struct Millis(#[serde(with = "super::millis")] DateTime<Utc>);

    pub fn serialize<S>(time: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(time) => serializer.serialize_i64(time.timestamp_millis()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Millis>::deserialize(deserializer)?.map(|Millis(time)| time))
    }
}

/// Accepts RFC 3339, a date and time without offset (local time) and a bare date (UTC midnight).
fn parse_iso_date(v: &str) -> Option<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(v) {
        return Some(time.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(v, format).ok());
    if let Some(naive) = naive {
        return naive
            .and_local_timezone(Local)
            .earliest()
            .map(|time| time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

struct TimestampVisitor;

impl serde::de::Visitor<'_> for TimestampVisitor {
    type Value = DateTime<Utc>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("an ISO 8601 date or epoch milliseconds")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        parse_iso_date(v).ok_or_else(|| E::custom(format!("invalid date {v:?}")))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
        DateTime::from_timestamp_millis(v)
            .ok_or_else(|| E::custom(format!("timestamp {v} is out of range")))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(format!("timestamp {v} is out of range")))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom("timestamp is not a finite number"));
        }
        self.visit_i64(v.trunc() as i64)
    }
}
