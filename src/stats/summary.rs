use chrono::{DateTime, Duration, TimeZone, Utc};
use now::DateTimeNow;

use crate::storage::entities::Record;

/// Summary numbers shown above the heatmap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statistics {
    pub total_count: usize,
    pub average_duration_minutes: f64,
    pub max_duration_minutes: f64,
    pub count_last_7_days: usize,
    /// Records since the first day of the current month, local time.
    pub count_current_month: usize,
    /// Records since January 1st of the current year, local time.
    pub count_current_year: usize,
}

impl Statistics {
    pub fn compute<Tz: TimeZone>(records: &[Record], now: DateTime<Tz>) -> Self {
        let week_ago = now.with_timezone(&Utc) - Duration::days(7);
        let month_start = now.clone().beginning_of_month().with_timezone(&Utc);
        let year_start = now.beginning_of_year().with_timezone(&Utc);

        let count_since =
            |since: DateTime<Utc>| records.iter().filter(|r| r.start_time >= since).count();

        let total_count = records.len();
        let total_duration: f64 = records.iter().map(|r| r.duration).sum();
        let max_duration_minutes = records
            .iter()
            .map(|r| r.duration)
            .reduce(f64::max)
            .unwrap_or(0.);

        Self {
            total_count,
            average_duration_minutes: if total_count > 0 {
                total_duration / total_count as f64
            } else {
                0.
            },
            max_duration_minutes,
            count_last_7_days: count_since(week_ago),
            count_current_month: count_since(month_start),
            count_current_year: count_since(year_start),
        }
    }
}
