use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone};

use crate::{
    storage::entities::Record,
    utils::time::{local_date, monday_of},
};

pub const DAYS_IN_WEEK: usize = 7;
pub const DEFAULT_WEEKS: usize = 4;

/// Maps a daily count into intensity level `0..=4` used for coloring.
pub fn contribution_level(count: u32) -> u8 {
    match count {
        0 => 0,
        1 => 1,
        2 => 2,
        3 => 3,
        _ => 4,
    }
}

/// Label to be printed next to a grid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthLabel {
    pub week: usize,
    pub month: u32,
}

/// Day-bucketed record counts of the last few calendar weeks, similar to a contribution graph.
///
/// Rows are calendar weeks starting on Monday. Row `0` is the oldest week, the last row is the
/// week containing today. Column `0` is Monday and column `6` is Sunday. A record lands in the
/// cell of its local calendar date; records outside of the grid aren't counted. Days after today
/// in the current week are part of the grid but normally stay empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionGrid {
    first_day: NaiveDate,
    counts: Vec<[u32; DAYS_IN_WEEK]>,
}

impl ContributionGrid {
    pub fn build<Tz: TimeZone>(records: &[Record], now: &DateTime<Tz>, weeks: usize) -> Self {
        let today = now.date_naive();
        let first_day = monday_of(today) - Duration::weeks(weeks.saturating_sub(1) as i64);
        let mut grid = Self {
            first_day,
            counts: vec![[0; DAYS_IN_WEEK]; weeks],
        };

        let tz = now.timezone();
        for record in records {
            if let Some((week, day)) = grid.position_of(local_date(record.start_time, &tz)) {
                grid.counts[week][day] += 1;
            }
        }
        grid
    }

    pub fn weeks(&self) -> usize {
        self.counts.len()
    }

    /// Count of a cell. Cells outside of the grid are 0.
    pub fn count(&self, week: usize, day: usize) -> u32 {
        self.counts
            .get(week)
            .and_then(|row| row.get(day))
            .copied()
            .unwrap_or(0)
    }

    pub fn level(&self, week: usize, day: usize) -> u8 {
        contribution_level(self.count(week, day))
    }

    pub fn cell_date(&self, week: usize, day: usize) -> NaiveDate {
        self.first_day + Duration::days((week * DAYS_IN_WEEK + day) as i64)
    }

    /// Cell `date` falls into, if it's within the grid.
    fn position_of(&self, date: NaiveDate) -> Option<(usize, usize)> {
        let offset = usize::try_from((date - self.first_day).num_days()).ok()?;
        let (week, day) = (offset / DAYS_IN_WEEK, offset % DAYS_IN_WEEK);
        (week < self.weeks()).then_some((week, day))
    }

    /// Month labels for rows. The first row is always labeled, other rows only when their monday
    /// is within the first week of a month.
    pub fn month_labels(&self) -> Vec<MonthLabel> {
        (0..self.weeks())
            .map(|week| (week, self.cell_date(week, 0)))
            .filter(|(week, monday)| *week == 0 || monday.day() <= 7)
            .map(|(week, monday)| MonthLabel {
                week,
                month: monday.month(),
            })
            .collect()
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().sum()
    }
}
