use std::io::Write;

use ansi_term::Colour;
use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};

use crate::{
    stats::{ContributionGrid, Statistics, DAYS_IN_WEEK},
    storage::{entities::Record, KeyValueStore},
    store::RecordStore,
};

use super::DisplayOptions;

const WEEKDAY_HEADER: [&str; DAYS_IN_WEEK] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];
const LABEL_WIDTH: usize = 6;
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Reads all records and prints statistics with the heatmap.
pub async fn print_report<S: KeyValueStore>(
    records: &RecordStore<S>,
    options: DisplayOptions,
    out: &mut impl Write,
) -> Result<()> {
    let records = records.list().await?;
    write_report(&records, &Local::now(), options, out)
}

pub fn write_report<Tz: TimeZone>(
    records: &[Record],
    now: &DateTime<Tz>,
    options: DisplayOptions,
    out: &mut impl Write,
) -> Result<()> {
    let stats = Statistics::compute(records, now.clone());
    let grid = ContributionGrid::build(records, now, options.weeks);

    write_statistics(&stats, out)?;
    writeln!(out)?;
    write_grid(&grid, now, !options.plain, out)?;
    out.flush()?;
    Ok(())
}

fn write_statistics(stats: &Statistics, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{:<14}{}", "Total", stats.total_count)?;
    writeln!(out, "{:<14}{:.2} min", "Average", stats.average_duration_minutes)?;
    writeln!(out, "{:<14}{:.2} min", "Longest", stats.max_duration_minutes)?;
    writeln!(out, "{:<14}{}", "Last 7 days", stats.count_last_7_days)?;
    writeln!(out, "{:<14}{}", "This month", stats.count_current_month)?;
    writeln!(out, "{:<14}{}", "This year", stats.count_current_year)?;
    Ok(())
}

fn write_grid<Tz: TimeZone>(
    grid: &ContributionGrid,
    now: &DateTime<Tz>,
    color: bool,
    out: &mut impl Write,
) -> Result<()> {
    let today = now.date_naive();
    let labels = grid.month_labels();

    writeln!(out, "{:LABEL_WIDTH$}{}", "", WEEKDAY_HEADER.join(" "))?;
    for week in 0..grid.weeks() {
        let label = labels
            .iter()
            .find(|label| label.week == week)
            .and_then(|label| MONTH_NAMES.get(label.month as usize - 1))
            .copied()
            .unwrap_or_default();

        let cells = (0..DAYS_IN_WEEK)
            .map(|day| {
                if grid.cell_date(week, day) > today {
                    "   ".to_string()
                } else {
                    format!("{}  ", render_cell(grid.level(week, day), color))
                }
            })
            .collect::<String>();
        writeln!(out, "{label:LABEL_WIDTH$}{}", cells.trim_end())?;
    }
    writeln!(
        out,
        "{:LABEL_WIDTH$}{} in the last {} weeks",
        "",
        grid.total(),
        grid.weeks()
    )?;
    Ok(())
}

fn render_cell(level: u8, color: bool) -> String {
    if !color {
        return level.to_string();
    }
    match level {
        0 => Colour::Fixed(240).paint("·").to_string(),
        1 => Colour::Fixed(22).paint("■").to_string(),
        2 => Colour::Fixed(28).paint("■").to_string(),
        3 => Colour::Fixed(34).paint("■").to_string(),
        _ => Colour::Fixed(40).paint("■").to_string(),
    }
}
