use std::{
    fmt::Display,
    io::{BufRead, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::info;

use crate::{
    storage::{entities::Record, KeyValueStore},
    store::RecordStore,
};

use super::Args;

pub const DEFAULT_EXPORT_FILE: &str = "ticklog_records.json";
const STDOUT_PATH: &str = "-";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(
        long,
        short,
        help = "Only show records since this moment. Examples are \"yesterday\", \"2 days ago\", \"15/03/2025\""
    )]
    since: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

/// Prints records, newest first.
pub async fn process_history_command<S: KeyValueStore>(
    records: &RecordStore<S>,
    HistoryCommand { since, date_style }: HistoryCommand,
) -> Result<()> {
    let since = match since {
        Some(since) => Some(parse_since(&since, Local::now(), date_style)?),
        None => None,
    };
    let records = records.list().await?;
    write_history(&records, since, &Local, &mut std::io::stdout())
}

fn parse_since(value: &str, now: DateTime<Local>, date_style: DateStyle) -> Result<DateTime<Utc>> {
    match parse_date_string(value, now, date_style.into()) {
        Ok(v) => Ok(v.with_timezone(&Utc)),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate since date {e}"),
            )
            .into()),
    }
}

fn write_history<Tz: TimeZone>(
    records: &[Record],
    since: Option<DateTime<Utc>>,
    tz: &Tz,
    out: &mut impl Write,
) -> Result<()>
where
    Tz::Offset: Display,
{
    let mut shown = 0;
    for record in records
        .iter()
        .rev()
        .filter(|record| since.map_or(true, |since| record.start_time >= since))
    {
        shown += 1;
        writeln!(
            out,
            "{}\t{:.2} min\t{}\t{}",
            record.start_time.with_timezone(tz).format("%Y-%m-%d %H:%M:%S"),
            record.duration,
            record.id,
            record.notes.as_deref().unwrap_or("")
        )?;
    }
    if shown == 0 {
        writeln!(out, "No records yet")?;
    }
    Ok(())
}

pub async fn delete<S: KeyValueStore>(records: &RecordStore<S>, id: &str) -> Result<()> {
    let exists = records.list().await?.iter().any(|record| record.id == id);
    records.delete(id).await?;
    if exists {
        println!("Deleted {id}");
    } else {
        println!("No record with id {id}");
    }
    Ok(())
}

pub async fn clear<S: KeyValueStore>(records: &RecordStore<S>, yes: bool) -> Result<()> {
    let count = records.list().await?.len();
    if !yes {
        let stdin = std::io::stdin();
        if !confirm(count, &mut stdin.lock(), &mut std::io::stdout())? {
            println!("Nothing was deleted");
            return Ok(());
        }
    }
    records.clear().await?;
    println!("Deleted {count} records");
    Ok(())
}

fn confirm(count: usize, input: &mut impl BufRead, out: &mut impl Write) -> Result<bool> {
    write!(out, "Delete all {count} records? This can't be undone [y/N] ")?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

pub async fn export<S: KeyValueStore>(records: &RecordStore<S>, output: &Path) -> Result<()> {
    let data = records.export_all().await?;
    if output == Path::new(STDOUT_PATH) {
        println!("{data}");
        return Ok(());
    }
    tokio::fs::write(output, data)
        .await
        .with_context(|| format!("Failed to write {output:?}"))?;
    info!("Exported records into {output:?}");
    println!("Exported records into {}", output.display());
    Ok(())
}

pub async fn import<S: KeyValueStore>(records: &RecordStore<S>, file: &Path) -> Result<()> {
    let data = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {file:?}"))?;
    if !records.import_all(&data).await? {
        bail!("Import failed: invalid format");
    }
    println!("Imported {} records", records.list().await?.len());
    Ok(())
}
