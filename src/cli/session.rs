use anyhow::Result;
use chrono::Local;

use crate::{
    session::{format_elapsed, SessionState, SessionTracker},
    storage::{entities::Record, KeyValueStore},
};

pub async fn start<S: KeyValueStore>(
    tracker: &mut SessionTracker<S>,
    notes: Option<String>,
) -> Result<()> {
    if !tracker.start(notes.unwrap_or_default()).await? {
        println!("Timer is already {}", tracker.state());
        return Ok(());
    }
    println!("Timer started at {}", Local::now().format("%H:%M:%S"));
    Ok(())
}

pub async fn pause<S: KeyValueStore>(tracker: &mut SessionTracker<S>) -> Result<()> {
    if tracker.pause().await? {
        println!("Paused at {}", format_elapsed(tracker.elapsed_seconds()));
    } else {
        println!("Timer is {}, nothing to pause", tracker.state());
    }
    Ok(())
}

pub async fn resume<S: KeyValueStore>(tracker: &mut SessionTracker<S>) -> Result<()> {
    if tracker.resume().await? {
        println!("Resumed at {}", format_elapsed(tracker.elapsed_seconds()));
    } else {
        println!("Timer is {}, nothing to resume", tracker.state());
    }
    Ok(())
}

pub async fn stop<S: KeyValueStore>(tracker: &mut SessionTracker<S>) -> Result<()> {
    match tracker.stop().await? {
        Some(record) => println!("{}", describe_record(&record)),
        None => println!("Timer isn't running"),
    }
    Ok(())
}

pub async fn note<S: KeyValueStore>(tracker: &mut SessionTracker<S>, text: String) -> Result<()> {
    if tracker.set_notes(text).await? {
        println!("Notes updated");
    } else {
        println!("Timer isn't running, start it first");
    }
    Ok(())
}

pub fn status<S: KeyValueStore>(tracker: &SessionTracker<S>) -> Result<()> {
    println!("{}", describe_state(tracker));
    Ok(())
}

/// One line description of the timer, used by `status` and the live display.
pub fn describe_state<S: KeyValueStore>(tracker: &SessionTracker<S>) -> String {
    let state = tracker.state();
    match (state, tracker.session()) {
        (SessionState::Idle, _) | (_, None) => "Ready to start".to_string(),
        (_, Some(session)) => {
            let started = session.start_time.with_timezone(&Local);
            let mut line = format!(
                "{state} {} (started {})",
                format_elapsed(tracker.elapsed_seconds()),
                started.format("%H:%M:%S")
            );
            if !session.notes.is_empty() {
                line += &format!(" - {}", session.notes);
            }
            line
        }
    }
}

pub fn describe_record(record: &Record) -> String {
    format!("Recorded {:.2} minutes ({})", record.duration, record.id)
}
