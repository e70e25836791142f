use std::{
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    session::{SessionState, SessionTracker},
    storage::KeyValueStore,
    utils::{
        clock::{Clock, DefaultClock},
        shutdown::detect_shutdown,
    },
};

use super::{
    report::print_report,
    session::{describe_record, describe_state},
    DisplayOptions, SharedStore,
};

const TICK: Duration = Duration::from_secs(1);
/// Statistics are recomputed once a minute even if nothing changed, so that "last 7 days" and the
/// heatmap follow the clock.
const REFRESH_EVERY_TICKS: u32 = 60;
const STATE_LINE_WIDTH: usize = 60;

/// Runs the live display until `q` is typed or Ctrl-C is pressed.
pub async fn process_watch_command(
    tracker: SessionTracker<SharedStore>,
    options: DisplayOptions,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    let detector = tokio::spawn(detect_shutdown(shutdown.clone()));

    let display = LiveDisplay::new(tracker, options, Box::new(DefaultClock), shutdown);
    let result = display
        .run(BufReader::new(tokio::io::stdin()), &mut std::io::stdout())
        .await;

    detector.abort();
    result
}

/// Live timer with statistics. The timer line is redrawn every tick. Statistics are redrawn when
/// the record store reports a change and every [REFRESH_EVERY_TICKS] ticks.
///
/// The persisted session is re-read on every tick, so `ticklog stop` issued from another terminal
/// shows up here as well.
pub struct LiveDisplay<S> {
    tracker: SessionTracker<S>,
    options: DisplayOptions,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
}

impl<S: KeyValueStore> LiveDisplay<S> {
    pub fn new(
        tracker: SessionTracker<S>,
        options: DisplayOptions,
        clock: Box<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            tracker,
            options,
            clock,
            shutdown,
        }
    }

    /// Executes the display event loop.
    pub async fn run(
        mut self,
        input: impl AsyncBufRead + Unpin,
        out: &mut impl Write,
    ) -> Result<()> {
        let dirty = Arc::new(AtomicBool::new(true));
        let _subscription = {
            let dirty = dirty.clone();
            self.tracker.records().on_change(move |event| {
                debug!("Refreshing statistics after {event}");
                dirty.store(true, Ordering::Relaxed);
            })
        };

        let mut lines = input.lines();
        let mut input_open = true;
        let mut next_tick = self.clock.instant() + TICK;
        let mut ticks = 0u32;

        loop {
            if dirty.swap(false, Ordering::Relaxed) {
                writeln!(out)?;
                print_report(self.tracker.records(), self.options, out).await?;
            }
            write!(out, "\r{:<STATE_LINE_WIDTH$}", describe_state(&self.tracker))?;
            out.flush()?;

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                line = lines.next_line(), if input_open => match line? {
                    Some(line) => {
                        if !self.handle_input(line.trim(), out).await? {
                            break;
                        }
                    }
                    None => input_open = false,
                },
                _ = self.clock.sleep_until(next_tick) => {
                    next_tick += TICK;
                    ticks = ticks.wrapping_add(1);
                    if ticks % REFRESH_EVERY_TICKS == 0 {
                        dirty.store(true, Ordering::Relaxed);
                    }
                    self.tracker.reload().await?;
                }
            }
        }
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }

    /// Applies one typed command. Returns `false` when the display should quit.
    async fn handle_input(&mut self, command: &str, out: &mut impl Write) -> Result<bool> {
        let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
        let state = self.tracker.state();
        match (name, state) {
            ("", _) => {}
            ("q" | "quit", _) => return Ok(false),
            ("p" | "pause" | "resume", SessionState::Running) => {
                self.tracker.pause().await?;
            }
            ("p" | "pause" | "resume", SessionState::Paused) => {
                self.tracker.resume().await?;
            }
            ("s" | "start", SessionState::Idle) => {
                self.tracker.start("").await?;
            }
            ("s" | "stop", SessionState::Running | SessionState::Paused) => {
                if let Some(record) = self.tracker.stop().await? {
                    writeln!(out, "\n{}", describe_record(&record))?;
                }
            }
            ("n" | "note", SessionState::Running | SessionState::Paused) => {
                self.tracker.set_notes(rest.trim()).await?;
            }
            ("p" | "pause" | "resume" | "stop" | "n" | "note", SessionState::Idle) => {
                writeln!(out, "\nTimer isn't running")?;
            }
            ("start", _) => {
                writeln!(out, "\nTimer is already {state}")?;
            }
            _ => {
                writeln!(
                    out,
                    "\nUnknown command {command:?}. Use p to pause, s to start or stop, n <text> for notes, q to quit"
                )?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use tokio_util::sync::CancellationToken;

    use crate::{
        cli::DisplayOptions,
        session::{SessionState, SessionTracker},
        storage::memory_store::MemoryKeyValueStore,
        store::RecordStore,
        utils::clock::manual::ManualClock,
    };

    use super::LiveDisplay;

    const OPTIONS: DisplayOptions = DisplayOptions {
        weeks: 4,
        plain: true,
    };

    async fn tracker(
        storage: &Arc<MemoryKeyValueStore>,
        clock: &ManualClock,
    ) -> Result<SessionTracker<Arc<MemoryKeyValueStore>>> {
        SessionTracker::restore(
            RecordStore::new(storage.clone(), "records"),
            storage.clone(),
            "active_session",
            Box::new(clock.clone()),
        )
        .await
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_typed_commands() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let clock = clock();
        let display = LiveDisplay::new(
            tracker(&storage, &clock).await?,
            OPTIONS,
            Box::new(clock.clone()),
            CancellationToken::new(),
        );

        let mut out = Vec::new();
        display
            .run("s\nn evening\np\np\ns\nx\nq\n".as_bytes(), &mut out)
            .await?;
        let text = String::from_utf8(out)?;

        let records = RecordStore::new(storage.clone(), "records").list().await?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].notes.as_deref(), Some("evening"));

        assert!(text.contains("Recorded 0.00 minutes"));
        assert!(text.contains("Unknown command \"x\""));
        // Initial statistics and the refresh after stopping
        assert!(text.contains("Total         0"));
        assert!(text.contains("Total         1"));
        assert_eq!(tracker(&storage, &clock).await?.state(), SessionState::Idle);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_sees_changes_from_other_process() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let clock = clock();
        let shutdown = CancellationToken::new();
        let display = LiveDisplay::new(
            tracker(&storage, &clock).await?,
            OPTIONS,
            Box::new(clock.clone()),
            shutdown.clone(),
        );
        let mut other = tracker(&storage, &clock).await?;

        let mut out = Vec::new();
        let (result, other_result) = tokio::join!(display.run("".as_bytes(), &mut out), async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            other.start("").await?;
            tokio::time::sleep(Duration::from_millis(1000)).await;
            shutdown.cancel();
            anyhow::Ok(())
        });
        result?;
        other_result?;

        let text = String::from_utf8(out)?;
        assert!(text.contains("Ready to start"));
        assert!(text.contains("running 0m 0s"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_statistics_refresh_every_minute() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let clock = clock();
        let shutdown = CancellationToken::new();
        let display = LiveDisplay::new(
            tracker(&storage, &clock).await?,
            OPTIONS,
            Box::new(clock.clone()),
            shutdown.clone(),
        );

        let mut out = Vec::new();
        let (result, _) = tokio::join!(display.run("".as_bytes(), &mut out), async {
            tokio::time::sleep(Duration::from_millis(61_500)).await;
            shutdown.cancel();
        });
        result?;

        let text = String::from_utf8(out)?;
        assert_eq!(text.matches("Total ").count(), 2);
        Ok(())
    }
}
