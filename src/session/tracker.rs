use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    storage::{
        entities::{ActiveSession, Record},
        KeyValueStore,
    },
    store::RecordStore,
    utils::clock::Clock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Running => write!(f, "running"),
            SessionState::Paused => write!(f, "paused"),
        }
    }
}

/// Drives the timer: `Idle -> Running <-> Paused -> Idle`.
///
/// Every transition is persisted under its own key right away, so a tracker restored in another
/// process continues the same session. Stopping turns the session into a [Record] appended to the
/// [RecordStore].
pub struct SessionTracker<S> {
    records: RecordStore<S>,
    storage: S,
    key: String,
    clock: Box<dyn Clock>,
    active: Option<ActiveSession>,
}

impl<S: KeyValueStore> SessionTracker<S> {
    /// Creates a tracker and picks up a session persisted under `key`, if there is one.
    pub async fn restore(
        records: RecordStore<S>,
        storage: S,
        key: impl Into<String>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let mut tracker = Self {
            records,
            storage,
            key: key.into(),
            clock,
            active: None,
        };
        tracker.reload().await?;
        Ok(tracker)
    }

    /// Re-reads the persisted session. Picks up changes made by other processes.
    pub async fn reload(&mut self) -> Result<()> {
        self.active = match self.storage.get(&self.key).await? {
            None => None,
            Some(data) => match serde_json::from_str::<ActiveSession>(&data) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("Persisted session is unreadable, starting idle: {e}");
                    None
                }
            },
        };
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        match &self.active {
            None => SessionState::Idle,
            Some(session) if session.is_paused => SessionState::Paused,
            Some(_) => SessionState::Running,
        }
    }

    pub fn session(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    pub fn records(&self) -> &RecordStore<S> {
        &self.records
    }

    /// Starts a new session with `notes`. Does nothing and returns `false` if a session is
    /// already active.
    pub async fn start(&mut self, notes: impl Into<String>) -> Result<bool> {
        if self.active.is_some() {
            return Ok(false);
        }
        let session = ActiveSession::started_at(self.clock.time(), notes.into());
        self.persist(&session).await?;
        info!("Started session at {}", session.start_time);
        self.active = Some(session);
        Ok(true)
    }

    /// Pauses a running session.
    pub async fn pause(&mut self) -> Result<bool> {
        if self.state() != SessionState::Running {
            return Ok(false);
        }
        self.update(|session, now| session.pause(now)).await?;
        info!("Paused session");
        Ok(true)
    }

    /// Resumes a paused session.
    pub async fn resume(&mut self) -> Result<bool> {
        if self.state() != SessionState::Paused {
            return Ok(false);
        }
        self.update(|session, now| session.resume(now)).await?;
        info!("Resumed session");
        Ok(true)
    }

    /// Replaces notes of the active session.
    pub async fn set_notes(&mut self, notes: impl Into<String>) -> Result<bool> {
        if self.active.is_none() {
            return Ok(false);
        }
        let notes = notes.into();
        self.update(move |session, _| session.notes = notes).await?;
        Ok(true)
    }

    /// Ends the active session and stores it as a record. The record is stamped with the stop
    /// time. Returns [None] if there was nothing to stop.
    pub async fn stop(&mut self) -> Result<Option<Record>> {
        let Some(session) = self.active.as_ref() else {
            return Ok(None);
        };
        let now = self.clock.time();
        let record = Record::new(now, session.active_at(now), Some(session.notes.clone()));
        if record.duration < 0. {
            warn!("Session ended with negative duration {}", record.duration);
        }

        // The session goes first so a repeated stop can't record it twice. It is put back when
        // the record couldn't be stored.
        self.storage.remove(&self.key).await?;
        if let Err(e) = self.records.append(record.clone()).await {
            warn!("Failed to store the record, keeping the session active");
            self.persist(session).await?;
            return Err(e);
        }
        self.active = None;
        info!("Stopped session, recorded {} minutes", record.duration);
        Ok(Some(record))
    }

    /// Whole seconds the timer has been running, excluding pauses. Frozen while paused and `0`
    /// when idle.
    pub fn elapsed_seconds(&self) -> i64 {
        match &self.active {
            None => 0,
            Some(session) => session
                .active_at(self.clock.time())
                .num_milliseconds()
                .div_euclid(1000),
        }
    }

    async fn update(
        &mut self,
        change: impl FnOnce(&mut ActiveSession, DateTime<Utc>),
    ) -> Result<()> {
        let Some(mut session) = self.active.clone() else {
            return Ok(());
        };
        change(&mut session, self.clock.time());
        self.persist(&session).await?;
        self.active = Some(session);
        Ok(())
    }

    async fn persist(&self, session: &ActiveSession) -> Result<()> {
        let data = serde_json::to_string(session)?;
        self.storage.set(&self.key, &data).await
    }
}

/// Formats seconds of a timer for display, e.g. `12m 5s`.
pub fn format_elapsed(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.abs();
    format!("{sign}{}m {}s", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        storage::{
            file_store::FileKeyValueStore, memory_store::MemoryKeyValueStore, KeyValueStore,
            MockKeyValueStore, StorageKeys,
        },
        store::RecordStore,
        utils::{clock::manual::ManualClock, logging::TEST_LOGGING},
    };

    use super::{format_elapsed, SessionState, SessionTracker};

    fn test_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, 21, 0, 0).unwrap()
    }

    async fn tracker_with<S: KeyValueStore + Clone>(
        storage: S,
        clock: &ManualClock,
    ) -> Result<SessionTracker<S>> {
        let keys = StorageKeys::default();
        let records = RecordStore::new(storage.clone(), keys.records);
        SessionTracker::restore(records, storage, keys.active_session, Box::new(clock.clone())).await
    }

    #[tokio::test]
    async fn test_start_stop_immediately() -> Result<()> {
        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(Arc::new(MemoryKeyValueStore::new()), &clock).await?;

        assert_eq!(tracker.state(), SessionState::Idle);
        assert!(tracker.start("").await?);
        assert_eq!(tracker.state(), SessionState::Running);

        let record = tracker.stop().await?.expect("session was active");
        assert_eq!(record.duration, 0.);
        assert_eq!(record.notes, None);
        assert_eq!(tracker.state(), SessionState::Idle);
        assert_eq!(tracker.records().list().await?, vec![record]);
        Ok(())
    }

    #[tokio::test]
    async fn test_start_stop_real_clock() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let records = RecordStore::new(storage.clone(), "records");
        let mut tracker = SessionTracker::restore(
            records,
            storage,
            "active_session",
            Box::new(crate::utils::clock::DefaultClock),
        )
        .await?;

        tracker.start("").await?;
        let record = tracker.stop().await?.expect("session was active");
        assert!(record.duration >= 0.);
        assert!(record.duration < 0.05);
        Ok(())
    }

    #[tokio::test]
    async fn test_pause_is_excluded() -> Result<()> {
        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(Arc::new(MemoryKeyValueStore::new()), &clock).await?;

        tracker.start("").await?;
        clock.advance(Duration::minutes(2));
        assert!(tracker.pause().await?);
        assert_eq!(tracker.state(), SessionState::Paused);

        clock.advance(Duration::minutes(10));
        assert_eq!(tracker.elapsed_seconds(), 120);
        assert!(tracker.resume().await?);

        clock.advance(Duration::seconds(30));
        assert_eq!(tracker.elapsed_seconds(), 150);

        let record = tracker.stop().await?.expect("session was active");
        assert_eq!(record.duration, 2.5);
        assert_eq!(record.start_time, test_start() + Duration::seconds(12 * 60 + 30));
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_while_paused() -> Result<()> {
        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(Arc::new(MemoryKeyValueStore::new()), &clock).await?;

        tracker.start("").await?;
        clock.advance(Duration::minutes(3));
        tracker.pause().await?;
        clock.advance(Duration::minutes(5));

        let record = tracker.stop().await?.expect("session was active");
        assert_eq!(record.duration, 3.);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_transitions_are_noops() -> Result<()> {
        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(Arc::new(MemoryKeyValueStore::new()), &clock).await?;

        assert!(!tracker.pause().await?);
        assert!(!tracker.resume().await?);
        assert!(!tracker.set_notes("note").await?);
        assert_eq!(tracker.stop().await?, None);
        assert_eq!(tracker.elapsed_seconds(), 0);

        tracker.start("").await?;
        clock.advance(Duration::seconds(5));
        assert!(!tracker.start("").await?);
        assert!(!tracker.resume().await?);
        assert_eq!(tracker.elapsed_seconds(), 5);

        tracker.pause().await?;
        assert!(!tracker.pause().await?);
        assert!(tracker.records().list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_notes_are_kept() -> Result<()> {
        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(Arc::new(MemoryKeyValueStore::new()), &clock).await?;

        tracker.start("").await?;
        assert!(tracker.set_notes("first").await?);
        assert!(tracker.set_notes("second").await?);
        assert_eq!(tracker.session().map(|s| s.notes.as_str()), Some("second"));

        let record = tracker.stop().await?.expect("session was active");
        assert_eq!(record.notes.as_deref(), Some("second"));
        Ok(())
    }

    #[tokio::test]
    async fn test_start_with_notes_writes_once() -> Result<()> {
        let mut storage = MockKeyValueStore::new();
        storage.expect_get().returning(|_| Ok(None));
        storage
            .expect_set()
            .withf(|key, value| {
                key == "active_session" && value.contains("\"notes\":\"morning\"")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(Arc::new(storage), &clock).await?;
        assert!(tracker.start("morning").await?);
        assert_eq!(tracker.session().map(|s| s.notes.as_str()), Some("morning"));
        Ok(())
    }

    #[tokio::test]
    async fn test_session_survives_restart() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(test_start());
        {
            let storage = Arc::new(FileKeyValueStore::new(dir.path().to_owned())?);
            let mut tracker = tracker_with(storage, &clock).await?;
            tracker.start("").await?;
            tracker.set_notes("persisted").await?;
            clock.advance(Duration::minutes(1));
            tracker.pause().await?;
        }

        clock.advance(Duration::minutes(1));
        let storage = Arc::new(FileKeyValueStore::new(dir.path().to_owned())?);
        let mut tracker = tracker_with(storage.clone(), &clock).await?;
        assert_eq!(tracker.state(), SessionState::Paused);
        assert_eq!(tracker.elapsed_seconds(), 60);

        tracker.resume().await?;
        clock.advance(Duration::minutes(1));
        let record = tracker.stop().await?.expect("session was restored");
        assert_eq!(record.duration, 2.);
        assert_eq!(record.notes.as_deref(), Some("persisted"));

        // Persisted session is gone after stopping
        assert_eq!(storage.get("active_session").await?, None);
        let tracker = tracker_with(storage, &clock).await?;
        assert_eq!(tracker.state(), SessionState::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_reload_sees_other_tracker() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let clock = ManualClock::new(test_start());
        let mut first = tracker_with(storage.clone(), &clock).await?;
        let mut second = tracker_with(storage.clone(), &clock).await?;

        first.start("").await?;
        assert_eq!(second.state(), SessionState::Idle);
        second.reload().await?;
        assert_eq!(second.state(), SessionState::Running);

        second.stop().await?;
        first.reload().await?;
        assert_eq!(first.state(), SessionState::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupted_session_is_idle() -> Result<()> {
        *TEST_LOGGING;
        let storage = Arc::new(MemoryKeyValueStore::new());
        storage.set("active_session", "{\"startTime\": ").await?;
        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(storage, &clock).await?;
        assert_eq!(tracker.state(), SessionState::Idle);
        assert!(tracker.start("").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_utf8_files_read_as_empty() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        std::fs::write(dir.path().join("records.json"), [0xff, 0xfe, 0x00])?;
        std::fs::write(dir.path().join("active_session.json"), [0xff, 0xfe, 0x00])?;

        let storage = Arc::new(FileKeyValueStore::new(dir.path().to_owned())?);
        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(storage, &clock).await?;
        assert_eq!(tracker.state(), SessionState::Idle);
        assert!(tracker.records().list().await?.is_empty());

        // Both files are usable again after the next write
        tracker.start("").await?;
        clock.advance(Duration::minutes(1));
        tracker.stop().await?;
        assert_eq!(tracker.records().list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_negative_duration_is_not_clamped() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let data = serde_json::json!({
            "startTime": test_start().timestamp_millis(),
            "accumulatedTime": 120_000,
            "isPaused": false,
            "lastPauseTime": null,
            "notes": "",
        });
        storage.set("active_session", &data.to_string()).await?;

        let clock = ManualClock::new(test_start() + Duration::minutes(1));
        let mut tracker = tracker_with(storage, &clock).await?;
        let record = tracker.stop().await?.expect("session was restored");
        assert_eq!(record.duration, -1.);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_start_stays_idle() -> Result<()> {
        let mut storage = MockKeyValueStore::new();
        storage.expect_get().returning(|_| Ok(None));
        storage
            .expect_set()
            .returning(|_, _| Err(anyhow!("medium unavailable")));
        let storage = Arc::new(storage);

        let clock = ManualClock::new(test_start());
        let mut tracker = tracker_with(storage, &clock).await?;
        assert!(tracker.start("").await.is_err());
        assert_eq!(tracker.state(), SessionState::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_stop_keeps_session() -> Result<()> {
        let memory = Arc::new(MemoryKeyValueStore::new());
        let clock = ManualClock::new(test_start());
        tracker_with(memory.clone(), &clock).await?.start("").await?;
        let session = Arc::new(Mutex::new(memory.get("active_session").await?));

        let mut storage = MockKeyValueStore::new();
        let read = session.clone();
        storage.expect_get().returning(move |key| match key {
            "active_session" => Ok(read.lock().unwrap().clone()),
            _ => Ok(None),
        });
        let removed = session.clone();
        storage.expect_remove().times(1).returning(move |_| {
            *removed.lock().unwrap() = None;
            Ok(())
        });
        let written = session.clone();
        storage.expect_set().returning(move |key, value| match key {
            "active_session" => {
                *written.lock().unwrap() = Some(value.to_owned());
                Ok(())
            }
            _ => Err(anyhow!("medium unavailable")),
        });

        let mut tracker = tracker_with(Arc::new(storage), &clock).await?;
        assert_eq!(tracker.state(), SessionState::Running);
        assert!(tracker.stop().await.is_err());
        assert_eq!(tracker.state(), SessionState::Running);

        // The session is persisted again, so stopping later records it once
        assert_eq!(*session.lock().unwrap(), memory.get("active_session").await?);
        Ok(())
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0m 0s");
        assert_eq!(format_elapsed(59), "0m 59s");
        assert_eq!(format_elapsed(61), "1m 1s");
        assert_eq!(format_elapsed(3600), "60m 0s");
        assert_eq!(format_elapsed(-5), "-0m 5s");
    }
}
