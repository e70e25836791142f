use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::storage::{entities::Record, KeyValueStore};

use super::notify::{ChangeEvent, ChangeNotifier, Subscription};

/// Owns the collection of [Record]s. The whole collection lives under one key and every change
/// rewrites it completely.
///
/// Reads are lenient: a missing or unparseable value is an empty collection. Failures of the
/// storage medium are returned as errors.
#[derive(Clone)]
pub struct RecordStore<S> {
    storage: S,
    key: String,
    notifier: ChangeNotifier,
}

impl<S: KeyValueStore> RecordStore<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Returns all records in insertion order.
    pub async fn list(&self) -> Result<Vec<Record>> {
        let Some(data) = self.storage.get(&self.key).await? else {
            return Ok(vec![]);
        };
        match serde_json::from_str::<Vec<Record>>(&data) {
            Ok(records) => Ok(records),
            Err(e) => {
                // Corrupted data shouldn't make the application unusable.
                warn!("Stored records under {:?} are unreadable, treating as empty: {e}", self.key);
                Ok(vec![])
            }
        }
    }

    /// Adds `record` at the end of the collection. Ids aren't checked for uniqueness.
    #[instrument(skip_all, fields(id = %record.id))]
    pub async fn append(&self, record: Record) -> Result<()> {
        let mut records = self.list().await?;
        let id = record.id.clone();
        records.push(record);
        self.write(&records).await?;
        info!("Appended record, {} in total", records.len());
        self.notifier.notify(&ChangeEvent::Appended { id });
        Ok(())
    }

    /// Removes every record with `id`. Deleting an id that isn't stored changes nothing.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.list().await?;
        let before = records.len();
        records.retain(|record| record.id != id);
        self.write(&records).await?;
        info!("Deleted {} records", before - records.len());
        self.notifier.notify(&ChangeEvent::Deleted { id: id.to_owned() });
        Ok(())
    }

    /// Removes all records.
    pub async fn clear(&self) -> Result<()> {
        self.write(&[]).await?;
        info!("Cleared all records");
        self.notifier.notify(&ChangeEvent::Cleared);
        Ok(())
    }

    /// Serializes the whole collection as pretty printed json.
    pub async fn export_all(&self) -> Result<String> {
        let records = self.list().await?;
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Replaces the whole collection with records parsed from `text`. Returns `false` without
    /// touching the storage if `text` isn't a json array of valid records.
    #[instrument(skip_all)]
    pub async fn import_all(&self, text: &str) -> Result<bool> {
        let records = match parse_records(text) {
            Ok(records) => records,
            Err(e) => {
                warn!("Rejected import: {e}");
                return Ok(false);
            }
        };
        self.write(&records).await?;
        info!("Imported {} records", records.len());
        self.notifier.notify(&ChangeEvent::Imported {
            count: records.len(),
        });
        Ok(true)
    }

    /// Registers a callback that is called after every successful change of the collection.
    #[must_use = "dropping the subscription unregisters the callback"]
    pub fn on_change(
        &self,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.notifier.subscribe(callback)
    }

    async fn write(&self, records: &[Record]) -> Result<()> {
        let data = serde_json::to_string(records)?;
        debug!("Writing {} records under {:?}", records.len(), self.key);
        self.storage.set(&self.key, &data).await
    }
}

fn parse_records(text: &str) -> Result<Vec<Record>, serde_json::Error> {
    serde_json::from_str(text)
}
