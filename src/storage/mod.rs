//!  Storage is organized through the [KeyValueStore] trait.
//!  The basic idea is:
//!   - Every piece of persisted state is a string value under a string key.
//!   - [file_store::FileKeyValueStore] keeps one JSON file per key inside a directory.
//!   - Values are always rewritten as a whole. There is no partial update and no coordination
//!     between processes beyond a lock held for a single read or write, so the last writer wins.

pub mod entities;
pub mod file_store;
pub mod memory_store;

use std::ops::Deref;

use anyhow::Result;
use async_trait::async_trait;

/// Interface for abstracting the durable medium. Errors returned from it are failures of the
/// medium itself (permissions, full disk) and are propagated to the caller untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value under `key`, or [None] if nothing was stored yet.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the value under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the value under `key`. Removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<T> KeyValueStore for T
where
    T: Deref + Send + Sync,
    T::Target: KeyValueStore,
{
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.deref().get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.deref().set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.deref().remove(key).await
    }
}

pub const DEFAULT_RECORDS_KEY: &str = "records";
pub const DEFAULT_ACTIVE_SESSION_KEY: &str = "active_session";

/// Names of the two entries the application keeps in a [KeyValueStore].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub records: String,
    pub active_session: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            records: DEFAULT_RECORDS_KEY.into(),
            active_session: DEFAULT_ACTIVE_SESSION_KEY.into(),
        }
    }
}
