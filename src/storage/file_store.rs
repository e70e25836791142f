use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::fs::operations::{read_locked, remove_if_exists, write_locked};

use super::KeyValueStore;

/// The main realization of [KeyValueStore]. Every key is a `<key>.json` file in `data_dir`.
#[derive(Debug)]
pub struct FileKeyValueStore {
    data_dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&data_dir)?;

        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        let Some(bytes) = read_locked(&path)
            .await
            .with_context(|| format!("Failed to read {path:?}"))?
        else {
            return Ok(None);
        };
        // Broken bytes are not a failure of the medium. The readers above treat the lossy value as
        // unparseable content.
        let value = String::from_utf8(bytes).unwrap_or_else(|e| {
            warn!("{path:?} is not valid UTF-8: {e}");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        });
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        write_locked(&path, value)
            .await
            .with_context(|| format!("Failed to write {path:?}"))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        remove_if_exists(&path)
            .await
            .with_context(|| format!("Failed to remove {path:?}"))
    }
}
