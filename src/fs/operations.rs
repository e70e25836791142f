use std::{io::ErrorKind, path::Path};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

/// Reads the raw bytes of the file under a shared lock. A missing file is reported as [None]
/// instead of an error, since for the stores it simply means nothing was written yet. Decoding is
/// left to the caller.
pub async fn read_locked(path: &Path) -> Result<Option<Vec<u8>>, std::io::Error> {
    async fn read(path: &Path) -> Result<Vec<u8>, std::io::Error> {
        debug!("Reading {path:?}");
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut content = Vec::new();
        let result = file.read_to_end(&mut content).await;
        file.unlock_async().await?;
        result.map(|_| content)
    }

    match read(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces the content of the file under an exclusive lock. The whole value is rewritten, there
/// is no appending.
pub async fn write_locked(path: &Path, content: &str) -> Result<(), std::io::Error> {
    debug!("Writing {} bytes into {path:?}", content.len());
    let mut file = File::options()
        .write(true)
        .create(true)
        .read(true)
        .truncate(false)
        .open(path)
        .await?;

    // Truncation happens only after the lock is taken, otherwise a reader could observe an empty
    // file.
    file.lock_exclusive()?;
    let result = overwrite(&mut file, content).await;
    file.unlock_async().await?;
    result
}

async fn overwrite(file: &mut File, content: &str) -> Result<(), std::io::Error> {
    file.set_len(0).await?;
    file.rewind().await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await
}

/// Removes the file. Removing a file that doesn't exist is not an error.
pub async fn remove_if_exists(path: &Path) -> Result<(), std::io::Error> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
