use anyhow::Result;

/// Every command runs on a single thread. Nothing in the application needs more than that.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
