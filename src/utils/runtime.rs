use anyhow::Result;

/// The daemon does all of its work on one thread. Collaborator calls are awaited one after
/// another, so there is nothing to gain from a thread pool.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
