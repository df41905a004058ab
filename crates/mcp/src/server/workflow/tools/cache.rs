//! `ClearCache` tool and the bridge from async handlers to the blocking cache store.

use std::sync::Arc;

use tracing::info;
use wfgate_cache::{CacheError, ResultCache};

use crate::server::schemas::ClearCacheRequest;

/// Runs `operation` against `cache` on the blocking thread pool.
///
/// Store calls do synchronous SQLite I/O and may wait on the database lock, so async handlers
/// never call them inline.
pub async fn with_cache<T, F>(cache: &Arc<dyn ResultCache>, operation: F) -> Result<T, CacheError>
where
    T: Send + 'static,
    F: FnOnce(&dyn ResultCache) -> Result<T, CacheError> + Send + 'static,
{
    let cache = Arc::clone(cache);
    tokio::task::spawn_blocking(move || operation(cache.as_ref()))
        .await
        .map_err(|error| CacheError::Task(error.to_string()))?
}

/// Clears cached results for one workflow, or for all workflows when no name is given.
pub async fn clear_cache(cache: &Arc<dyn ResultCache>, request: &ClearCacheRequest) -> Result<u64, CacheError> {
    let workflow_name = request.workflow_name.as_deref().map(str::trim).unwrap_or_default().to_string();
    let cleared = {
        let workflow_name = workflow_name.clone();
        with_cache(cache, move |cache| cache.clear(&workflow_name)).await?
    };
    if workflow_name.is_empty() {
        info!(entries = cleared, "cleared all cached workflow results");
    } else {
        info!(workflow = %workflow_name, entries = cleared, "cleared cached workflow results");
    }
    Ok(cleared)
}
