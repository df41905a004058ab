//! Result cache for workflow tool invocations.
//!
//! Entries are keyed by tool name and the SHA-256 of the canonical argument bytes, and expire
//! lazily: a read that finds an entry older than the TTL deletes it and reports a miss. Whether
//! caching is enabled is decided once, by [`open_result_cache`] choosing between the SQLite store
//! and a store that does nothing.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;
use wfgate_types::ArgumentSet;

pub mod clock;
pub mod disabled;
pub mod sqlite;

pub use clock::{Clock, ManualClock, SystemClock};
pub use disabled::DisabledResultCache;
pub use sqlite::SqliteResultCache;

/// Errors surfaced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache lock poisoned")]
    Poisoned,
    #[error("cache task failed: {0}")]
    Task(String),
}

/// Memoised tool results.
///
/// Implementations must tolerate concurrent calls from many in-flight invocations and always write
/// entries whole.
pub trait ResultCache: Send + Sync + fmt::Debug {
    /// Returns the stored result for `(tool_name, args)` unless it is missing or expired.
    fn get(&self, tool_name: &str, args: &ArgumentSet) -> Result<Option<String>, CacheError>;

    /// Stores `result`, replacing any previous entry for the same key.
    fn set(&self, tool_name: &str, args: &ArgumentSet, result: &str) -> Result<(), CacheError>;

    /// Removes entries for `tool_name`, or every entry when it is empty. Returns how many were removed.
    fn clear(&self, tool_name: &str) -> Result<u64, CacheError>;

    /// Removes expired entries and enforces the size bound. Never required for correctness.
    fn purge_expired(&self) -> Result<u64, CacheError>;

    fn is_enabled(&self) -> bool;
}

/// Cache configuration resolved from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub database_path: PathBuf,
    pub ttl: Duration,
    /// Upper bound on the summed size of stored results in bytes; 0 means unbounded.
    pub max_cache_size: u64,
    pub cleanup_interval: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            database_path: PathBuf::new(),
            ttl: Duration::ZERO,
            max_cache_size: 0,
            cleanup_interval: None,
        }
    }
}

/// Opens the cache described by `settings`.
pub fn open_result_cache(settings: &CacheSettings) -> Result<Arc<dyn ResultCache>, CacheError> {
    if !settings.enabled {
        info!("result cache disabled");
        return Ok(Arc::new(DisabledResultCache));
    }
    let cache = SqliteResultCache::open(&settings.database_path, settings.ttl, settings.max_cache_size)?;
    info!(path = %settings.database_path.display(), ttl = ?settings.ttl, "result cache enabled");
    Ok(Arc::new(cache))
}
