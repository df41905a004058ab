//! SQLite-backed [`ResultCache`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use wfgate_types::ArgumentSet;
use wfgate_util::{argument_digest, canonical_arguments, canonical_arguments_string};

use crate::clock::{Clock, SystemClock, duration_millis};
use crate::{CacheError, ResultCache};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS tool_result_cache (
     tool_name TEXT NOT NULL,
     argument_hash TEXT NOT NULL,
     canonical_arguments TEXT NOT NULL,
     result TEXT NOT NULL,
     created_at INTEGER NOT NULL,
     PRIMARY KEY (tool_name, argument_hash)
 );
 CREATE INDEX IF NOT EXISTS idx_tool_result_cache_created ON tool_result_cache(created_at);";

/// Result cache stored in a single SQLite table.
///
/// The connection sits behind a `Mutex` because rusqlite's `Connection` is not `Sync`; every
/// operation takes the lock once, so rows are always written whole.
#[derive(Debug)]
pub struct SqliteResultCache {
    conn: Mutex<Connection>,
    path: PathBuf,
    ttl_millis: i64,
    max_cache_size: u64,
    clock: Arc<dyn Clock>,
}

/// Key of one cache row.
struct EntryKey {
    tool_name: String,
    argument_hash: String,
}

impl SqliteResultCache {
    /// Opens (or creates) the database at `path`, creating parent directories as needed.
    pub fn open(path: &Path, ttl: Duration, max_cache_size: u64) -> Result<Self, CacheError> {
        Self::open_with_clock(path, ttl, max_cache_size, Arc::new(SystemClock))
    }

    pub fn open_with_clock(path: &Path, ttl: Duration, max_cache_size: u64, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), "opened result cache database");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            ttl_millis: duration_millis(ttl),
            max_cache_size,
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored rows, expired or not.
    pub fn len(&self) -> Result<u64, CacheError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tool_result_cache", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    fn is_expired(&self, created_at: i64, now: i64) -> bool {
        now.saturating_sub(created_at) > self.ttl_millis
    }

    fn evict_oldest(&self, conn: &Connection) -> Result<u64, CacheError> {
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(result AS BLOB))), 0) FROM tool_result_cache",
            [],
            |row| row.get(0),
        )?;
        let mut excess = total.saturating_sub(i64::try_from(self.max_cache_size).unwrap_or(i64::MAX));
        if excess <= 0 {
            return Ok(0);
        }

        let mut victims = Vec::new();
        {
            let mut statement = conn.prepare(
                "SELECT tool_name, argument_hash, LENGTH(CAST(result AS BLOB)) FROM tool_result_cache ORDER BY created_at ASC",
            )?;
            let mut rows = statement.query([])?;
            while excess > 0
                && let Some(row) = rows.next()?
            {
                let size: i64 = row.get(2)?;
                victims.push(EntryKey {
                    tool_name: row.get(0)?,
                    argument_hash: row.get(1)?,
                });
                excess -= size;
            }
        }

        let mut removed = 0;
        for victim in &victims {
            removed += conn.execute(
                "DELETE FROM tool_result_cache WHERE tool_name = ?1 AND argument_hash = ?2",
                params![victim.tool_name, victim.argument_hash],
            )? as u64;
        }
        Ok(removed)
    }
}

impl ResultCache for SqliteResultCache {
    fn get(&self, tool_name: &str, args: &ArgumentSet) -> Result<Option<String>, CacheError> {
        let argument_hash = argument_digest(&canonical_arguments(args));
        let conn = self.lock()?;
        let entry: Option<(String, i64)> = conn
            .query_row(
                "SELECT result, created_at FROM tool_result_cache WHERE tool_name = ?1 AND argument_hash = ?2",
                params![tool_name, argument_hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((result, created_at)) = entry else {
            return Ok(None);
        };
        if self.is_expired(created_at, self.clock.now_millis()) {
            conn.execute(
                "DELETE FROM tool_result_cache WHERE tool_name = ?1 AND argument_hash = ?2 AND created_at = ?3",
                params![tool_name, argument_hash, created_at],
            )?;
            debug!(tool = tool_name, "expired cache entry removed on read");
            return Ok(None);
        }
        Ok(Some(result))
    }

    fn set(&self, tool_name: &str, args: &ArgumentSet, result: &str) -> Result<(), CacheError> {
        let canonical = canonical_arguments_string(args);
        let argument_hash = argument_digest(canonical.as_bytes());
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO tool_result_cache (tool_name, argument_hash, canonical_arguments, result, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![tool_name, argument_hash, canonical, result, self.clock.now_millis()],
        )?;
        Ok(())
    }

    fn clear(&self, tool_name: &str) -> Result<u64, CacheError> {
        let conn = self.lock()?;
        let removed = if tool_name.is_empty() {
            conn.execute("DELETE FROM tool_result_cache", [])?
        } else {
            conn.execute("DELETE FROM tool_result_cache WHERE tool_name = ?1", params![tool_name])?
        };
        Ok(removed as u64)
    }

    fn purge_expired(&self) -> Result<u64, CacheError> {
        let cutoff = self.clock.now_millis().saturating_sub(self.ttl_millis);
        let conn = self.lock()?;
        let mut removed = conn.execute("DELETE FROM tool_result_cache WHERE created_at < ?1", params![cutoff])? as u64;
        if self.max_cache_size > 0 {
            removed += self.evict_oldest(&conn)?;
        }
        Ok(removed)
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
