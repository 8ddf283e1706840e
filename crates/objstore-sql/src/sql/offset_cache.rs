//! Per-query cache of generated SQL, keyed by row offset.
//!
//! Entry `n` holds SQL whose first row is row `n` of the full result: the
//! entry at offset 0 is the plain query, entries above 0 carry an extra seek
//! predicate on the first ORDER BY expression. A request for rows from
//! `start` is served from the greatest cached offset not above `start`, with
//! only the remainder skipped by `OFFSET`.
//!
//! Every entry was compiled for one [`CacheKey`]. A request made for another
//! platform or model discards the entries before compiling afresh.
//!
//! Lookups and inserts for one query happen under that query's lock, so the
//! lock is held while SQL for a missing entry is compiled.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use objstore_core::ObjectStoreResult;

use crate::metadata::ModelId;
use crate::platform::Platform;

/// The platform and model cached SQL was compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CacheKey {
    pub(crate) platform: Platform,
    pub(crate) model: ModelId,
}

struct Entries {
    key: Option<CacheKey>,
    sql: BTreeMap<usize, String>,
}

/// The offset-to-SQL map owned by a [`Query`](crate::query::Query).
pub struct OffsetCache {
    entries: Mutex<Entries>,
}

impl OffsetCache {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                key: None,
                sql: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the entries, dropping them first if they were compiled for
    /// anything other than `key`.
    fn lock_for(&self, key: CacheKey) -> MutexGuard<'_, Entries> {
        let mut entries = self.lock();
        if entries.key != Some(key) {
            if !entries.sql.is_empty() {
                tracing::debug!(
                    "Discarding {} cached offsets compiled for {:?}",
                    entries.sql.len(),
                    entries.key
                );
                entries.sql.clear();
            }
            entries.key = Some(key);
        }
        entries
    }

    pub(crate) fn clear(&mut self) {
        let entries = self.entries.get_mut().unwrap_or_else(PoisonError::into_inner);
        entries.key = None;
        entries.sql.clear();
    }

    pub(crate) fn offsets(&self) -> Vec<usize> {
        self.lock().sql.keys().copied().collect()
    }

    /// Returns SQL for the rows `start..start + limit`.
    ///
    /// If nothing is cached for `key` at or below `start`, `compile` produces
    /// the plain query, which is cached at offset 0.
    pub(crate) fn paginate<F>(
        &self,
        key: CacheKey,
        start: usize,
        limit: Option<usize>,
        compile: F,
    ) -> ObjectStoreResult<String>
    where
        F: FnOnce() -> ObjectStoreResult<String>,
    {
        let mut entries = self.lock_for(key);
        if let Some((&offset, sql)) = entries.sql.range(..=start).next_back() {
            tracing::debug!("Serving offset {start} from cache entry at offset {offset}");
            return Ok(paginated(sql, limit, start - offset));
        }
        let sql = compile()?;
        let result = paginated(&sql, limit, start);
        entries.sql.insert(0, sql);
        Ok(result)
    }

    /// Caches the SQL `compile` produces at offset `start`, unless an entry
    /// for `key` already exists no more than `tolerance` rows below it.
    ///
    /// Offset 0 is reserved for the plain query, so registering it does
    /// nothing. Returns whether an entry was added.
    pub(crate) fn register<F>(
        &self,
        key: CacheKey,
        start: usize,
        tolerance: usize,
        compile: F,
    ) -> ObjectStoreResult<bool>
    where
        F: FnOnce() -> ObjectStoreResult<String>,
    {
        if start == 0 {
            tracing::debug!("Not registering offset 0");
            return Ok(false);
        }
        let mut entries = self.lock_for(key);
        if let Some(&offset) = entries.sql.range(..=start).next_back().map(|(offset, _)| offset) {
            if start - offset <= tolerance {
                tracing::debug!("Offset {start} is within {tolerance} rows of cached offset {offset}");
                return Ok(false);
            }
        }
        let sql = compile()?;
        tracing::info!("Created cache entry for offset {start}, sql = {sql}");
        entries.sql.insert(start, sql);
        Ok(true)
    }
}

impl fmt::Debug for OffsetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffsetCache")
            .field("offsets", &self.offsets())
            .finish()
    }
}

/// Appends `LIMIT` and `OFFSET`, each omitted when unbounded or zero.
fn paginated(sql: &str, limit: Option<usize>, offset: usize) -> String {
    let mut result = sql.to_string();
    if let Some(limit) = limit {
        result.push_str(&format!(" LIMIT {limit}"));
    }
    if offset > 0 {
        result.push_str(&format!(" OFFSET {offset}"));
    }
    result
}
