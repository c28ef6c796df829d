use rusqlite::params;

use super::CatalogDb;
use crate::error::PersistenceError;
use crate::types::SearchHistoryEntry;

/// Keep at most this many history rows.
pub const SEARCH_HISTORY_MAX: usize = 100;

/// Rows older than this are purged regardless of count.
pub const SEARCH_HISTORY_MAX_AGE_DAYS: i64 = 180;

impl CatalogDb {
    // =========================================================================
    // Search history
    // =========================================================================

    /// Append a search and enforce the retention cap in the same pass:
    /// oldest rows beyond [`SEARCH_HISTORY_MAX`] and anything older than
    /// [`SEARCH_HISTORY_MAX_AGE_DAYS`] are purged.
    pub fn record_search(
        &self,
        query: &str,
        result_count: u32,
        category: Option<&str>,
        now_ms: i64,
    ) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT INTO search_history (query, timestamp, resultCount, category)
             VALUES (?1, ?2, ?3, ?4)",
            params![query, now_ms, result_count, category],
        )?;

        let cutoff = now_ms - SEARCH_HISTORY_MAX_AGE_DAYS * 24 * 60 * 60 * 1000;
        self.conn.execute(
            "DELETE FROM search_history WHERE timestamp < ?1",
            params![cutoff],
        )?;
        self.conn.execute(
            "DELETE FROM search_history
             WHERE id NOT IN (
                 SELECT id FROM search_history
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?1
             )",
            params![SEARCH_HISTORY_MAX as i64],
        )?;
        Ok(())
    }

    /// Newest-first history listing.
    pub fn recent_searches(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, query, timestamp, resultCount, category
             FROM search_history
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SearchHistoryEntry {
                id: row.get(0)?,
                query: row.get(1)?,
                timestamp: row.get(2)?,
                result_count: row.get::<_, i64>(3)? as u32,
                category: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Drop all history rows. The bulk-reset path.
    pub fn clear_search_history(&self) -> Result<(), PersistenceError> {
        self.conn.execute("DELETE FROM search_history", [])?;
        Ok(())
    }
}
