//! SQLite-backed persisted half of the catalog.
//!
//! The database lives at `~/.aidkit/catalog.db`. It holds the relational
//! projection of the catalog: the `guides` table (canonical fields plus
//! mirrored override columns), the `contacts` table (seeded defaults, user
//! contacts, soft deletes, the `(phoneNumber, type)` uniqueness index), and
//! `search_history`. The schema is owned by the migration engine; nothing
//! here queries a mid-migration store because migrations complete inside
//! `open_at` before the handle exists.
//!
//! The handle is intentionally NOT `Clone` or `Sync`. The composition root
//! holds it behind a `parking_lot::Mutex` so per-key writers serialize.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::error::{CatalogError, PersistenceError};
use crate::migrations::{self, MigrationOutcome};

mod contacts;
mod guides;
mod search_history;

pub use search_history::{SEARCH_HISTORY_MAX, SEARCH_HISTORY_MAX_AGE_DAYS};

pub struct CatalogDb {
    conn: Connection,
    outcome: MigrationOutcome,
}

impl CatalogDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// How the migration engine brought this store to the current version.
    pub fn migration_outcome(&self) -> MigrationOutcome {
        self.outcome
    }

    /// Open (or create) `catalog.db` under the given data directory and bring
    /// its schema to the current version.
    pub fn open_in_dir(dir: &Path) -> Result<Self, CatalogError> {
        Self::open_at(dir.join("catalog.db"))
    }

    /// Open the database at the default location (`~/.aidkit/catalog.db`).
    pub fn open() -> Result<Self, CatalogError> {
        let path = Self::default_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing.
    pub(crate) fn open_at(path: PathBuf) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(PersistenceError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path).map_err(PersistenceError::Sqlite)?;

        // WAL for concurrent readers while a writer holds the handle
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(PersistenceError::Sqlite)?;

        let outcome = migrations::run_migrations(&conn)?;

        Ok(Self { conn, outcome })
    }

    /// Open an in-memory database at the current schema. Test-only.
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Self {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let outcome = migrations::run_migrations(&conn).expect("migrations");
        Self { conn, outcome }
    }

    /// Resolve the default database path: `~/.aidkit/catalog.db`.
    fn default_path() -> Result<PathBuf, PersistenceError> {
        let home = dirs::home_dir().ok_or(PersistenceError::HomeDirNotFound)?;
        Ok(home.join(".aidkit").join("catalog.db"))
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err — a failed mutation leaves the store
    /// exactly as it was before the call.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, PersistenceError>
    where
        F: FnOnce(&Self) -> Result<T, PersistenceError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}
