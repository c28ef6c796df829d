//! Error types for the catalog engine.
//!
//! Errors are classified by recovery policy:
//! - `LoadError`: bundled content problems — always recovered by falling back
//!   to the embedded dataset, never surfaced as a hard failure.
//! - `MigrationError`: a schema transition failed — recovered by the
//!   destructive rebuild and surfaced only as an informational outcome.
//! - `PersistenceError`: an I/O or constraint failure on a user-initiated
//!   mutation — surfaced to the caller so the UI can report it.
//!
//! Missing ids are `Option::None`, never an error variant.

use std::path::PathBuf;

use thiserror::Error;

/// Bundled content could not be used as-is. Always absorbed by the loader's
/// fallback chain; retained so the chosen path is observable in logs.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read bundled content at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse bundled content at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Bundled content at {path} is a placeholder (empty or near-empty payload)")]
    Placeholder { path: PathBuf },
}

/// A schema transition failed. The migration engine answers with a
/// destructive rebuild; these variants describe what went wrong first.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration v{version} failed: {source}")]
    Step {
        version: i32,
        source: rusqlite::Error,
    },

    #[error("Failed to record migration v{version}: {source}")]
    Record {
        version: i32,
        source: rusqlite::Error,
    },

    #[error("Schema version bookkeeping failed: {0}")]
    Bookkeeping(#[from] rusqlite::Error),

    #[error(
        "Database schema version ({found}) is newer than this build supports ({supported}). \
         Update the application instead of rebuilding."
    )]
    VersionFromFuture { found: i32, supported: i32 },
}

/// A user-visible "failed to save" condition on the relational or key-value
/// store. The mutation that produced it was rolled back in full.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Override store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Override store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create data directory: {0}")]
    CreateDir(std::io::Error),
}

/// Umbrella error for the catalog service API.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Persistence(PersistenceError::Sqlite(err))
    }
}
