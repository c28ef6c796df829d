//! Forward-only schema migration engine.
//!
//! Numbered SQL migrations are embedded at compile time via `include_str!`.
//! Each migration runs exactly once, in increasing version order, tracked by
//! the `schema_version` table. A transition either fully completes inside its
//! own transaction or the whole startup sequence falls back to a destructive
//! rebuild: drop every table and replay all migrations against the empty
//! store. That rebuild is a documented data-loss boundary — the caller sees
//! [`MigrationOutcome::Rebuilt`] and is expected to reseed bundled rows.
//!
//! Only user overrides are at risk on a rebuild; the canonical catalog is
//! re-derivable from the bundled content loader.

use rusqlite::Connection;

use crate::error::MigrationError;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("migrations/001_baseline.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("migrations/002_contact_regions.sql"),
    },
    Migration {
        version: 3,
        sql: include_str!("migrations/003_contact_unique_phone_type.sql"),
    },
    Migration {
        version: 4,
        sql: include_str!("migrations/004_search_history.sql"),
    },
    Migration {
        version: 5,
        sql: include_str!("migrations/005_guides_reshape.sql"),
    },
];

/// How startup brought the store to the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Already at the newest version; nothing ran.
    UpToDate,
    /// Applied this many pending transitions in order.
    Migrated(usize),
    /// A transition failed; the schema was dropped and recreated at the
    /// newest version, discarding existing rows.
    Rebuilt,
}

impl MigrationOutcome {
    pub fn is_rebuilt(self) -> bool {
        matches!(self, MigrationOutcome::Rebuilt)
    }
}

/// The newest schema version this build knows.
pub fn latest_version() -> i32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Create the `schema_version` table if it doesn't exist.
fn ensure_schema_version_table(conn: &Connection) -> Result<(), MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    Ok(())
}

/// Return the highest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> Result<i32, MigrationError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Back up the database before applying migrations.
///
/// Uses SQLite's online backup API to create a hot copy at
/// `<db_path>.pre-migration.bak`. Only called when there are pending
/// migrations against a non-empty store.
fn backup_before_migration(conn: &Connection) -> Result<(), MigrationError> {
    let db_path: String = conn.query_row("PRAGMA database_list", [], |row| row.get(2))?;

    if db_path.is_empty() || db_path == ":memory:" {
        // In-memory or temp database — skip backup
        return Ok(());
    }

    let backup_path = format!("{}.pre-migration.bak", db_path);
    let mut backup_conn = Connection::open(&backup_path)?;

    let backup = rusqlite::backup::Backup::new(conn, &mut backup_conn)?;
    backup.step(-1)?;

    log::info!("Pre-migration backup created at {}", backup_path);
    Ok(())
}

/// Apply one transition inside its own transaction: the step SQL and the
/// version bookkeeping commit together or not at all.
fn apply_step(conn: &Connection, migration: &Migration) -> Result<(), MigrationError> {
    conn.execute_batch("BEGIN IMMEDIATE")?;

    let result = conn
        .execute_batch(migration.sql)
        .map_err(|source| MigrationError::Step {
            version: migration.version,
            source,
        })
        .and_then(|_| {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [migration.version],
            )
            .map_err(|source| MigrationError::Record {
                version: migration.version,
                source,
            })
        });

    match result {
        Ok(_) => {
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Drop every user table so the schema can be replayed from scratch.
fn drop_all_tables(conn: &Connection) -> Result<(), MigrationError> {
    let names: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<_, _>>()?
    };

    for name in names {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS \"{}\";", name))?;
    }
    Ok(())
}

/// Destructive rebuild: drop everything and replay all migrations.
///
/// The safety net for a failed transition. If the replay itself fails the
/// store is unusable and the error propagates.
fn rebuild(conn: &Connection) -> Result<(), MigrationError> {
    drop_all_tables(conn)?;
    ensure_schema_version_table(conn)?;
    for migration in MIGRATIONS {
        apply_step(conn, migration)?;
    }
    Ok(())
}

/// Bring the store to the newest schema version.
///
/// Pending transitions run strictly in order, each exactly once. Any
/// transition failure triggers the destructive rebuild and reports
/// [`MigrationOutcome::Rebuilt`].
///
/// Forward-compat guard: a persisted version newer than this build is an
/// error, not a rebuild — rebuilding would silently destroy a newer
/// install's data.
pub fn run_migrations(conn: &Connection) -> Result<MigrationOutcome, MigrationError> {
    ensure_schema_version_table(conn)?;

    let current = current_version(conn)?;
    let max_known = latest_version();

    if current > max_known {
        return Err(MigrationError::VersionFromFuture {
            found: current,
            supported: max_known,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        return Ok(MigrationOutcome::UpToDate);
    }

    // Only a store with history is worth backing up
    if current > 0 {
        backup_before_migration(conn)?;
    }

    for migration in &pending {
        if let Err(e) = apply_step(conn, migration) {
            log::error!("{e}; falling back to destructive rebuild");
            rebuild(conn)?;
            log::warn!(
                "Schema rebuilt at v{} — existing rows discarded",
                latest_version()
            );
            return Ok(MigrationOutcome::Rebuilt);
        }
        log::info!("Applied migration v{}", migration.version);
    }

    Ok(MigrationOutcome::Migrated(pending.len()))
}
