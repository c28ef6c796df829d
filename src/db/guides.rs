use rusqlite::params;

use super::CatalogDb;
use crate::error::PersistenceError;
use crate::types::{CanonicalGuide, GuideOverride};

impl CatalogDb {
    // =========================================================================
    // Guides (relational projection)
    // =========================================================================

    /// Seed (or refresh) the canonical half of the guides table.
    ///
    /// Canonical fields are replaced wholesale on every app update; the
    /// override columns (`isFavorite`, `viewCount`, `lastAccessedTimestamp`)
    /// are owned by the override store and never touched here. Steps and
    /// warnings are stored as explicit JSON text — hand-written
    /// serialization, no row mapping by reflection.
    pub fn seed_guides(&self, guides: &[CanonicalGuide]) -> Result<(), PersistenceError> {
        for guide in guides {
            let steps = serde_json::to_string(&guide.steps)?;
            let warnings = serde_json::to_string(&guide.warnings)?;
            self.conn.execute(
                "INSERT INTO guides (
                    id, title, category, severity, description, steps, warnings,
                    estimatedTimeMinutes, difficulty
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    category = excluded.category,
                    severity = excluded.severity,
                    description = excluded.description,
                    steps = excluded.steps,
                    warnings = excluded.warnings,
                    estimatedTimeMinutes = excluded.estimatedTimeMinutes,
                    difficulty = excluded.difficulty",
                params![
                    guide.id,
                    guide.title,
                    guide.category,
                    guide.severity,
                    guide.description,
                    steps,
                    warnings,
                    guide.estimated_time_minutes,
                    guide.difficulty.as_str(),
                ],
            )?;
        }
        Ok(())
    }

    /// Mirror a guide override into the relational projection.
    ///
    /// The key-value store is authoritative; this write-through keeps the
    /// `guides` row queryable by tools that only see SQL.
    pub fn mirror_guide_override(
        &self,
        guide_id: &str,
        over: &GuideOverride,
    ) -> Result<(), PersistenceError> {
        self.conn.execute(
            "UPDATE guides SET
                isFavorite = ?2,
                viewCount = ?3,
                lastAccessedTimestamp = ?4
             WHERE id = ?1",
            params![
                guide_id,
                over.is_favorite as i64,
                over.view_count as i64,
                over.last_accessed_ms,
            ],
        )?;
        Ok(())
    }

    /// Read back the mirrored override columns for one guide.
    pub fn guide_override_columns(
        &self,
        guide_id: &str,
    ) -> Result<Option<GuideOverride>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT isFavorite, viewCount, lastAccessedTimestamp
             FROM guides WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![guide_id], |row| {
            Ok(GuideOverride {
                is_favorite: row.get::<_, i64>(0)? != 0,
                view_count: row.get::<_, i64>(1)? as u64,
                last_accessed_ms: row.get(2)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Clear every mirrored override column. The bulk-reset path.
    pub fn reset_guide_overrides(&self) -> Result<(), PersistenceError> {
        self.conn.execute(
            "UPDATE guides SET isFavorite = 0, viewCount = 0, lastAccessedTimestamp = NULL",
            [],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundled;

    #[test]
    fn test_seed_guides_round_trips_steps_json() {
        let db = CatalogDb::open_in_memory();
        let guides = bundled::embedded_guides();
        db.seed_guides(&guides).expect("seed");

        let steps_json: String = db
            .conn_ref()
            .query_row("SELECT steps FROM guides WHERE id = 'cpr-001'", [], |r| r.get(0))
            .expect("row");
        let steps: Vec<crate::types::GuideStep> =
            serde_json::from_str(&steps_json).expect("steps parse back");
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].step_number, 1);
    }

    #[test]
    fn test_reseed_preserves_override_columns() {
        let db = CatalogDb::open_in_memory();
        let guides = bundled::embedded_guides();
        db.seed_guides(&guides).expect("seed");

        let over = GuideOverride {
            is_favorite: true,
            view_count: 7,
            last_accessed_ms: Some(1_700_000_000_000),
        };
        db.mirror_guide_override("cpr-001", &over).expect("mirror");

        // Content update replays the seed
        db.seed_guides(&guides).expect("reseed");

        let stored = db
            .guide_override_columns("cpr-001")
            .expect("read")
            .expect("present");
        assert!(stored.is_favorite);
        assert_eq!(stored.view_count, 7);
    }

    #[test]
    fn test_reset_guide_overrides() {
        let db = CatalogDb::open_in_memory();
        db.seed_guides(&bundled::embedded_guides()).expect("seed");
        db.mirror_guide_override(
            "cpr-001",
            &GuideOverride {
                is_favorite: true,
                view_count: 3,
                last_accessed_ms: Some(1),
            },
        )
        .expect("mirror");

        db.reset_guide_overrides().expect("reset");
        let stored = db
            .guide_override_columns("cpr-001")
            .expect("read")
            .expect("present");
        assert!(!stored.is_favorite);
        assert_eq!(stored.view_count, 0);
        assert!(stored.last_accessed_ms.is_none());
    }
}
