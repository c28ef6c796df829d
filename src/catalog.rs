//! Catalog service: the composition root.
//!
//! Owns the relational store, the key-value override store, the one-time
//! bundled load, and the merge engine, and exposes the consumer API (UI,
//! assistants) on top. Construction is the startup sequence — migrate,
//! (re)seed, load, publish — so a `Catalog` value is queryable the moment it
//! exists; there is no "not ready" state to poll.
//!
//! All stores are explicitly constructed and owned here, passed by reference
//! to components. No ambient globals.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::bundled::{self, ContentSource};
use crate::db::CatalogDb;
use crate::error::{CatalogError, PersistenceError};
use crate::kv::KvStore;
use crate::merge::{CatalogSnapshot, MergeEngine};
use crate::migrations::MigrationOutcome;
use crate::overrides::{DeleteOutcome, OverrideStore};
use crate::search;
use crate::types::{ContactState, EmergencyContact, MergedGuide, SearchHistoryEntry};

pub struct Catalog {
    db: Arc<Mutex<CatalogDb>>,
    overrides: OverrideStore,
    merge: MergeEngine,
    /// Serializes mutation commit + republish so subscribers observe merge
    /// passes in commit order.
    publish_lock: Mutex<()>,
    migration_outcome: MigrationOutcome,
    guide_source: ContentSource,
    contact_source: ContentSource,
}

impl Catalog {
    /// Open the catalog under the default data directory (`~/.aidkit`),
    /// with no external content pack.
    pub fn open() -> Result<Self, CatalogError> {
        let home = dirs::home_dir().ok_or(PersistenceError::HomeDirNotFound)?;
        Self::open_with(&home.join(".aidkit"), None)
    }

    /// Open the catalog under an explicit data directory.
    pub fn open_in_dir(dir: &Path) -> Result<Self, CatalogError> {
        Self::open_with(dir, None)
    }

    /// Full startup sequence. `content_dir` optionally points at an external
    /// content pack (`guides.json` / `contacts.json`); the loader falls back
    /// to the embedded dataset on any problem with it.
    pub fn open_with(dir: &Path, content_dir: Option<&Path>) -> Result<Self, CatalogError> {
        // 1. Bring the relational store to the current schema version.
        let db = CatalogDb::open_in_dir(dir)?;
        let migration_outcome = db.migration_outcome();
        let db = Arc::new(Mutex::new(db));

        // 2. Open the override store.
        let kv = KvStore::open_at(dir.join("overrides.json"))?;
        let overrides = OverrideStore::new(kv, Arc::clone(&db));

        // 3. One-time bundled load.
        let (guides, guide_source) = bundled::load_guides(content_dir);
        let (default_contacts, contact_source) = bundled::load_contacts(content_dir);

        // 4. Seed the relational projection. A rebuild discarded every row,
        //    so the seeded flag no longer reflects reality.
        if migration_outcome.is_rebuilt() {
            log::warn!("Relational store was rebuilt; reseeding bundled content");
            overrides.clear_contacts_seeded()?;
        }
        {
            let db = db.lock();
            db.seed_guides(&guides)?;
            if !overrides.contacts_seeded() {
                let inserted = db.seed_default_contacts(&default_contacts)?;
                log::info!("Seeded {inserted} default contacts");
            }
            // Guide overrides live in the KV store and survive a rebuild;
            // replay their mirror columns onto the fresh rows.
            for (guide_id, over) in overrides.all_guide_overrides() {
                db.mirror_guide_override(&guide_id, &over)?;
            }
        }
        if !overrides.contacts_seeded() {
            overrides.mark_contacts_seeded()?;
        }

        // 5. First merge pass.
        let merge = MergeEngine::new(guides);
        let catalog = Self {
            db,
            overrides,
            merge,
            publish_lock: Mutex::new(()),
            migration_outcome,
            guide_source,
            contact_source,
        };
        catalog.republish()?;
        Ok(catalog)
    }

    /// Recompute and broadcast the merged view from fresh layer snapshots.
    fn republish(&self) -> Result<(), PersistenceError> {
        let guide_overrides = self.overrides.all_guide_overrides();
        let contacts = self.overrides.contact_snapshot()?;
        self.merge.republish(&guide_overrides, contacts);
        Ok(())
    }

    // =========================================================================
    // Observability
    // =========================================================================

    /// Whether startup migrated the store forward or fell back to the
    /// destructive rebuild ("data reset" notice territory).
    pub fn migration_outcome(&self) -> MigrationOutcome {
        self.migration_outcome
    }

    /// Which load path produced the canonical guide set.
    pub fn guide_source(&self) -> ContentSource {
        self.guide_source
    }

    /// Which load path produced the default contact set.
    pub fn contact_source(&self) -> ContentSource {
        self.contact_source
    }

    // =========================================================================
    // Reads (pure over the latest snapshot)
    // =========================================================================

    /// Latest merged view. Valid until the next merge pass; holders may keep
    /// the `Arc` as long as they like.
    pub fn current_view(&self) -> Arc<CatalogSnapshot> {
        self.merge.current()
    }

    /// Subscribe to merge passes, in commit order, identically for all
    /// subscribers.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.merge.subscribe()
    }

    pub fn get_all_guides(&self) -> Vec<MergedGuide> {
        self.current_view().guides.clone()
    }

    pub fn get_guide_by_id(&self, id: &str) -> Option<MergedGuide> {
        self.current_view().guides.iter().find(|g| g.id == id).cloned()
    }

    pub fn search(&self, query: &str) -> Vec<MergedGuide> {
        search::search_guides(&self.current_view(), query)
    }

    pub fn guides_by_category(&self, category: &str) -> Vec<MergedGuide> {
        search::guides_by_category(&self.current_view(), category)
    }

    pub fn categories(&self) -> Vec<String> {
        search::categories(&self.current_view())
    }

    /// Favorited guides, most recently accessed first.
    pub fn favorites(&self) -> Vec<MergedGuide> {
        search::favorites(&self.current_view())
    }

    /// Contacts for a region (unioned with national defaults), or all
    /// contacts when no filter is given.
    pub fn list_contacts(&self, state_filter: Option<&str>) -> Vec<EmergencyContact> {
        search::contacts_for_state(&self.current_view(), state_filter)
    }

    pub fn search_contacts(&self, query: &str) -> Vec<EmergencyContact> {
        search::search_contacts(&self.current_view(), query)
    }

    pub fn get_contact(&self, id: i64) -> Result<Option<EmergencyContact>, CatalogError> {
        Ok(self.overrides.get_contact(id)?)
    }

    pub fn recent_searches(&self, limit: usize) -> Result<Vec<SearchHistoryEntry>, CatalogError> {
        Ok(self.db.lock().recent_searches(limit)?)
    }

    // =========================================================================
    // Mutations (commit, then republish, under one ordering lock)
    // =========================================================================

    /// Set or clear a guide's favorite flag. An id with no canonical guide
    /// is stored but inert in the merged view.
    pub fn toggle_favorite(&self, guide_id: &str, favorite: bool) -> Result<(), CatalogError> {
        let _ordering = self.publish_lock.lock();
        self.overrides.toggle_favorite(guide_id, favorite)?;
        self.republish()?;
        Ok(())
    }

    /// Record a guide view: bumps the counter and the last-accessed stamp.
    pub fn record_access(&self, guide_id: &str) -> Result<(), CatalogError> {
        let _ordering = self.publish_lock.lock();
        self.overrides.record_access(guide_id)?;
        self.republish()?;
        Ok(())
    }

    /// Add a user contact. Allocates an id from the persisted counter and
    /// returns the stored record. The id is burned even if the insert is
    /// rejected (duplicate active phone/type) — ids are never reissued.
    pub fn add_contact(&self, mut contact: EmergencyContact) -> Result<EmergencyContact, CatalogError> {
        let _ordering = self.publish_lock.lock();
        contact.id = self.overrides.allocate_contact_id()?;
        contact.is_default = false;
        contact.status = ContactState::Active;
        self.overrides.upsert_contact(&contact)?;
        self.republish()?;
        Ok(contact)
    }

    /// Update an existing contact in place (atomic record replace). A failed
    /// update leaves the store exactly as it was.
    pub fn upsert_contact(&self, contact: &EmergencyContact) -> Result<(), CatalogError> {
        let _ordering = self.publish_lock.lock();
        self.overrides.upsert_contact(contact)?;
        self.republish()?;
        Ok(())
    }

    /// Delete a contact: soft for defaults, hard for user contacts.
    pub fn delete_contact(&self, id: i64) -> Result<DeleteOutcome, CatalogError> {
        let _ordering = self.publish_lock.lock();
        let outcome = self.overrides.delete_contact(id)?;
        if outcome != DeleteOutcome::NotFound {
            self.republish()?;
        }
        Ok(outcome)
    }

    /// Append to search history, enforcing the retention cap.
    pub fn record_search(
        &self,
        query: &str,
        result_count: u32,
        category: Option<&str>,
    ) -> Result<(), CatalogError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.db
            .lock()
            .record_search(query, result_count, category, now_ms)?;
        Ok(())
    }

    /// Bulk reset of all user state: overrides, user contacts, history.
    /// Defaults are reactivated. The only path that deletes overrides.
    pub fn reset_user_data(&self) -> Result<(), CatalogError> {
        let _ordering = self.publish_lock.lock();
        self.overrides.reset_all()?;
        self.republish()?;
        Ok(())
    }
}
