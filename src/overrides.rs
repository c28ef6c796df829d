//! Override store: the sole writer of user-scoped catalog state.
//!
//! Two backings, one façade:
//! - guide overrides, the contact id counter, and the seeded flag live in the
//!   key-value store (authoritative, durably flushed per mutation);
//! - contacts (seeded defaults, user additions, soft deletes) live in the
//!   relational `contacts` table where the `(phoneNumber, type)` uniqueness
//!   index can enforce itself.
//!
//! Guide overrides are additionally mirrored into the `guides` table columns
//! so the relational projection stays queryable. The mirror is best-effort:
//! the key-value record is committed first and wins on divergence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::db::CatalogDb;
use crate::error::PersistenceError;
use crate::kv::KvStore;
use crate::types::{EmergencyContact, GuideOverride, USER_CONTACT_ID_BASE};

const KEY_GUIDE_PREFIX: &str = "guide:";
const KEY_CONTACT_COUNTER: &str = "contact_id_counter";
const KEY_CONTACTS_SEEDED: &str = "contacts_seeded";

/// What a delete did, so callers can phrase the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Default contact: row kept, flipped inactive.
    SoftDeleted,
    /// User contact: row physically removed.
    Removed,
    /// No such contact.
    NotFound,
}

pub struct OverrideStore {
    kv: KvStore,
    db: Arc<Mutex<CatalogDb>>,
    /// Serializes read-increment-write on the contact id counter.
    alloc_lock: Mutex<()>,
}

impl OverrideStore {
    pub fn new(kv: KvStore, db: Arc<Mutex<CatalogDb>>) -> Self {
        Self {
            kv,
            db,
            alloc_lock: Mutex::new(()),
        }
    }

    // =========================================================================
    // Guide overrides
    // =========================================================================

    pub fn guide_override(&self, guide_id: &str) -> Option<GuideOverride> {
        self.kv.get(&format!("{KEY_GUIDE_PREFIX}{guide_id}"))
    }

    /// Every guide override, keyed by guide id.
    pub fn all_guide_overrides(&self) -> HashMap<String, GuideOverride> {
        self.kv
            .scan_prefix::<GuideOverride>(KEY_GUIDE_PREFIX)
            .into_iter()
            .collect()
    }

    /// Ids of guides currently marked favorite.
    pub fn all_favorite_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .kv
            .scan_prefix::<GuideOverride>(KEY_GUIDE_PREFIX)
            .into_iter()
            .filter(|(_, over)| over.is_favorite)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// Set or clear the favorite flag. Creates the override lazily.
    pub fn toggle_favorite(&self, guide_id: &str, favorite: bool) -> Result<(), PersistenceError> {
        let mut over = self.guide_override(guide_id).unwrap_or_default();
        over.is_favorite = favorite;
        self.put_guide_override(guide_id, &over)
    }

    /// Record a guide access: bump the view counter and advance the
    /// last-accessed stamp. Both fields are monotonically non-decreasing.
    pub fn record_access(&self, guide_id: &str) -> Result<(), PersistenceError> {
        let now_ms = Utc::now().timestamp_millis();
        let mut over = self.guide_override(guide_id).unwrap_or_default();
        over.view_count += 1;
        over.last_accessed_ms = Some(over.last_accessed_ms.map_or(now_ms, |prev| prev.max(now_ms)));
        self.put_guide_override(guide_id, &over)
    }

    fn put_guide_override(
        &self,
        guide_id: &str,
        over: &GuideOverride,
    ) -> Result<(), PersistenceError> {
        self.kv.put(&format!("{KEY_GUIDE_PREFIX}{guide_id}"), over)?;
        // Mirror to the relational projection. The KV record is already
        // durable; a mirror failure only staled the projection, so log it
        // rather than unwinding an acknowledged write.
        if let Err(e) = self.db.lock().mirror_guide_override(guide_id, over) {
            log::warn!("Guide override mirror for {guide_id} failed: {e}");
        }
        Ok(())
    }

    // =========================================================================
    // Contacts
    // =========================================================================

    /// Allocate the next user contact id.
    ///
    /// The counter is incremented and durably saved before the id is handed
    /// out, so no id is ever issued twice across restarts. Seeded above the
    /// bundled id space.
    pub fn allocate_contact_id(&self) -> Result<i64, PersistenceError> {
        let _guard = self.alloc_lock.lock();
        let next = self
            .kv
            .get::<i64>(KEY_CONTACT_COUNTER)
            .unwrap_or(USER_CONTACT_ID_BASE);
        self.kv.put(KEY_CONTACT_COUNTER, &(next + 1))?;
        Ok(next)
    }

    /// Insert or replace a contact record atomically. A constraint violation
    /// (duplicate active `(phone, type)`) surfaces as an error and leaves the
    /// store untouched.
    pub fn upsert_contact(&self, contact: &EmergencyContact) -> Result<(), PersistenceError> {
        self.db.lock().upsert_contact(contact)
    }

    /// Delete a contact. Default contacts are soft-deleted (the row is never
    /// physically removed); user contacts are hard-deleted.
    pub fn delete_contact(&self, id: i64) -> Result<DeleteOutcome, PersistenceError> {
        let db = self.db.lock();
        let Some(contact) = db.get_contact(id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        if contact.is_default {
            db.soft_delete_contact(id)?;
            Ok(DeleteOutcome::SoftDeleted)
        } else {
            db.hard_delete_contact(id)?;
            Ok(DeleteOutcome::Removed)
        }
    }

    pub fn get_contact(&self, id: i64) -> Result<Option<EmergencyContact>, PersistenceError> {
        self.db.lock().get_contact(id)
    }

    /// User-added contacts only.
    pub fn all_user_contacts(&self) -> Result<Vec<EmergencyContact>, PersistenceError> {
        self.db.lock().user_contacts()
    }

    /// Every stored contact, for the merge snapshot.
    pub fn contact_snapshot(&self) -> Result<Vec<EmergencyContact>, PersistenceError> {
        self.db.lock().all_contacts()
    }

    // =========================================================================
    // Seeding + bulk reset
    // =========================================================================

    pub fn contacts_seeded(&self) -> bool {
        self.kv.get::<bool>(KEY_CONTACTS_SEEDED).unwrap_or(false)
    }

    pub fn mark_contacts_seeded(&self) -> Result<(), PersistenceError> {
        self.kv.put(KEY_CONTACTS_SEEDED, &true)
    }

    pub fn clear_contacts_seeded(&self) -> Result<(), PersistenceError> {
        self.kv.remove(KEY_CONTACTS_SEEDED)
    }

    /// Bulk reset: the only path that deletes guide overrides. Clears user
    /// contacts, reactivates defaults, wipes mirrored columns and history.
    /// The contact id counter is deliberately kept — ids are never reissued.
    pub fn reset_all(&self) -> Result<(), PersistenceError> {
        self.kv.remove_prefix(KEY_GUIDE_PREFIX)?;
        let db = self.db.lock();
        db.with_transaction(|db| {
            db.reset_contacts()?;
            db.reset_guide_overrides()?;
            db.clear_search_history()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactState, ContactType, NATIONAL};

    fn open_store() -> (tempfile::TempDir, OverrideStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let kv = KvStore::open_at(dir.path().join("overrides.json")).expect("kv");
        let db = Arc::new(Mutex::new(CatalogDb::open_in_dir(dir.path()).expect("db")));
        (dir, OverrideStore::new(kv, db))
    }

    fn user_contact(id: i64, phone: &str) -> EmergencyContact {
        EmergencyContact {
            id,
            name: "Dr. Adel".to_string(),
            phone_number: phone.to_string(),
            contact_type: ContactType::Doctor,
            state: NATIONAL.to_string(),
            is_default: false,
            status: ContactState::Active,
            description: None,
            relationship: None,
            notes: None,
        }
    }

    #[test]
    fn test_favorite_toggle_creates_lazily() {
        let (_dir, store) = open_store();
        assert!(store.guide_override("cpr-001").is_none());

        store.toggle_favorite("cpr-001", true).expect("favorite");
        assert!(store.guide_override("cpr-001").expect("present").is_favorite);
        assert_eq!(store.all_favorite_ids(), vec!["cpr-001".to_string()]);

        store.toggle_favorite("cpr-001", false).expect("unfavorite");
        assert!(store.all_favorite_ids().is_empty());
        // The override record itself survives the unfavorite
        assert!(store.guide_override("cpr-001").is_some());
    }

    #[test]
    fn test_record_access_is_monotonic() {
        let (_dir, store) = open_store();
        store.record_access("cpr-001").expect("first");
        store.record_access("cpr-001").expect("second");

        let over = store.guide_override("cpr-001").expect("present");
        assert_eq!(over.view_count, 2);
        assert!(over.last_accessed_ms.is_some());
    }

    #[test]
    fn test_contact_id_allocation_never_repeats_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Mutex::new(CatalogDb::open_in_dir(dir.path()).expect("db")));

        let first = {
            let kv = KvStore::open_at(dir.path().join("overrides.json")).expect("kv");
            let store = OverrideStore::new(kv, Arc::clone(&db));
            let a = store.allocate_contact_id().expect("a");
            let b = store.allocate_contact_id().expect("b");
            assert_eq!(a, USER_CONTACT_ID_BASE);
            assert_eq!(b, USER_CONTACT_ID_BASE + 1);
            b
        };

        let kv = KvStore::open_at(dir.path().join("overrides.json")).expect("kv reopen");
        let store = OverrideStore::new(kv, db);
        let c = store.allocate_contact_id().expect("c");
        assert!(c > first, "counter must survive restart");
    }

    #[test]
    fn test_delete_branches_on_default_vs_user() {
        let (_dir, store) = open_store();
        let db = Arc::clone(&store.db);
        db.lock()
            .seed_default_contacts(&[EmergencyContact {
                id: 1,
                name: "Police".to_string(),
                phone_number: "911".to_string(),
                contact_type: ContactType::Police,
                state: NATIONAL.to_string(),
                is_default: true,
                status: ContactState::Active,
                description: None,
                relationship: None,
                notes: None,
            }])
            .expect("seed");
        store.upsert_contact(&user_contact(1000, "0800")).expect("user");

        assert_eq!(store.delete_contact(1).expect("del"), DeleteOutcome::SoftDeleted);
        assert_eq!(store.delete_contact(1000).expect("del"), DeleteOutcome::Removed);
        assert_eq!(store.delete_contact(555).expect("del"), DeleteOutcome::NotFound);

        // Soft-deleted default is still in the snapshot, marked inactive
        let snapshot = store.contact_snapshot().expect("snapshot");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].status, ContactState::SoftDeleted);
    }

    #[test]
    fn test_failed_upsert_leaves_store_unchanged() {
        let (_dir, store) = open_store();
        store.upsert_contact(&user_contact(1000, "911")).expect("first");

        // Same (phone, type), different id: unique index rejects it
        let err = store.upsert_contact(&user_contact(1001, "911"));
        assert!(err.is_err());

        let users = store.all_user_contacts().expect("users");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 1000);
    }

    #[test]
    fn test_reset_all_clears_overrides_but_not_counter() {
        let (_dir, store) = open_store();
        store.toggle_favorite("cpr-001", true).expect("favorite");
        let allocated = store.allocate_contact_id().expect("alloc");
        store.upsert_contact(&user_contact(allocated, "0800")).expect("user");

        store.reset_all().expect("reset");
        assert!(store.guide_override("cpr-001").is_none());
        assert!(store.all_user_contacts().expect("users").is_empty());

        let next = store.allocate_contact_id().expect("alloc after reset");
        assert!(next > allocated, "ids are never reissued, even after reset");
    }
}
