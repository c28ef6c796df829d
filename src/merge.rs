//! Catalog merge engine: canonical layer + override layer → merged view.
//!
//! The merge is a pure in-memory transform — no I/O, cannot fail. Whatever
//! valid inputs it last received produce an internally consistent snapshot.
//! Snapshots are immutable `Arc`s republished through a `tokio::sync::watch`
//! channel: every subscriber observes the same sequence of views in commit
//! order, and `borrow()` always yields the latest one without blocking.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::types::{CanonicalGuide, EmergencyContact, GuideOverride, MergedGuide};

/// One consistent merged view. Valid until the next merge pass replaces it;
/// holders keep their `Arc` alive as long as they need the old view.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Exactly one merged guide per canonical guide, in canonical order.
    pub guides: Vec<MergedGuide>,
    /// Active contacts only, in the default listing order.
    pub contacts: Vec<EmergencyContact>,
}

impl CatalogSnapshot {
    pub fn empty() -> Self {
        CatalogSnapshot {
            guides: Vec::new(),
            contacts: Vec::new(),
        }
    }
}

pub struct MergeEngine {
    canonical: Arc<Vec<CanonicalGuide>>,
    tx: watch::Sender<Arc<CatalogSnapshot>>,
}

impl MergeEngine {
    /// Build the engine around the one-time canonical load. The initial
    /// snapshot is published immediately from empty overrides; the caller
    /// republishes once the override store has been read.
    pub fn new(canonical: Vec<CanonicalGuide>) -> Self {
        let canonical = Arc::new(canonical);
        let initial = merge(&canonical, &HashMap::new(), Vec::new());
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { canonical, tx }
    }

    /// The canonical guide layer (read-only for the process lifetime).
    pub fn canonical_guides(&self) -> &[CanonicalGuide] {
        &self.canonical
    }

    /// Latest merged view.
    pub fn current(&self) -> Arc<CatalogSnapshot> {
        self.tx.borrow().clone()
    }

    /// Subscribe to merge passes. The receiver immediately sees the current
    /// snapshot and is notified on every republish.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.tx.subscribe()
    }

    /// Recompute the merged view from fresh layer snapshots and broadcast it.
    pub fn republish(
        &self,
        overrides: &HashMap<String, GuideOverride>,
        contacts: Vec<EmergencyContact>,
    ) {
        let snapshot = merge(&self.canonical, overrides, contacts);
        // send only fails with zero receivers; the view must still advance
        // for pull-style `current()` readers
        self.tx.send_replace(Arc::new(snapshot));
    }
}

/// The merge algorithm. Pure: entities are never invented — an override
/// without a canonical guide is inert, while contacts are unioned wholesale
/// (a user contact's record *is* its full record).
fn merge(
    canonical: &[CanonicalGuide],
    overrides: &HashMap<String, GuideOverride>,
    contacts: Vec<EmergencyContact>,
) -> CatalogSnapshot {
    let guides = canonical
        .iter()
        .map(|guide| MergedGuide::from_layers(guide, overrides.get(&guide.id)))
        .collect();

    let mut contacts: Vec<EmergencyContact> = contacts
        .into_iter()
        .filter(|c| c.status.is_active())
        .collect();
    contacts.sort_by_key(|c| c.sort_key());

    CatalogSnapshot { guides, contacts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundled;
    use crate::types::{ContactState, ContactType, NATIONAL};

    fn contact(id: i64, name: &str, ctype: ContactType, default: bool) -> EmergencyContact {
        EmergencyContact {
            id,
            name: name.to_string(),
            phone_number: format!("0{id}"),
            contact_type: ctype,
            state: NATIONAL.to_string(),
            is_default: default,
            status: ContactState::Active,
            description: None,
            relationship: None,
            notes: None,
        }
    }

    #[test]
    fn test_exactly_one_merged_guide_per_canonical_id() {
        let canonical = bundled::embedded_guides();
        let engine = MergeEngine::new(canonical.clone());

        let mut overrides = HashMap::new();
        overrides.insert(
            "cpr-001".to_string(),
            GuideOverride {
                is_favorite: true,
                view_count: 3,
                last_accessed_ms: Some(9),
            },
        );
        // Inert: no canonical guide with this id
        overrides.insert("ghost-999".to_string(), GuideOverride::default());

        engine.republish(&overrides, Vec::new());
        let snapshot = engine.current();

        assert_eq!(snapshot.guides.len(), canonical.len());
        assert!(snapshot.guides.iter().all(|g| canonical.iter().any(|c| c.id == g.id)));

        let cpr = snapshot.guides.iter().find(|g| g.id == "cpr-001").expect("cpr");
        assert!(cpr.is_favorite);
        assert_eq!(cpr.view_count, 3);
        // Non-overridable fields come from the canonical record
        let canonical_cpr = canonical.iter().find(|c| c.id == "cpr-001").expect("canonical");
        assert_eq!(cpr.title, canonical_cpr.title);
        assert_eq!(cpr.steps.len(), canonical_cpr.steps.len());
    }

    #[test]
    fn test_contact_ordering_defaults_then_type_then_name() {
        let engine = MergeEngine::new(Vec::new());
        engine.republish(
            &HashMap::new(),
            vec![
                contact(1000, "Zara", ContactType::Personal, false),
                contact(2, "Fire", ContactType::FireDepartment, true),
                contact(1, "Police", ContactType::Police, true),
                contact(1001, "Anna", ContactType::Personal, false),
                contact(3, "Beta Hospital", ContactType::Hospital, true),
                contact(4, "Alpha Hospital", ContactType::Hospital, true),
            ],
        );

        let names: Vec<String> = engine
            .current()
            .contacts
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(
            names,
            vec!["Police", "Fire", "Alpha Hospital", "Beta Hospital", "Anna", "Zara"]
        );
    }

    #[test]
    fn test_soft_deleted_contacts_excluded_from_view() {
        let engine = MergeEngine::new(Vec::new());
        let mut gone = contact(1, "Police", ContactType::Police, true);
        gone.status = ContactState::SoftDeleted;
        engine.republish(&HashMap::new(), vec![gone, contact(2, "Fire", ContactType::FireDepartment, true)]);

        let snapshot = engine.current();
        assert_eq!(snapshot.contacts.len(), 1);
        assert_eq!(snapshot.contacts[0].name, "Fire");
    }

    #[test]
    fn test_subscribers_observe_republish() {
        let engine = MergeEngine::new(bundled::embedded_guides());
        let mut rx = engine.subscribe();
        // Drain the initial snapshot marker
        let _ = rx.has_changed();

        engine.republish(&HashMap::new(), vec![contact(1, "Police", ContactType::Police, true)]);
        assert!(rx.has_changed().expect("channel alive"));

        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.contacts.len(), 1);
        assert!(!rx.has_changed().expect("channel alive"));
    }
}
