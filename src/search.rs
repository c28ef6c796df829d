//! Query layer over the merged catalog view.
//!
//! Every function here is a pure transform of a [`CatalogSnapshot`]: no I/O,
//! no suspension, idempotent for unchanged inputs. Listings preserve the
//! snapshot's canonical ordering unless a view defines its own (favorites
//! sort by recency).

use std::collections::HashSet;

use crate::merge::CatalogSnapshot;
use crate::types::{EmergencyContact, MergedGuide, NATIONAL};

/// Case-insensitive substring search over guide title, description,
/// category, severity, and nested step title/description.
///
/// A blank query returns the unfiltered listing in canonical order.
pub fn search_guides(snapshot: &CatalogSnapshot, query: &str) -> Vec<MergedGuide> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return snapshot.guides.clone();
    }

    snapshot
        .guides
        .iter()
        .filter(|g| guide_matches(g, &needle))
        .cloned()
        .collect()
}

fn guide_matches(guide: &MergedGuide, needle: &str) -> bool {
    if guide.title.to_lowercase().contains(needle)
        || guide.description.to_lowercase().contains(needle)
        || guide.category.to_lowercase().contains(needle)
        || guide.severity.to_lowercase().contains(needle)
    {
        return true;
    }
    guide.steps.iter().any(|s| {
        s.title.to_lowercase().contains(needle) || s.description.to_lowercase().contains(needle)
    })
}

/// Guides in a category (case-insensitive exact match), canonical order.
pub fn guides_by_category(snapshot: &CatalogSnapshot, category: &str) -> Vec<MergedGuide> {
    snapshot
        .guides
        .iter()
        .filter(|g| g.category.eq_ignore_ascii_case(category))
        .cloned()
        .collect()
}

/// Distinct guide categories, sorted.
pub fn categories(snapshot: &CatalogSnapshot) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = snapshot
        .guides
        .iter()
        .filter(|g| seen.insert(g.category.to_lowercase()))
        .map(|g| g.category.clone())
        .collect();
    out.sort();
    out
}

/// Favorited guides, most recently accessed first. Never-accessed favorites
/// sort last, ties broken by canonical position (stable sort).
pub fn favorites(snapshot: &CatalogSnapshot) -> Vec<MergedGuide> {
    let mut out: Vec<MergedGuide> = snapshot
        .guides
        .iter()
        .filter(|g| g.is_favorite)
        .cloned()
        .collect();
    out.sort_by_key(|g| std::cmp::Reverse(g.last_accessed_ms.unwrap_or(i64::MIN)));
    out
}

/// Contact search over name, phone digits, state, and description.
///
/// A query containing digits also matches on the digit-stripped phone
/// number, so "0803" finds "+234 (803)..." formats.
pub fn search_contacts(snapshot: &CatalogSnapshot, query: &str) -> Vec<EmergencyContact> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return snapshot.contacts.clone();
    }
    let digit_needle: String = needle.chars().filter(|c| c.is_ascii_digit()).collect();

    snapshot
        .contacts
        .iter()
        .filter(|c| {
            if c.name.to_lowercase().contains(&needle)
                || c.state.to_lowercase().contains(&needle)
                || c.description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
            {
                return true;
            }
            if !digit_needle.is_empty() {
                let digits: String = c
                    .phone_number
                    .chars()
                    .filter(|ch| ch.is_ascii_digit())
                    .collect();
                return digits.contains(&digit_needle);
            }
            false
        })
        .cloned()
        .collect()
}

/// Contacts applicable to a region: the region's own contacts unioned with
/// the `"National"` sentinel, deduped by id, in the default ordering.
/// `None` lists everything.
pub fn contacts_for_state(snapshot: &CatalogSnapshot, state: Option<&str>) -> Vec<EmergencyContact> {
    let Some(state) = state else {
        return snapshot.contacts.clone();
    };

    let mut seen: HashSet<i64> = HashSet::new();
    snapshot
        .contacts
        .iter()
        .filter(|c| c.state.eq_ignore_ascii_case(state) || c.state == NATIONAL)
        .filter(|c| seen.insert(c.id))
        .cloned()
        .collect()
}
