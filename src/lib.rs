//! Layered first-aid reference catalog.
//!
//! Bundled, read-only content (guides and emergency contacts) is overlaid
//! with user mutations held in local stores, merged into immutable snapshots,
//! and queried offline. The crate is organized as:
//!
//! - [`bundled`] — one-time canonical content load (external pack or embedded)
//! - [`kv`] — JSON-file key-value store for user overrides
//! - [`db`] — SQLite projection (contacts, guide rows, search history)
//! - [`migrations`] — forward-only schema migration with rebuild fallback
//! - [`overrides`] — the user mutation layer over both stores
//! - [`merge`] — pure canonical + override merge, published as snapshots
//! - [`search`] — pure query functions over a snapshot
//! - [`catalog`] — composition root and consumer API

pub mod bundled;
pub mod catalog;
pub mod db;
pub mod error;
pub mod kv;
pub mod merge;
pub mod migrations;
pub mod overrides;
pub mod search;
pub mod types;

pub use bundled::ContentSource;
pub use catalog::Catalog;
pub use error::{CatalogError, LoadError, MigrationError, PersistenceError};
pub use merge::CatalogSnapshot;
pub use migrations::MigrationOutcome;
pub use overrides::DeleteOutcome;
pub use types::{
    CanonicalGuide, ContactState, ContactType, Difficulty, EmergencyContact, GuideOverride,
    GuideStep, MergedGuide, SearchHistoryEntry, StepType,
};
