//! Domain types for the layered reference catalog.
//!
//! Canonical entities (guides, default contacts) ship with the binary and are
//! read-only after load. Overrides carry user-scoped state layered on top.
//! Merged projections are recomputed on every merge pass and never stored.

use serde::{Deserialize, Serialize};

/// Bundled contact ids live in `1..=999`; user contact ids are allocated
/// from a persisted counter seeded here so the two spaces never collide.
pub const USER_CONTACT_ID_BASE: i64 = 1000;

/// The sentinel region for contacts that apply everywhere.
pub const NATIONAL: &str = "National";

// =============================================================================
// Guides
// =============================================================================

/// Guide difficulty rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Parse from content or a db column. Unknown values fail closed to Medium.
    pub fn parse(s: &str) -> Self {
        match s {
            "easy" => Difficulty::Easy,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

/// What kind of instruction a guide step carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Check,
    Call,
    Action,
    Safety,
    Repeat,
    EmergencyCall,
    Wait,
    Observe,
    Assessment,
    Positioning,
    Monitoring,
    FollowUp,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Check => "check",
            StepType::Call => "call",
            StepType::Action => "action",
            StepType::Safety => "safety",
            StepType::Repeat => "repeat",
            StepType::EmergencyCall => "emergency_call",
            StepType::Wait => "wait",
            StepType::Observe => "observe",
            StepType::Assessment => "assessment",
            StepType::Positioning => "positioning",
            StepType::Monitoring => "monitoring",
            StepType::FollowUp => "follow_up",
        }
    }

    /// Parse from content. Unknown step types fail closed to Action so a new
    /// content vocabulary never aborts a load.
    pub fn parse(s: &str) -> Self {
        match s {
            "check" => StepType::Check,
            "call" => StepType::Call,
            "action" => StepType::Action,
            "safety" => StepType::Safety,
            "repeat" => StepType::Repeat,
            "emergency_call" => StepType::EmergencyCall,
            "wait" => StepType::Wait,
            "observe" => StepType::Observe,
            "assessment" => StepType::Assessment,
            "positioning" => StepType::Positioning,
            "monitoring" => StepType::Monitoring,
            "follow_up" => StepType::FollowUp,
            _ => StepType::Action,
        }
    }
}

/// A single step within a guide. `step_number` is 1-based and strictly
/// increasing within its parent guide (the loader reindexes non-conforming
/// input).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideStep {
    pub id: String,
    pub guide_id: String,
    pub step_number: u32,
    pub title: String,
    pub description: String,
    pub step_type: StepType,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_tools: Vec<String>,
}

/// A bundled, read-only guide. Never mutated after load; user state lives in
/// [`GuideOverride`] and is substituted in by the merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalGuide {
    pub id: String,
    pub title: String,
    pub category: String,
    pub severity: String,
    pub description: String,
    pub steps: Vec<GuideStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_to_call_emergency: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub estimated_time_minutes: u32,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_reference: Option<String>,
}

/// Per-guide user state, keyed by guide id in the override store.
///
/// Created lazily on first interaction. `view_count` and `last_accessed_ms`
/// are monotonically non-decreasing; records are only removed by a bulk reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideOverride {
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_ms: Option<i64>,
}

/// A canonical guide with its override fields substituted in. Pure
/// projection: recomputed on every merge pass, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedGuide {
    pub id: String,
    pub title: String,
    pub category: String,
    pub severity: String,
    pub description: String,
    pub steps: Vec<GuideStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when_to_call_emergency: Option<String>,
    pub warnings: Vec<String>,
    pub estimated_time_minutes: u32,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_reference: Option<String>,
    pub is_favorite: bool,
    pub view_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_ms: Option<i64>,
}

impl MergedGuide {
    /// Overlay an override onto a canonical guide. Absent override fields use
    /// canonical defaults (not favorite, zero views, never accessed).
    pub fn from_layers(canonical: &CanonicalGuide, over: Option<&GuideOverride>) -> Self {
        let over = over.cloned().unwrap_or_default();
        MergedGuide {
            id: canonical.id.clone(),
            title: canonical.title.clone(),
            category: canonical.category.clone(),
            severity: canonical.severity.clone(),
            description: canonical.description.clone(),
            steps: canonical.steps.clone(),
            when_to_call_emergency: canonical.when_to_call_emergency.clone(),
            warnings: canonical.warnings.clone(),
            estimated_time_minutes: canonical.estimated_time_minutes,
            difficulty: canonical.difficulty,
            video_reference: canonical.video_reference.clone(),
            is_favorite: over.is_favorite,
            view_count: over.view_count,
            last_accessed_ms: over.last_accessed_ms,
        }
    }
}

// =============================================================================
// Contacts
// =============================================================================

/// Contact classification. Variant order defines the default listing order
/// within the default/user partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactType {
    Police,
    FireDepartment,
    Ambulance,
    Hospital,
    PoisonControl,
    EmergencyServices,
    Personal,
    Family,
    Doctor,
    Veterinarian,
    Other,
}

impl ContactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Police => "police",
            ContactType::FireDepartment => "fire_department",
            ContactType::Ambulance => "ambulance",
            ContactType::Hospital => "hospital",
            ContactType::PoisonControl => "poison_control",
            ContactType::EmergencyServices => "emergency_services",
            ContactType::Personal => "personal",
            ContactType::Family => "family",
            ContactType::Doctor => "doctor",
            ContactType::Veterinarian => "veterinarian",
            ContactType::Other => "other",
        }
    }

    /// Parse from content or a db column. Unknown values fail closed to Other.
    pub fn parse(s: &str) -> Self {
        match s {
            "police" => ContactType::Police,
            "fire_department" => ContactType::FireDepartment,
            "ambulance" => ContactType::Ambulance,
            "hospital" => ContactType::Hospital,
            "poison_control" => ContactType::PoisonControl,
            "emergency_services" => ContactType::EmergencyServices,
            "personal" => ContactType::Personal,
            "family" => ContactType::Family,
            "doctor" => ContactType::Doctor,
            "veterinarian" => ContactType::Veterinarian,
            _ => ContactType::Other,
        }
    }

    /// Ordinal used by the default contact ordering.
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

/// Whether a contact is visible or has been soft-deleted.
///
/// Default (bundled) contacts are never physically removed; deleting one
/// flips it to `SoftDeleted`. User contacts are hard-deleted instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactState {
    Active,
    SoftDeleted,
}

impl ContactState {
    /// Wire form for the `isActive` INTEGER column.
    pub fn to_flag(self) -> i64 {
        match self {
            ContactState::Active => 1,
            ContactState::SoftDeleted => 0,
        }
    }

    pub fn from_flag(flag: i64) -> Self {
        if flag == 0 {
            ContactState::SoftDeleted
        } else {
            ContactState::Active
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, ContactState::Active)
    }
}

/// An emergency contact — either a bundled default (`is_default == true`,
/// id below [`USER_CONTACT_ID_BASE`]) or a user-added record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub id: i64,
    pub name: String,
    pub phone_number: String,
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_contact_state")]
    pub status: ContactState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_state() -> String {
    NATIONAL.to_string()
}

fn default_contact_state() -> ContactState {
    ContactState::Active
}

impl EmergencyContact {
    /// Sort key for the default listing: defaults before user contacts, then
    /// type ordinal, then case-insensitive name.
    pub fn sort_key(&self) -> (u8, u8, String) {
        let partition = if self.is_default { 0 } else { 1 };
        (partition, self.contact_type.ordinal(), self.name.to_lowercase())
    }
}

// =============================================================================
// Search history
// =============================================================================

/// A recorded search. Append-only, subject to capped retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub id: i64,
    pub query: String,
    /// Unix millis.
    pub timestamp: i64,
    pub result_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}
