//! Bundled content loader with embedded static fallback.
//!
//! Load strategy:
//! 1. If a data directory is provided and holds `guides.json` / `contacts.json`,
//!    parse that (content-pack path).
//! 2. On any read/parse failure or a placeholder payload (empty array,
//!    near-empty file), fall back to the dataset compiled into the binary.
//!
//! The embedded dataset is well-formed by construction (locked by tests), so
//! the public load functions are infallible. Which path was taken is logged
//! and returned for observability.
//!
//! Content JSON is forward-compatible: unknown fields are ignored, unknown
//! enum values degrade to safe defaults, and `warnings` accepts both a bare
//! string (legacy shape) and a list.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;
use crate::types::{
    CanonicalGuide, ContactState, ContactType, Difficulty, EmergencyContact, GuideStep, StepType,
    NATIONAL,
};

const EMBEDDED_GUIDES: &str = include_str!("bundled/guides.json");
const EMBEDDED_CONTACTS: &str = include_str!("bundled/contacts.json");

/// Payloads shorter than this are treated as placeholders, not content.
/// Covers `""`, `"[]"`, `"[ ]"` and similar stubs left by packaging tools.
const PLACEHOLDER_MAX_LEN: usize = 8;

/// Which path the loader took, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// Parsed from the external data directory.
    External,
    /// Fell back to the dataset compiled into the binary.
    Embedded,
}

// =============================================================================
// Raw content shapes
// =============================================================================

/// `warnings` appears as both a bare string and a list across content
/// sources. Canonical form is always a list; a string becomes one element.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Warnings {
    One(String),
    Many(Vec<String>),
}

impl Warnings {
    fn normalize(self) -> Vec<String> {
        match self {
            Warnings::One(s) if s.is_empty() => Vec::new(),
            Warnings::One(s) => vec![s],
            Warnings::Many(list) => list,
        }
    }
}

fn warnings_default() -> Warnings {
    Warnings::Many(Vec::new())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonGuide {
    id: String,
    title: String,
    category: String,
    severity: String,
    description: String,
    #[serde(default)]
    steps: Vec<JsonStep>,
    when_to_call_emergency: Option<String>,
    #[serde(default = "warnings_default")]
    warnings: Warnings,
    #[serde(default)]
    estimated_time_minutes: u32,
    #[serde(default)]
    difficulty: Option<String>,
    video_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonStep {
    id: String,
    step_number: u32,
    title: String,
    description: String,
    #[serde(rename = "type", default)]
    step_type: Option<String>,
    #[serde(default)]
    is_critical: bool,
    image_reference: Option<String>,
    #[serde(default)]
    tips: Vec<String>,
    #[serde(default = "warnings_default")]
    warnings: Warnings,
    #[serde(default)]
    required_tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonContact {
    id: i64,
    name: String,
    phone_number: String,
    #[serde(rename = "type", default)]
    contact_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
    description: Option<String>,
}

// =============================================================================
// Public load functions
// =============================================================================

/// Load the canonical guide set. Infallible: falls back to the embedded
/// dataset on any problem with the external source.
pub fn load_guides(data_dir: Option<&Path>) -> (Vec<CanonicalGuide>, ContentSource) {
    if let Some(dir) = data_dir {
        let path = dir.join("guides.json");
        match read_guides(&path) {
            Ok(guides) => {
                log::info!("Loaded {} guides from {}", guides.len(), path.display());
                return (guides, ContentSource::External);
            }
            Err(e) => log::warn!("Bundled guide load fell back to embedded dataset: {e}"),
        }
    }

    (embedded_guides(), ContentSource::Embedded)
}

/// Load the default contact set. Infallible, same fallback chain as guides.
pub fn load_contacts(data_dir: Option<&Path>) -> (Vec<EmergencyContact>, ContentSource) {
    if let Some(dir) = data_dir {
        let path = dir.join("contacts.json");
        match read_contacts(&path) {
            Ok(contacts) => {
                log::info!("Loaded {} contacts from {}", contacts.len(), path.display());
                return (contacts, ContentSource::External);
            }
            Err(e) => log::warn!("Bundled contact load fell back to embedded dataset: {e}"),
        }
    }

    (embedded_contacts(), ContentSource::Embedded)
}

/// The guide dataset compiled into the binary. A parse failure here is a
/// build defect (locked by tests); production degrades to an empty set
/// rather than panicking.
pub fn embedded_guides() -> Vec<CanonicalGuide> {
    match parse_guides(EMBEDDED_GUIDES) {
        Ok(guides) => guides,
        Err(e) => {
            log::error!("Embedded guide dataset failed to parse: {e}");
            Vec::new()
        }
    }
}

/// The contact dataset compiled into the binary.
pub fn embedded_contacts() -> Vec<EmergencyContact> {
    match parse_contacts(EMBEDDED_CONTACTS) {
        Ok(contacts) => contacts,
        Err(e) => {
            log::error!("Embedded contact dataset failed to parse: {e}");
            Vec::new()
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn read_guides(path: &Path) -> Result<Vec<CanonicalGuide>, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if is_placeholder(&content) {
        return Err(LoadError::Placeholder {
            path: path.to_path_buf(),
        });
    }
    let guides = parse_guides(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if guides.is_empty() {
        return Err(LoadError::Placeholder {
            path: path.to_path_buf(),
        });
    }
    Ok(guides)
}

fn read_contacts(path: &Path) -> Result<Vec<EmergencyContact>, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if is_placeholder(&content) {
        return Err(LoadError::Placeholder {
            path: path.to_path_buf(),
        });
    }
    let contacts = parse_contacts(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if contacts.is_empty() {
        return Err(LoadError::Placeholder {
            path: path.to_path_buf(),
        });
    }
    Ok(contacts)
}

fn is_placeholder(content: &str) -> bool {
    content.trim().len() <= PLACEHOLDER_MAX_LEN
}

fn parse_guides(content: &str) -> Result<Vec<CanonicalGuide>, serde_json::Error> {
    let raw: Vec<JsonGuide> = serde_json::from_str(content)?;
    Ok(raw.into_iter().map(convert_guide).collect())
}

fn parse_contacts(content: &str) -> Result<Vec<EmergencyContact>, serde_json::Error> {
    let raw: Vec<JsonContact> = serde_json::from_str(content)?;
    Ok(raw
        .into_iter()
        .map(|c| EmergencyContact {
            id: c.id,
            name: c.name,
            phone_number: c.phone_number,
            contact_type: ContactType::parse(c.contact_type.as_deref().unwrap_or("other")),
            state: c.state.unwrap_or_else(|| NATIONAL.to_string()),
            is_default: true,
            status: ContactState::Active,
            description: c.description,
            relationship: None,
            notes: None,
        })
        .collect())
}

fn convert_guide(raw: JsonGuide) -> CanonicalGuide {
    let guide_id = raw.id.clone();
    let mut steps: Vec<GuideStep> = raw
        .steps
        .into_iter()
        .map(|s| GuideStep {
            id: s.id,
            guide_id: guide_id.clone(),
            step_number: s.step_number,
            title: s.title,
            description: s.description,
            step_type: StepType::parse(s.step_type.as_deref().unwrap_or("action")),
            is_critical: s.is_critical,
            image_reference: s.image_reference,
            tips: s.tips,
            warnings: s.warnings.normalize(),
            required_tools: s.required_tools,
        })
        .collect();
    reindex_steps(&mut steps);

    CanonicalGuide {
        id: raw.id,
        title: raw.title,
        category: raw.category,
        severity: raw.severity,
        description: raw.description,
        steps,
        when_to_call_emergency: raw.when_to_call_emergency,
        warnings: raw.warnings.normalize(),
        estimated_time_minutes: raw.estimated_time_minutes,
        difficulty: Difficulty::parse(raw.difficulty.as_deref().unwrap_or("medium")),
        video_reference: raw.video_reference,
    }
}

/// Enforce the step numbering invariant: strictly increasing from 1.
///
/// Policy is reindex, not reject — steps keep their input order and are
/// renumbered 1..n whenever the sequence does not already conform.
fn reindex_steps(steps: &mut [GuideStep]) {
    let conforms = steps
        .iter()
        .enumerate()
        .all(|(i, s)| s.step_number == (i as u32) + 1);
    if conforms {
        return;
    }
    for (i, step) in steps.iter_mut().enumerate() {
        step.step_number = (i as u32) + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_guides_parse_and_validate() {
        let guides = embedded_guides();
        assert!(!guides.is_empty(), "embedded guide dataset must be non-empty");
        for guide in &guides {
            assert!(!guide.id.is_empty());
            for (i, step) in guide.steps.iter().enumerate() {
                assert_eq!(step.step_number, (i as u32) + 1);
                assert_eq!(step.guide_id, guide.id);
            }
        }
    }

    #[test]
    fn test_embedded_contacts_parse() {
        let contacts = embedded_contacts();
        assert!(!contacts.is_empty());
        for contact in &contacts {
            assert!(contact.is_default);
            assert!(contact.id < crate::types::USER_CONTACT_ID_BASE);
        }
    }

    #[test]
    fn test_placeholder_payload_falls_back_to_embedded() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("guides.json"), "[]").expect("write");

        let (guides, source) = load_guides(Some(dir.path()));
        assert_eq!(source, ContentSource::Embedded);
        assert_eq!(guides.len(), embedded_guides().len());
    }

    #[test]
    fn test_malformed_payload_falls_back_to_embedded() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("guides.json"), "{not json").expect("write");

        let (_, source) = load_guides(Some(dir.path()));
        assert_eq!(source, ContentSource::Embedded);
    }

    #[test]
    fn test_external_payload_wins_when_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let payload = r#"[{
            "id": "g-1", "title": "Test", "category": "test", "severity": "low",
            "description": "d", "estimatedTimeMinutes": 5,
            "steps": [
                {"id": "s1", "stepNumber": 3, "title": "a", "description": "x", "type": "check"},
                {"id": "s2", "stepNumber": 7, "title": "b", "description": "y", "type": "mystery"}
            ]
        }]"#;
        std::fs::write(dir.path().join("guides.json"), payload).expect("write");

        let (guides, source) = load_guides(Some(dir.path()));
        assert_eq!(source, ContentSource::External);
        assert_eq!(guides.len(), 1);
        // Non-conforming numbering was reindexed, order preserved
        assert_eq!(guides[0].steps[0].step_number, 1);
        assert_eq!(guides[0].steps[1].step_number, 2);
        assert_eq!(guides[0].steps[0].step_type, StepType::Check);
        // Unknown step type failed closed
        assert_eq!(guides[0].steps[1].step_type, StepType::Action);
    }

    #[test]
    fn test_warnings_string_normalized_to_list() {
        let payload = r#"[{
            "id": "g-1", "title": "T", "category": "c", "severity": "low",
            "description": "d", "estimatedTimeMinutes": 1,
            "warnings": "single warning"
        }]"#;
        let guides = parse_guides(payload).expect("parse");
        assert_eq!(guides[0].warnings, vec!["single warning".to_string()]);

        let payload_list = r#"[{
            "id": "g-2", "title": "T", "category": "c", "severity": "low",
            "description": "d", "estimatedTimeMinutes": 1,
            "warnings": ["a", "b"]
        }]"#;
        let guides = parse_guides(payload_list).expect("parse");
        assert_eq!(guides[0].warnings.len(), 2);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let payload = r#"[{
            "id": "g-1", "title": "T", "category": "c", "severity": "low",
            "description": "d", "estimatedTimeMinutes": 1,
            "futureField": {"nested": true}
        }]"#;
        assert!(parse_guides(payload).is_ok());
    }
}
