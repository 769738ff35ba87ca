//! Canonical severity labels and raw-value normalization.
//!
//! Feed events carry their threat level in several shapes (numeric id,
//! quoted id, display name, sometimes nothing usable). Everything funnels
//! through [`ThreatLevel`]: three canonical levels with a total id↔name
//! mapping and no default. An unrecognized value is "no label" and the
//! owning document falls out of the corpus rather than being miscategorized.

use serde_json::Value;

/// Manifest keys consulted for a document label, highest priority first.
pub const LABEL_KEY_PRIORITY: [&str; 3] =
    ["threat_level_id", "threat_level", "threat_level_label"];

/// Event-embedded keys consulted when the manifest yields nothing.
const EVENT_LABEL_KEYS: [&str; 2] = ["threat_level_id", "threat_level"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ThreatLevel {
    High,
    Medium,
    Low,
}

impl ThreatLevel {
    /// All levels in id order ("1" first).
    pub const ALL: [ThreatLevel; 3] =
        [ThreatLevel::High, ThreatLevel::Medium, ThreatLevel::Low];

    /// Numeric id as carried in feed documents; "1" is the most severe.
    pub fn id(self) -> &'static str {
        match self {
            ThreatLevel::High => "1",
            ThreatLevel::Medium => "2",
            ThreatLevel::Low => "3",
        }
    }

    /// Display name, the other half of the bidirectional mapping.
    pub fn name(self) -> &'static str {
        match self {
            ThreatLevel::High => "High",
            ThreatLevel::Medium => "Medium",
            ThreatLevel::Low => "Low",
        }
    }

    /// Match a textual form after trim + lowercase. Ids and display names
    /// only; "4"/"undefined" and the empty string have no canonical level.
    pub fn from_text(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "1" | "high" => Some(ThreatLevel::High),
            "2" | "medium" => Some(ThreatLevel::Medium),
            "3" | "low" => Some(ThreatLevel::Low),
            _ => None,
        }
    }

    /// Normalize an arbitrary raw JSON value. Strings are trimmed, numbers
    /// matched on their literal form; null, booleans, and containers never
    /// name a level.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        match raw {
            Value::String(s) => Self::from_text(s),
            Value::Number(n) => Self::from_text(&n.to_string()),
            _ => None,
        }
    }
}

/// Resolve the label for one document: the manifest record wins (fixed key
/// priority, a present-but-unrecognized value falls through to the next
/// key), then the event's own embedded severity fields.
pub fn label_for_document(
    manifest_row: Option<&Value>,
    document: Option<&Value>,
) -> Option<ThreatLevel> {
    if let Some(row) = manifest_row {
        for key in LABEL_KEY_PRIORITY {
            if let Some(level) = row.get(key).and_then(ThreatLevel::from_raw) {
                return Some(level);
            }
        }
    }
    let event = document.and_then(|doc| doc.get("Event"));
    for key in EVENT_LABEL_KEYS {
        if let Some(level) = event.and_then(|e| e.get(key)).and_then(ThreatLevel::from_raw) {
            return Some(level);
        }
    }
    None
}
