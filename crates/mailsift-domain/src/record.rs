//! Record module - the canonical, schema-validated extraction result

use crate::importance::Importance;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use thiserror::Error;

/// Subject used when the backend did not report one
pub const UNKNOWN_SUBJECT: &str = "(no subject)";

/// Sender used when the backend did not report one
pub const UNKNOWN_SENDER: &str = "(unknown sender)";

/// A typed field could not be coerced into the record schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Schema violation on '{field}': {reason} (value: {value:?})")]
pub struct SchemaViolation {
    /// Offending field
    pub field: String,

    /// Raw value that failed coercion
    pub value: String,

    /// Why the value was rejected
    pub reason: String,
}

/// Structured fields extracted from one email document
///
/// Set-valued fields are stored sorted and deduplicated, so two records built
/// from the same information compare equal regardless of discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Email subject line
    pub subject: String,

    /// Sender address
    pub sender: String,

    /// Recipient addresses
    #[serde(default)]
    pub recipients: BTreeSet<String>,

    /// When the email was received, if it could be parsed
    #[serde(default)]
    pub received_at: Option<NaiveDateTime>,

    /// Triage level
    pub importance: Importance,

    /// Keywords that drove the importance decision
    #[serde(default)]
    pub keywords_detected: BTreeSet<String>,

    /// Short summary of the content
    #[serde(default)]
    pub summary: String,

    /// Concrete action requested of the reader
    #[serde(default)]
    pub action_required: Option<String>,

    /// Deadline mentioned in the email
    #[serde(default)]
    pub deadline: Option<String>,

    /// People mentioned, honorifics stripped
    #[serde(default)]
    pub mentioned_people: BTreeSet<String>,

    /// Organizations mentioned
    #[serde(default)]
    pub mentioned_companies: BTreeSet<String>,

    /// Projects or systems mentioned
    #[serde(default)]
    pub mentioned_projects: BTreeSet<String>,
}

impl Default for CanonicalRecord {
    fn default() -> Self {
        Self {
            subject: UNKNOWN_SUBJECT.to_string(),
            sender: UNKNOWN_SENDER.to_string(),
            recipients: BTreeSet::new(),
            received_at: None,
            importance: Importance::default(),
            keywords_detected: BTreeSet::new(),
            summary: String::new(),
            action_required: None,
            deadline: None,
            mentioned_people: BTreeSet::new(),
            mentioned_companies: BTreeSet::new(),
            mentioned_projects: BTreeSet::new(),
        }
    }
}

impl CanonicalRecord {
    /// Response schema describing this record for structured-output backends
    ///
    /// Uses the OpenAPI subset accepted by `generationConfig.responseSchema`.
    pub fn response_schema() -> serde_json::Value {
        let string_list = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
        json!({
            "type": "OBJECT",
            "properties": {
                "subject": { "type": "STRING" },
                "sender": { "type": "STRING" },
                "recipients": string_list,
                "received_at": { "type": "STRING", "nullable": true },
                "importance": { "type": "STRING", "enum": ["重大", "通常", "低"] },
                "keywords_detected": string_list,
                "summary": { "type": "STRING" },
                "action_required": { "type": "STRING", "nullable": true },
                "deadline": { "type": "STRING", "nullable": true },
                "mentioned_people": string_list,
                "mentioned_companies": string_list,
                "mentioned_projects": string_list
            },
            "required": ["subject", "sender", "recipients", "importance", "summary"]
        })
    }
}

/// Fields of [`CanonicalRecord`] that attributes may target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordField {
    /// `subject`
    Subject,
    /// `sender`
    Sender,
    /// `recipients`
    Recipients,
    /// `received_at`
    ReceivedAt,
    /// `importance`
    Importance,
    /// `keywords_detected`
    KeywordsDetected,
    /// `summary`
    Summary,
    /// `action_required`
    ActionRequired,
    /// `deadline`
    Deadline,
    /// `mentioned_people`
    MentionedPeople,
    /// `mentioned_companies`
    MentionedCompanies,
    /// `mentioned_projects`
    MentionedProjects,
}

impl RecordField {
    /// Every field, in schema order
    pub const ALL: [RecordField; 12] = [
        RecordField::Subject,
        RecordField::Sender,
        RecordField::Recipients,
        RecordField::ReceivedAt,
        RecordField::Importance,
        RecordField::KeywordsDetected,
        RecordField::Summary,
        RecordField::ActionRequired,
        RecordField::Deadline,
        RecordField::MentionedPeople,
        RecordField::MentionedCompanies,
        RecordField::MentionedProjects,
    ];

    /// Serialized field name
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::Subject => "subject",
            RecordField::Sender => "sender",
            RecordField::Recipients => "recipients",
            RecordField::ReceivedAt => "received_at",
            RecordField::Importance => "importance",
            RecordField::KeywordsDetected => "keywords_detected",
            RecordField::Summary => "summary",
            RecordField::ActionRequired => "action_required",
            RecordField::Deadline => "deadline",
            RecordField::MentionedPeople => "mentioned_people",
            RecordField::MentionedCompanies => "mentioned_companies",
            RecordField::MentionedProjects => "mentioned_projects",
        }
    }

    /// Look up a field by attribute key (exact, after trimming)
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL.iter().copied().find(|f| f.as_str() == key)
    }

    /// True for the set-valued fields
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            RecordField::Recipients
                | RecordField::KeywordsDetected
                | RecordField::MentionedPeople
                | RecordField::MentionedCompanies
                | RecordField::MentionedProjects
        )
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

/// Parse a received timestamp, returning `None` for anything unrecognized
///
/// RFC 3339 values keep their wall-clock time in the sender's offset.
pub fn parse_received_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
