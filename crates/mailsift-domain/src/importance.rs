//! Importance module - the triage level assigned to an email

use serde::{Deserialize, Serialize};

/// Importance level of an email
///
/// Serialized with the labels used throughout the extraction corpus
/// (`重大`, `通常`, `低`). Parsing also accepts the English names so that
/// backends answering in either vocabulary are understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Importance {
    /// Contracts, complaints, urgent requests
    #[serde(rename = "重大", alias = "CRITICAL", alias = "critical", alias = "Critical")]
    Critical,

    /// Routine business correspondence
    #[default]
    #[serde(rename = "通常", alias = "NORMAL", alias = "normal", alias = "Normal")]
    Normal,

    /// Administrative or CC-only information
    #[serde(rename = "低", alias = "LOW", alias = "low", alias = "Low")]
    Low,
}

impl Importance {
    /// Get the corpus label for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            Importance::Critical => "重大",
            Importance::Normal => "通常",
            Importance::Low => "低",
        }
    }

    /// Get the English name for this level
    pub fn name(&self) -> &'static str {
        match self {
            Importance::Critical => "CRITICAL",
            Importance::Normal => "NORMAL",
            Importance::Low => "LOW",
        }
    }

    /// Parse an importance level from either vocabulary
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "重大" => return Some(Importance::Critical),
            "通常" => return Some(Importance::Normal),
            "低" => return Some(Importance::Low),
            _ => {}
        }

        match s.trim().to_lowercase().as_str() {
            "critical" => Some(Importance::Critical),
            "normal" => Some(Importance::Normal),
            "low" => Some(Importance::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Importance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid importance: {}", s))
    }
}
