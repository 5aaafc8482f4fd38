//! Configuration for the Extractor

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Shape the backend is asked to answer in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// One JSON object conforming to the record schema
    Record,
    /// A sequence of labeled extraction fragments
    #[default]
    Fragments,
}

impl ResponseMode {
    /// Lowercase name as used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Record => "record",
            ResponseMode::Fragments => "fragments",
        }
    }
}

impl std::fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" | "schema" => Ok(ResponseMode::Record),
            "fragments" | "fragment" => Ok(ResponseMode::Fragments),
            other => Err(format!("Unknown response mode '{}' (expected record or fragments)", other)),
        }
    }
}

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum input text length (characters)
    pub max_text_length: usize,

    /// Maximum time for a single generation call (seconds)
    pub generation_timeout_secs: u64,

    /// Documents processed at the same time in a batch
    pub concurrency: usize,

    /// Response shape requested from the backend
    pub response_mode: ResponseMode,

    /// Sampling temperature handed to the backend
    pub temperature: f32,

    /// Replacement honorific suffix table (built-in table when unset)
    pub honorifics: Option<Vec<String>>,

    /// File whose contents replace the built-in instruction block
    pub instructions_file: Option<PathBuf>,
}

impl ExtractorConfig {
    /// Get the generation timeout as a Duration
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_text_length == 0 {
            return Err("max_text_length must be greater than 0".to_string());
        }
        if self.generation_timeout_secs == 0 {
            return Err("generation_timeout_secs must be greater than 0".to_string());
        }
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("temperature {} out of range [0.0, 2.0]", self.temperature));
        }
        if let Some(honorifics) = &self.honorifics {
            if honorifics.iter().all(|h| h.trim().is_empty()) {
                return Err("honorifics override must contain at least one suffix".to_string());
            }
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_text_length: 100_000,
            generation_timeout_secs: 120,
            concurrency: 4,
            response_mode: ResponseMode::Fragments,
            temperature: 0.0,
            honorifics: None,
            instructions_file: None,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: shorter timeouts, wider fan-out
    pub fn aggressive() -> Self {
        Self {
            max_text_length: 50_000,
            generation_timeout_secs: 30,
            concurrency: 8,
            ..Self::default()
        }
    }

    /// Lenient preset: long timeouts, gentle on backend quota
    pub fn lenient() -> Self {
        Self {
            max_text_length: 500_000,
            generation_timeout_secs: 300,
            concurrency: 1,
            ..Self::default()
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(Self::default()),
            "aggressive" => Some(Self::aggressive()),
            "lenient" => Some(Self::lenient()),
            _ => None,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str)
            .map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
