//! Configuration management for the CLI.

use crate::cli::{BackendArgs, PresetArg};
use crate::error::{CliError, Result};
use mailsift_extractor::ExtractorConfig;
use mailsift_llm::GeminiConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Extraction settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Generation backend settings
    #[serde(default)]
    pub backend: BackendSettings,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Generation backend settings; the API key never lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Model name, overriding `GEMINI_MODEL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Retries on rate limiting and server errors
    pub max_retries: u32,
}

/// Global CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".mailsift").join("config.toml"))
    }

    /// Resolve an explicit path or fall back to the default location.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::path(),
        }
    }

    /// Load configuration from a file, using defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            config.extractor.validate().map_err(CliError::Config)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Extractor settings after applying command-line overrides.
    pub fn extractor_config(&self, args: &BackendArgs) -> Result<ExtractorConfig> {
        let mut config = match args.preset {
            None => self.extractor.clone(),
            Some(preset) => {
                // Preset replaces tuning knobs but keeps file-level customizations
                let mut base = match preset {
                    PresetArg::Default => ExtractorConfig::default(),
                    PresetArg::Aggressive => ExtractorConfig::aggressive(),
                    PresetArg::Lenient => ExtractorConfig::lenient(),
                };
                base.response_mode = self.extractor.response_mode;
                base.temperature = self.extractor.temperature;
                base.honorifics = self.extractor.honorifics.clone();
                base.instructions_file = self.extractor.instructions_file.clone();
                base
            }
        };

        if let Some(mode) = args.mode {
            config.response_mode = mode.into();
        }
        if let Some(timeout) = args.timeout {
            config.generation_timeout_secs = timeout;
        }
        if let Some(path) = &args.instructions {
            config.instructions_file = Some(path.clone());
        }

        config.validate().map_err(CliError::Config)?;
        Ok(config)
    }

    /// Backend settings merged with the environment and command-line overrides.
    ///
    /// Fails when `GEMINI_API_KEY` is not set.
    pub fn gemini_config(&self, args: &BackendArgs, extractor: &ExtractorConfig) -> Result<GeminiConfig> {
        self.merge_gemini(GeminiConfig::from_env()?, args, extractor)
    }

    /// Apply file and flag settings on top of `base`.
    ///
    /// Timeout and retries are shrunk so a whole backend call, retries
    /// included, ends before the extractor's generation timeout.
    fn merge_gemini(
        &self,
        base: GeminiConfig,
        args: &BackendArgs,
        extractor: &ExtractorConfig,
    ) -> Result<GeminiConfig> {
        let mut gemini = base
            .with_timeout_secs(self.backend.timeout_secs)
            .with_max_retries(self.backend.max_retries)
            .with_temperature(extractor.temperature);

        if let Some(model) = args.model.as_ref().or(self.backend.model.as_ref()) {
            gemini = gemini.with_model(model.clone());
        }
        if let Some(endpoint) = &self.backend.endpoint {
            gemini = gemini.with_endpoint(endpoint.clone());
        }

        gemini.validate()?;
        let fitted = gemini.clone().fit_within(extractor.generation_timeout());
        if fitted.timeout_secs != gemini.timeout_secs || fitted.max_retries != gemini.max_retries {
            warn!(
                timeout_secs = fitted.timeout_secs,
                max_retries = fitted.max_retries,
                "Backend timeout and retries reduced to fit the {}s generation timeout",
                extractor.generation_timeout_secs
            );
        }
        Ok(fitted)
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            model: None,
            endpoint: None,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
