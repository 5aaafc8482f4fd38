//! Gemini Provider Implementation
//!
//! Provides integration with Google's Gemini `generateContent` REST API.
//!
//! # Features
//!
//! - Blocking HTTP communication (callers run it on a blocking thread)
//! - Configurable endpoint, model, temperature and timeout
//! - Retry with exponential backoff for rate limits and server errors
//! - JSON mode with an optional response schema
//!
//! # Examples
//!
//! ```no_run
//! use mailsift_llm::{GeminiConfig, GeminiProvider};
//!
//! let config = GeminiConfig::from_env()?;
//! let provider = GeminiProvider::new(config)?;
//! # Ok::<(), mailsift_llm::LlmError>(())
//! ```

use crate::LlmError;
use mailsift_domain::traits::LlmProvider as LlmProviderTrait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Gemini API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Environment variable overriding the model
pub const MODEL_VAR: &str = "GEMINI_MODEL";

/// Default timeout for HTTP requests (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of attempts per call
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Longest sleep between two attempts
pub const MAX_BACKOFF_SECS: u64 = 30;

/// Per-attempt timeout below which [`GeminiConfig::fit_within`] gives up a retry instead
const MIN_ATTEMPT_SECS: u64 = 10;

/// Sleep after the `attempt`-th failed attempt: 1s, 2s, 4s, ... capped at [`MAX_BACKOFF_SECS`]
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Total backoff sleep across `attempts` attempts
fn total_backoff_secs(attempts: u32) -> u64 {
    let mut total = 0u64;
    for attempt in 1..attempts {
        let delay = backoff_delay(attempt).as_secs();
        if delay == MAX_BACKOFF_SECS {
            let remaining = u64::from(attempts - attempt);
            return total.saturating_add(remaining.saturating_mul(MAX_BACKOFF_SECS));
        }
        total += delay;
    }
    total
}

/// Connection settings for the Gemini backend
///
/// Built once at startup and handed to [`GeminiProvider::new`]; the credential
/// never lives in process-wide state.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,

    /// Model identifier (e.g. "gemini-2.0-flash")
    pub model: String,

    /// Base URL of the API
    pub endpoint: String,

    /// Per-request HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Attempts per call, including the first
    pub max_retries: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl GeminiConfig {
    /// Create a configuration with default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            temperature: 0.0,
        }
    }

    /// Read the credential (and optional model override) from the environment
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Configuration`] when `GEMINI_API_KEY` is unset or blank.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LlmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                LlmError::Configuration(format!(
                    "{} not found. Set it in the environment or a .env file",
                    API_KEY_VAR
                ))
            })?;

        let mut config = Self::new(api_key);
        if let Some(model) = lookup(MODEL_VAR).filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        Ok(config)
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the HTTP timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the maximum number of attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Longest a single call can take: every attempt timing out, plus backoff
    pub fn worst_case_duration(&self) -> Duration {
        let requests = self.timeout_secs.saturating_mul(u64::from(self.max_retries));
        Duration::from_secs(requests.saturating_add(total_backoff_secs(self.max_retries)))
    }

    /// Shrink the timeout and attempt count so a whole call ends before `deadline`
    ///
    /// The attempt count is kept while each attempt still gets a usable
    /// timeout. The per-attempt timeout is never raised, and never drops
    /// below one second.
    pub fn fit_within(mut self, deadline: Duration) -> Self {
        if self.worst_case_duration() < deadline || self.max_retries == 0 {
            return self;
        }

        let budget = deadline.as_secs().saturating_sub(1);
        // more attempts than budget seconds leaves each one nothing
        let mut attempts = self
            .max_retries
            .min(u32::try_from(budget).unwrap_or(u32::MAX))
            .max(1);
        loop {
            let per_attempt = budget.saturating_sub(total_backoff_secs(attempts)) / u64::from(attempts);
            if per_attempt >= MIN_ATTEMPT_SECS.min(self.timeout_secs) || attempts == 1 {
                self.timeout_secs = self.timeout_secs.min(per_attempt).max(1);
                self.max_retries = attempts;
                return self;
            }
            attempts -= 1;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Configuration("api_key must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(LlmError::Configuration("model must not be empty".to_string()));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(LlmError::Configuration(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.timeout_secs == 0 {
            return Err(LlmError::Configuration("timeout_secs must be greater than 0".to_string()));
        }
        if self.max_retries == 0 {
            return Err(LlmError::Configuration("max_retries must be greater than 0".to_string()));
        }
        Ok(())
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Gemini API provider
pub struct GeminiProvider {
    config: GeminiConfig,
    client: reqwest::blocking::Client,
}

/// Request body for the generateContent API
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

/// Response from the generateContent API
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Configuration`] if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, LlmError> {
        config.validate()?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// The active configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Call generateContent, optionally in JSON mode with a response schema
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The credential is rejected
    /// - The model is not available
    /// - Rate limits persist across all attempts
    /// - Network communication fails
    /// - The response carries no text
    pub fn generate_content(
        &self,
        prompt: &str,
        json_mode: bool,
        schema: Option<serde_json::Value>,
    ) -> Result<String, LlmError> {
        let url = self.config.generate_url();
        let body = self.request_body(prompt, json_mode, schema);

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.config.max_retries {
            debug!(model = %self.config.model, attempt = attempts + 1, "Calling Gemini API");

            match self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.config.api_key)
                .json(&body)
                .send()
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response.json::<GenerateContentResponse>().map_err(|e| {
                            LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                        })?;
                        return response_text(parsed);
                    }

                    let error_text = response
                        .text()
                        .unwrap_or_else(|_| "Unknown error".to_string());

                    match status.as_u16() {
                        401 | 403 => {
                            return Err(LlmError::Authentication(format!("HTTP {}: {}", status, error_text)));
                        }
                        404 => return Err(LlmError::ModelNotAvailable(self.config.model.clone())),
                        429 => last_error = Some(LlmError::RateLimitExceeded),
                        code if code >= 500 => {
                            last_error = Some(LlmError::Communication(format!(
                                "HTTP {}: {}",
                                status, error_text
                            )));
                        }
                        _ => {
                            return Err(LlmError::InvalidResponse(format!(
                                "HTTP {}: {}",
                                status, error_text
                            )));
                        }
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.config.max_retries {
                let delay = backoff_delay(attempts);
                warn!(attempt = attempts, ?delay, "Gemini call failed, retrying");
                std::thread::sleep(delay);
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }

    fn request_body(
        &self,
        prompt: &str,
        json_mode: bool,
        schema: Option<serde_json::Value>,
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                response_mime_type: json_mode.then(|| "application/json".to_string()),
                response_schema: schema,
            },
        }
    }
}

/// Concatenate the text parts of the first candidate
fn response_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(LlmError::Blocked(reason));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(LlmError::InvalidResponse(format!(
            "Empty response (finish reason: {})",
            reason
        )));
    }

    Ok(text)
}

impl LlmProviderTrait for GeminiProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.generate_content(prompt, false, None)
    }

    fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error> {
        let schema = if schema.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(schema).map_err(|e| {
                LlmError::Other(format!("Response schema is not valid JSON: {}", e))
            })?)
        };
        self.generate_content(prompt, true, schema)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
