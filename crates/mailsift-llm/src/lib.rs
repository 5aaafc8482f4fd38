//! mailsift LLM Provider Layer
//!
//! Pluggable LLM provider implementations.
//!
//! # Architecture
//!
//! This crate provides implementations of the `LlmProvider` trait from `mailsift-domain`.
//! It supports multiple LLM backends with a common interface.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic mock for testing
//! - `GeminiProvider`: Google Gemini `generateContent` API integration
//!
//! # Examples
//!
//! ```
//! use mailsift_llm::MockProvider;
//! use mailsift_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new("Hello from LLM!");
//! let result = provider.generate("test prompt").unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! ```

#![warn(missing_docs)]

pub mod gemini;

use mailsift_domain::traits::LlmProvider as LlmProviderTrait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiProvider};

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Credential rejected by the backend
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limit or quota exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// The backend refused to answer (safety block or similar)
    #[error("Response blocked: {0}")]
    Blocked(String),

    /// Provider could not be configured (missing credential, bad endpoint)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Error(String),
}

#[derive(Debug, Clone)]
enum PromptMatch {
    Exact(String),
    Contains(String),
}

impl PromptMatch {
    fn matches(&self, prompt: &str) -> bool {
        match self {
            PromptMatch::Exact(p) => p == prompt,
            PromptMatch::Contains(needle) => prompt.contains(needle.as_str()),
        }
    }
}

/// Mock LLM provider for deterministic testing
///
/// This provider returns pre-configured responses without making any network calls.
/// Rules are checked in insertion order; the first matching rule wins, otherwise the
/// default response is returned.
///
/// # Examples
///
/// ```
/// use mailsift_llm::MockProvider;
/// use mailsift_domain::traits::LlmProvider;
///
/// // Simple fixed response
/// let provider = MockProvider::new("Fixed response");
/// assert_eq!(provider.generate("any prompt").unwrap(), "Fixed response");
///
/// // Responses keyed on prompt content
/// let mut provider = MockProvider::default();
/// provider.add_response("prompt1", "response1");
/// provider.respond_when_contains("invoice", "response2");
/// assert_eq!(provider.generate("prompt1").unwrap(), "response1");
/// assert_eq!(provider.generate("the invoice is late").unwrap(), "response2");
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_reply: MockReply,
    rules: Arc<Mutex<Vec<(PromptMatch, MockReply)>>>,
    call_count: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<Option<String>>>,
    last_schema: Arc<Mutex<Option<String>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self::with_default(MockReply::Text(response.into()))
    }

    /// Create a MockProvider that fails every call
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_default(MockReply::Error(message.into()))
    }

    fn with_default(default_reply: MockReply) -> Self {
        Self {
            default_reply,
            rules: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(None)),
            last_schema: Arc::new(Mutex::new(None)),
            delay: None,
        }
    }

    /// Sleep for `delay` before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add a specific response for a given prompt
    pub fn add_response(&mut self, prompt: impl Into<String>, response: impl Into<String>) {
        self.push_rule(PromptMatch::Exact(prompt.into()), MockReply::Text(response.into()));
    }

    /// Configure to return an error for a specific prompt
    pub fn add_error(&mut self, prompt: impl Into<String>) {
        self.push_rule(
            PromptMatch::Exact(prompt.into()),
            MockReply::Error("Mock error".to_string()),
        );
    }

    /// Respond with `response` whenever the prompt contains `needle`
    pub fn respond_when_contains(&mut self, needle: impl Into<String>, response: impl Into<String>) {
        self.push_rule(PromptMatch::Contains(needle.into()), MockReply::Text(response.into()));
    }

    /// Fail whenever the prompt contains `needle`
    pub fn fail_when_contains(&mut self, needle: impl Into<String>) {
        self.push_rule(
            PromptMatch::Contains(needle.into()),
            MockReply::Error("Mock error".to_string()),
        );
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }

    /// The most recent prompt received
    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.last_prompt).clone()
    }

    /// The most recent schema passed to `generate_structured`
    pub fn last_schema(&self) -> Option<String> {
        lock(&self.last_schema).clone()
    }

    fn push_rule(&mut self, matcher: PromptMatch, reply: MockReply) {
        lock(&self.rules).push((matcher, reply));
    }

    fn reply_for(&self, prompt: &str) -> Result<String, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_prompt) = Some(prompt.to_string());

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let reply = lock(&self.rules)
            .iter()
            .find(|(matcher, _)| matcher.matches(prompt))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone());

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(message) => Err(LlmError::Other(message)),
        }
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        self.reply_for(prompt)
    }

    fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error> {
        *lock(&self.last_schema) = Some(schema.to_string());
        self.reply_for(prompt)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
